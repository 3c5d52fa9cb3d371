use std::pin::pin;

use anyhow::{bail, Context as _, Result};
use futures_lite::{Stream, StreamExt as _};

use crate::{
    playback::{PlaybackSource, PlayerEvent},
    slack::StatusSink,
    status::{DefaultStatus, DisplayStatus},
};

/// Keeps the Slack status in line with what MPD is playing.
pub struct SyncEngine<P, S> {
    source: P,
    sink: S,
    default: DefaultStatus,
    /// Text of the last status Slack accepted
    last_sent: Option<String>,
}

impl<P: PlaybackSource, S: StatusSink> SyncEngine<P, S> {
    pub fn new(source: P, sink: S, default: DefaultStatus) -> Self {
        Self {
            source,
            sink,
            default,
            last_sent: None,
        }
    }

    pub fn last_sent(&self) -> Option<&str> {
        self.last_sent.as_deref()
    }

    /// Handle player events one at a time until something fails.
    ///
    /// # Errors
    ///
    /// Never returns successfully: either publishing a status or querying the song fails, or
    /// `events` runs dry.
    pub async fn run(&mut self, events: impl Stream<Item = PlayerEvent>) -> Result<()> {
        let mut events = pin!(events);
        while let Some(PlayerEvent) = events.next().await {
            self.handle_event().await?;
        }
        tracing::error!("Player event stream closed");
        bail!("Player event stream closed")
    }

    /// Bring the status up to date with the player.
    ///
    /// # Errors
    ///
    /// Returns an error if the song cannot be queried while playing, or if publishing fails.
    pub async fn handle_event(&mut self) -> Result<()> {
        let status = self.desired_status().await?;
        if self.last_sent.as_deref() == Some(status.text.as_str()) {
            tracing::debug!(text = %status.text, "Status unchanged, not publishing");
            return Ok(());
        }
        self.sink
            .publish(&status)
            .await
            .context("Failed to publish status")?;
        self.last_sent = Some(status.text);
        Ok(())
    }

    async fn desired_status(&self) -> Result<DisplayStatus> {
        if self.source.query_is_playing().await {
            let song = self
                .source
                .query_attributes()
                .await
                .context("Failed to query the song being played")?;
            tracing::debug!(?song, "Player is playing");
            Ok(DisplayStatus::playing(&song))
        } else {
            tracing::debug!("Player is idle");
            Ok(DisplayStatus::idle(&self.default))
        }
    }
}
