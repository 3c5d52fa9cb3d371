use std::{collections::HashMap, future::Future, str::FromStr, sync::Arc};

use anyhow::{anyhow, Context as _, Result};
use futures_lite::{stream, Stream};
use tokio::sync::Mutex;

use crate::mpd::MpdConnection;

/// Subsystem whose changes are reported as [`PlayerEvent`]s.
const PLAYER_SUBSYSTEM: &str = "player";

/// Current playback status of MPD, as found under `state` in `status`
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
}
impl FromStr for PlaybackState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "play" => Ok(Self::Playing),
            "pause" => Ok(Self::Paused),
            "stop" => Ok(Self::Stopped),
            _ => Err(anyhow!("Unknown playback state {s}")),
        }
    }
}

/// A snapshot of `key: value` pairs reported by MPD.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaybackAttributes(HashMap<String, String>);

impl FromIterator<(String, String)> for PlaybackAttributes {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl PlaybackAttributes {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
    pub fn title(&self) -> Option<&str> {
        self.get("Title")
    }
    pub fn artist(&self) -> Option<&str> {
        self.get("Artist")
    }
    /// Parsed `state`, or [`None`] if it is absent or unknown.
    pub fn state(&self) -> Option<PlaybackState> {
        self.get("state")?
            .parse()
            .inspect_err(|e| tracing::warn!(?e, "Failed to parse playback state"))
            .ok()
    }
}

/// Notification that the player subsystem changed: play, pause, stop, seek or a new song.
///
/// It carries nothing; the current state has to be queried again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayerEvent;

/// Where the playback state comes from.
pub trait PlaybackSource {
    /// Tags of the song currently loaded.
    fn query_attributes(&self) -> impl Future<Output = Result<PlaybackAttributes>> + Send;
    /// Whether a song is playing right now. Any failure to find out counts as "not playing".
    fn query_is_playing(&self) -> impl Future<Output = bool> + Send;
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Playback source backed by an MPD command connection.
///
/// Clones share the connection; commands are serialized so a keepalive ping never lands in the
/// middle of another query.
#[derive(Clone, Debug)]
pub struct MpdPlayback {
    conn: Arc<Mutex<MpdConnection>>,
}

impl MpdPlayback {
    pub fn new(conn: MpdConnection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }
}

impl PlaybackSource for MpdPlayback {
    async fn query_attributes(&self) -> Result<PlaybackAttributes> {
        self.conn
            .lock()
            .await
            .current_song()
            .await
            .context("Failed to query current song from MPD")
    }

    async fn query_is_playing(&self) -> bool {
        let status = self.conn.lock().await.status().await;
        match status {
            Ok(status) => status.state() == Some(PlaybackState::Playing),
            Err(e) => {
                tracing::warn!(?e, "Failed to query MPD status, assuming nothing is playing");
                false
            }
        }
    }

    async fn ping(&self) -> Result<()> {
        self.conn
            .lock()
            .await
            .ping()
            .await
            .context("Failed to ping MPD")
    }
}

/// Stream of player changes read from `watcher`, a connection dedicated to `idle`.
///
/// The stream ends once the connection fails; it cannot be resumed.
pub fn player_events(watcher: MpdConnection) -> impl Stream<Item = PlayerEvent> {
    stream::unfold(watcher, |mut watcher| async move {
        loop {
            match watcher.idle(&[PLAYER_SUBSYSTEM]).await {
                Ok(changed) if changed.iter().any(|s| s == PLAYER_SUBSYSTEM) => {
                    return Some((PlayerEvent, watcher));
                }
                Ok(changed) => tracing::debug!(?changed, "Woke up without a player change"),
                Err(e) => {
                    tracing::error!(?e, "MPD watcher connection lost");
                    return None;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use futures_lite::StreamExt as _;
    use tokio::io::{duplex, AsyncBufReadExt as _, AsyncWriteExt as _, BufStream, DuplexStream};

    use super::*;

    async fn mpd_server(replies: Vec<&'static str>) -> MpdConnection {
        let (client, server) = duplex(4096);
        tokio::spawn(answer(server, replies));
        MpdConnection::from_stream(client).await.unwrap()
    }

    async fn answer(server: DuplexStream, replies: Vec<&'static str>) {
        let mut server = BufStream::new(server);
        server.write_all(b"OK MPD 0.24.0\n").await.unwrap();
        server.flush().await.unwrap();
        for reply in replies {
            let mut line = String::new();
            if server.read_line(&mut line).await.unwrap() == 0 {
                return;
            }
            server.write_all(reply.as_bytes()).await.unwrap();
            server.flush().await.unwrap();
        }
    }

    #[test]
    fn playback_state() {
        let attrs: PlaybackAttributes = [("state".to_owned(), "pause".to_owned())]
            .into_iter()
            .collect();
        assert_eq!(attrs.state(), Some(PlaybackState::Paused));
        assert_eq!("play".parse::<PlaybackState>().unwrap(), PlaybackState::Playing);
        assert_eq!("stop".parse::<PlaybackState>().unwrap(), PlaybackState::Stopped);
        assert!("playing".parse::<PlaybackState>().is_err());
        assert_eq!(PlaybackAttributes::default().state(), None);
    }

    #[tokio::test]
    async fn playing() {
        let source = MpdPlayback::new(mpd_server(vec!["state: play\nOK\n"]).await);
        assert!(source.query_is_playing().await);
    }

    #[tokio::test]
    async fn paused() {
        let source = MpdPlayback::new(mpd_server(vec!["state: pause\nOK\n"]).await);
        assert!(!source.query_is_playing().await);
    }

    #[tokio::test]
    async fn status_failure_means_not_playing() {
        let source = MpdPlayback::new(mpd_server(vec![]).await);
        assert!(!source.query_is_playing().await);
    }

    #[tokio::test]
    async fn attributes() {
        let source = MpdPlayback::new(
            mpd_server(vec!["Title: Song\nArtist: Artist\nOK\n", "OK\n"]).await,
        );
        let attrs = source.query_attributes().await.unwrap();
        assert_eq!(attrs.title(), Some("Song"));
        assert_eq!(attrs.artist(), Some("Artist"));
        source.ping().await.unwrap();
        assert!(source.ping().await.is_err());
    }

    #[tokio::test]
    async fn events() {
        let watcher = mpd_server(vec![
            "changed: player\nOK\n",
            "changed: mixer\nOK\n",
            "changed: mixer\nchanged: player\nOK\n",
        ])
        .await;
        let events = player_events(watcher);
        let mut events = std::pin::pin!(events);
        assert_eq!(events.next().await, Some(PlayerEvent));
        // The mixer-only wakeup is swallowed
        assert_eq!(events.next().await, Some(PlayerEvent));
        // Server hung up
        assert_eq!(events.next().await, None);
    }
}
