//! In-memory stand-ins for MPD and Slack.

use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};

use crate::{
    playback::{PlaybackAttributes, PlaybackSource},
    slack::StatusSink,
    status::DisplayStatus,
};

#[derive(Default)]
struct SourceState {
    song: Option<PlaybackAttributes>,
    playing: bool,
    fail_song_queries: bool,
    fail_pings: bool,
    song_queries: usize,
    pings: usize,
}

#[derive(Clone, Default)]
pub struct FakeSource(Arc<Mutex<SourceState>>);

impl FakeSource {
    pub fn play(&self, title: &str, artist: &str) {
        let mut state = self.0.lock().unwrap();
        state.song = Some(
            [
                ("Title".to_owned(), title.to_owned()),
                ("Artist".to_owned(), artist.to_owned()),
            ]
            .into_iter()
            .collect(),
        );
        state.playing = true;
    }
    pub fn pause(&self) {
        self.0.lock().unwrap().playing = false;
    }
    pub fn fail_song_queries(&self) {
        self.0.lock().unwrap().fail_song_queries = true;
    }
    pub fn fail_pings(&self) {
        self.0.lock().unwrap().fail_pings = true;
    }
    pub fn song_queries(&self) -> usize {
        self.0.lock().unwrap().song_queries
    }
    pub fn pings(&self) -> usize {
        self.0.lock().unwrap().pings
    }
}

impl PlaybackSource for FakeSource {
    async fn query_attributes(&self) -> Result<PlaybackAttributes> {
        let mut state = self.0.lock().unwrap();
        state.song_queries += 1;
        if state.fail_song_queries {
            bail!("currentsong failed");
        }
        Ok(state.song.clone().unwrap_or_default())
    }

    async fn query_is_playing(&self) -> bool {
        self.0.lock().unwrap().playing
    }

    async fn ping(&self) -> Result<()> {
        let mut state = self.0.lock().unwrap();
        state.pings += 1;
        if state.fail_pings {
            bail!("ping failed");
        }
        Ok(())
    }
}

#[derive(Default)]
struct SinkState {
    published: Vec<DisplayStatus>,
    fail: bool,
}

#[derive(Clone, Default)]
pub struct RecordingSink(Arc<Mutex<SinkState>>);

impl RecordingSink {
    pub fn fail(&self) {
        self.0.lock().unwrap().fail = true;
    }
    pub fn published(&self) -> Vec<DisplayStatus> {
        self.0.lock().unwrap().published.clone()
    }
    pub fn texts(&self) -> Vec<String> {
        self.published().into_iter().map(|s| s.text).collect()
    }
}

impl StatusSink for RecordingSink {
    async fn publish(&self, status: &DisplayStatus) -> Result<()> {
        let mut state = self.0.lock().unwrap();
        if state.fail {
            bail!("connection refused");
        }
        state.published.push(status.clone());
        Ok(())
    }
}
