//! Turning playback attributes into the status shown on Slack.


use crate::playback::PlaybackAttributes;

/// Maximum number of characters Slack accepts in a status text.
pub const STATUS_MAX_LENGTH: usize = 100;

/// Emoji shown while a song is playing.
pub const PLAYING_EMOJI: &str = ":headphones:";

const ELLIPSIS: char = '…';

/// A status as sent to Slack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayStatus {
    pub emoji: String,
    pub text: String,
}

/// Status used whenever nothing is playing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefaultStatus {
    pub emoji: String,
    pub text: String,
}

impl DisplayStatus {
    /// Build a status, truncating `text` to [`STATUS_MAX_LENGTH`] characters.
    pub fn new(emoji: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            emoji: emoji.into(),
            text: truncate(text.into()),
        }
    }

    /// Status for the song described by `attrs`.
    ///
    /// Missing title or artist are left empty, so a song without tags shows as `" - "`.
    #[must_use]
    pub fn playing(attrs: &PlaybackAttributes) -> Self {
        let title = attrs.title().unwrap_or_default();
        let artist = attrs.artist().unwrap_or_default();
        Self::new(PLAYING_EMOJI, format!("{title} - {artist}"))
    }

    #[must_use]
    pub fn idle(default: &DefaultStatus) -> Self {
        Self::new(default.emoji.as_str(), default.text.as_str())
    }
}

/// Cut `text` down to [`STATUS_MAX_LENGTH`] characters, ending it with an ellipsis if anything was
/// removed.
#[must_use]
pub fn truncate(mut text: String) -> String {
    if text.chars().count() <= STATUS_MAX_LENGTH {
        return text;
    }
    // Byte offset of the 100th char: everything before it is kept, the ellipsis takes its place
    if let Some((keep, _)) = text.char_indices().nth(STATUS_MAX_LENGTH - 1) {
        text.truncate(keep);
        text.push(ELLIPSIS);
    }
    text
}
