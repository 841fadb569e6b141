// Error types
//
// Audio errors never leave the audio layer: the controller and the effect
// player log and swallow them. Settings errors reach the host, which falls
// back to defaults.

use thiserror::Error;

/// Failure reported by an audio backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// The environment refuses to produce sound before a user gesture
    #[error("playback denied until the user interacts with the page")]
    PlaybackDenied,

    /// The asset could not be opened or decoded
    #[error("audio resource unavailable: {0}")]
    Unavailable(String),

    #[error("audio backend error: {0}")]
    Backend(String),
}

pub type AudioResult<T> = std::result::Result<T, AudioError>;

/// Failure while reading or writing settings and preference files
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}
