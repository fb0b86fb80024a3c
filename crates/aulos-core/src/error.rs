#![forbid(unsafe_code)]

use thiserror::Error;

/// Result type used across the aulos crates.
pub type PlayerResult<T> = Result<T, PlayerError>;

/// Error taxonomy of the playback controller.
///
/// `Cancelled` is a distinguished outcome, not a failure: it is produced when
/// a cancellation token fires across a suspension point and is never
/// published as a playback error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlayerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("unsupported stream config: {0}")]
    UnsupportedStream(String),

    /// Native player failure, tagged with the lifecycle step that failed
    /// ("Start Failed", "Seek Failed", "Restart Error", "Playback Error").
    #[error("{tag}: {message}")]
    Native {
        tag: &'static str,
        message: String,
    },

    #[error("operation not supported")]
    Unsupported,

    #[error("player already disposed")]
    Disposed,
}

impl PlayerError {
    /// Native-failure constructor with the conventional short tag.
    #[must_use]
    pub fn native(tag: &'static str, message: impl Into<String>) -> Self {
        PlayerError::Native {
            tag,
            message: message.into(),
        }
    }

    /// Whether this outcome is a cancellation rather than a failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PlayerError::Cancelled)
    }
}
