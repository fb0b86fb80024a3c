#![forbid(unsafe_code)]

use aulos_core::{PlayerError, StreamKind};
use thiserror::Error;

/// Result type used by `aulos-storage`.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors produced by the storage primitives.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    /// The queue was completed and drained; no further packets will arrive.
    #[error("packet storage closed")]
    Closed,

    #[error("stream {0} not initialized")]
    Uninitialized(StreamKind),

    #[error("stream {0} already initialized")]
    AlreadyInitialized(StreamKind),

    /// Input was disabled for this stream; new packets are rejected.
    #[error("input disabled for stream {0}")]
    InputDisabled(StreamKind),
}

impl From<StorageError> for PlayerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Closed => PlayerError::InvalidState("packet storage closed".into()),
            StorageError::Uninitialized(_) => {
                PlayerError::InvalidArgument("stream not initialized")
            }
            StorageError::AlreadyInitialized(_) => {
                PlayerError::InvalidArgument("stream already initialized")
            }
            StorageError::InputDisabled(kind) => {
                PlayerError::InvalidState(format!("input disabled for {kind} stream"))
            }
        }
    }
}
