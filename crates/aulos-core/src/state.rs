#![forbid(unsafe_code)]

//! Observable player state and buffer-fill hints.

use std::time::Duration;

use crate::stream::StreamKind;

/// Externally observable playback state. The controller caches the last
/// published value; transitions are monotone modulo the terminal states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Prepared,
    Playing,
    Paused,
    Completed,
    Error,
}

/// Buffer-fill hint emitted upstream so the producer can pace itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataRequest {
    pub kind: StreamKind,
    /// Bytes the buffer wants, derived from the missing duration and the
    /// configured average bitrate.
    pub bytes_needed: u64,
    /// Duration missing to reach the target buffer depth.
    pub duration_needed: Duration,
    /// Coarse underrun signal: almost no buffered content and EOS not seen.
    pub is_buffer_empty: bool,
}
