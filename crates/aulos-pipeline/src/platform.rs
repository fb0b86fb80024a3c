#![forbid(unsafe_code)]

//! Seam toward the native platform player.
//!
//! The platform player is opaque to the pipeline: an object that accepts
//! codec configurations and pre-demuxed elementary-stream buffers, drives
//! the actual decode/render path, and reports lifecycle events back. The
//! controller owns exactly one at a time and replaces it wholesale on a
//! destructive reconfiguration.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use aulos_core::{Packet, PlayerResult, StreamConfig, StreamKind};
use tokio::sync::broadcast;

/// Opaque window/display handle handed to the native player.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayHandle(pub u64);

/// Lifecycle state of the native player.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlatformState {
    Idle,
    Ready,
    Playing,
    Paused,
}

/// Buffer-level report from the native player for one stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferStatus {
    Underrun,
    Overrun,
}

/// Events emitted by the native player.
///
/// End-of-stream is global: the native player signals it once for the whole
/// presentation, not per elementary stream.
#[derive(Clone, Debug)]
pub enum PlatformEvent {
    EndOfStream,
    Error(String),
    BufferStatus {
        kind: StreamKind,
        status: BufferStatus,
    },
}

/// Outcome of a packet submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitStatus {
    Accepted,
    /// The player's input buffer is full; retry after a wakeup.
    Full,
}

/// Callback invoked by the native player when a stream may start transfer
/// during prepare/seek. May be called from any thread; implementations must
/// not touch controller state directly.
pub type ReadyCallback = Arc<dyn Fn(StreamKind) + Send + Sync>;

/// Factory producing fresh native players, used at construction and on every
/// destructive reconfiguration.
pub type PlayerFactory = Arc<dyn Fn() -> PlayerResult<Arc<dyn PlatformPlayer>> + Send + Sync>;

/// The native platform player.
///
/// Synchronous entry points are cheap state manipulations; `prepare` and
/// `seek` suspend until the player has consumed enough data to proceed,
/// invoking `on_ready` per stream when transfer may begin.
#[async_trait]
pub trait PlatformPlayer: Send + Sync + 'static {
    fn open(&self) -> PlayerResult<()>;

    /// Enable protected-content output. Set before any DRM-carrying packet.
    fn set_secure_output(&self, enabled: bool) -> PlayerResult<()>;

    fn set_display(&self, display: DisplayHandle) -> PlayerResult<()>;

    fn state(&self) -> PlatformState;

    fn start(&self) -> PlayerResult<()>;

    fn pause(&self) -> PlayerResult<()>;

    fn resume(&self) -> PlayerResult<()>;

    fn stop(&self) -> PlayerResult<()>;

    /// Prepare for playback. Resolves once all configured streams reached
    /// their start threshold.
    async fn prepare(&self, on_ready: ReadyCallback) -> PlayerResult<()>;

    /// Reposition to `position`. Resolves once the player accepted enough
    /// post-seek data.
    async fn seek(&self, position: Duration, on_ready: ReadyCallback) -> PlayerResult<()>;

    /// Current presentation timestamp.
    fn playing_time(&self) -> PlayerResult<Duration>;

    fn set_stream_config(&self, config: &StreamConfig) -> PlayerResult<()>;

    /// Submit one encoded packet. [`SubmitStatus::Full`] is back-pressure,
    /// not an error.
    fn submit_packet(&self, packet: &Packet) -> PlayerResult<SubmitStatus>;

    fn submit_eos(&self, kind: StreamKind) -> PlayerResult<()>;

    fn subscribe(&self) -> broadcast::Receiver<PlatformEvent>;

    /// Release native resources. The object is unusable afterwards.
    fn dispose(&self);
}
