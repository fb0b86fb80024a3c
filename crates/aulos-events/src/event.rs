#![forbid(unsafe_code)]

use std::time::Duration;

use aulos_core::{
    DataRequest, DrmConfiguration, Packet, PlayerState, StreamConfig, StreamKind,
};
use bytes::Bytes;

/// Events published by the playback-controller side, observed by the
/// application and forwarded to the data provider.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum PlayerEvent {
    StateChanged(PlayerState),
    TimeUpdated(Duration),
    PlaybackError(String),
    BufferingStateChanged(bool),
    /// Coarse buffering progress (0 at stall, 100 when replenished).
    BufferingProgress(u32),
    /// Buffer-fill hint for one stream, emitted periodically.
    DataNeeded(DataRequest),
    SeekStarted { id: u64, position: Duration },
    SeekCompleted { id: u64 },
}

/// Events published by the data-provider side, routed into the playback
/// controller.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum ProviderEvent {
    ClipDurationChanged(Duration),
    DrmInitDataFound { kind: StreamKind, data: Bytes },
    SetDrmConfiguration(DrmConfiguration),
    StreamConfigReady(StreamConfig),
    PacketReady(Packet),
    StreamError(String),
    BufferingStateChanged(bool),
}
