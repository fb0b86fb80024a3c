#![forbid(unsafe_code)]

//! `aulos`
//!
//! Facade of the elementary-stream playback controller. Glues an
//! [`DataProvider`] (the packet producer) to the pipeline core: routes
//! producer events into per-stream [`PacketStream`] ingress, exposes the
//! [`Player`] surface to the application, and runs the bidirectional
//! subscription bus ([`DataProviderConnector`]) whose embedded client seeks
//! across both subscription halves atomically.

mod connector;
mod packet_stream;
mod player_controller;
mod traits;

pub use aulos_core::{
    AudioCodec, AudioStreamConfig, DataRequest, DrmConfiguration, DrmSessionHandle, Packet,
    PacketPayload, PlayerError, PlayerResult, PlayerState, StreamConfig, StreamKind, VideoCodec,
    VideoStreamConfig,
};
pub use aulos_events::{EventBus, PlayerEvent, ProviderEvent};
pub use aulos_pipeline::{DisplayHandle, PipelineConfig, PlayerFactory, StreamController};
pub use connector::DataProviderConnector;
pub use packet_stream::PacketStream;
pub use player_controller::PlayerController;
pub use traits::{DataProvider, Player, PlayerClient};
