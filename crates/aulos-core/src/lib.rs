#![forbid(unsafe_code)]

//! `aulos-core`
//!
//! Shared data model for the aulos elementary-stream playback controller:
//! stream identity, encoded packets, codec configurations, observable player
//! state, and the common error taxonomy.

mod config;
mod error;
mod packet;
mod state;
mod stream;

pub use config::{AudioCodec, AudioStreamConfig, StreamConfig, VideoCodec, VideoStreamConfig};
pub use error::{PlayerError, PlayerResult};
pub use packet::{DrmConfiguration, DrmSessionHandle, Packet, PacketPayload};
pub use state::{DataRequest, PlayerState};
pub use stream::{STREAM_COUNT, StreamKind};
