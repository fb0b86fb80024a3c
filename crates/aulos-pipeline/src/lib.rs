#![forbid(unsafe_code)]

//! `aulos-pipeline`
//!
//! The concurrency core of the aulos player: per-stream transfer tasks
//! ([`EsStream`]) pumping encoded packets from storage into an opaque
//! [`PlatformPlayer`], orchestrated by the [`StreamController`] which owns
//! the playback state machine, the exclusive-operation serializer, the
//! prebuffer gate, seek-generation fencing and the playback clock.

mod clock;
mod config;
mod controller;
mod es_stream;
mod platform;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use config::PipelineConfig;
pub use controller::StreamController;
pub use es_stream::{ConfigOutcome, EsStream, EsStreamEvent, EsStreamState, StreamSeekOutcome};
pub use platform::{
    BufferStatus, DisplayHandle, PlatformEvent, PlatformPlayer, PlatformState, PlayerFactory,
    ReadyCallback, SubmitStatus,
};
