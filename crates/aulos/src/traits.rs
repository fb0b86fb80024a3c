#![forbid(unsafe_code)]

//! Seams between the application, the playback controller and the data
//! provider.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use aulos_core::{DataRequest, Packet, PlayerResult, PlayerState, StreamConfig};
use aulos_events::{PlayerEvent, ProviderEvent};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// The playback controller as seen by the application.
#[async_trait]
pub trait Player: Send + Sync + 'static {
    fn play(&self) -> PlayerResult<()>;

    fn pause(&self) -> PlayerResult<()>;

    fn stop(&self) -> PlayerResult<()>;

    /// Reposition playback. Resolves to the actually seeked-to position.
    async fn seek(&self, position: Duration) -> PlayerResult<Duration>;

    async fn set_stream_config(&self, config: StreamConfig) -> PlayerResult<()>;

    async fn append_packet(&self, packet: Packet) -> PlayerResult<()>;

    /// Announce the clip duration. Optional; defaults to unsupported.
    fn set_duration(&self, _duration: Duration) -> PlayerResult<()> {
        Err(aulos_core::PlayerError::Unsupported)
    }

    /// Change the playback rate. Optional; defaults to unsupported.
    fn set_playback_rate(&self, _rate: f32) -> PlayerResult<()> {
        Err(aulos_core::PlayerError::Unsupported)
    }

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent>;

    fn client(&self) -> Option<Arc<dyn PlayerClient>>;

    fn set_client(&self, client: Arc<dyn PlayerClient>);
}

/// Seek gateway toward the data-provider side.
///
/// While a client seek is in flight, both subscription halves between the
/// provider and the player are suspended; neither side observes the other's
/// events until the seek resolves.
#[async_trait]
pub trait PlayerClient: Send + Sync + 'static {
    /// Reposition the producer. Resolves to the actual position.
    async fn seek(&self, position: Duration, token: CancellationToken) -> PlayerResult<Duration>;
}

/// The packet producer.
#[async_trait]
pub trait DataProvider: Send + Sync + 'static {
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;

    fn on_time_updated(&self, position: Duration);

    fn on_state_changed(&self, state: PlayerState);

    fn on_data_state_changed(&self, request: DataRequest);

    fn on_buffering_state_changed(&self, buffering: bool);

    /// Reposition the producer; subsequent packets belong to the new seek
    /// generation.
    async fn seek(&self, position: Duration, token: CancellationToken) -> PlayerResult<Duration>;
}
