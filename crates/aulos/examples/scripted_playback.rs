//! End-to-end walkthrough against the scripted platform player: configure
//! two streams, feed generated packets, play, seek, and watch the event
//! stream. Run with `cargo run --example scripted_playback`.

use std::{error::Error, sync::Arc, time::Duration};

use async_trait::async_trait;
use aulos::{
    AudioCodec, AudioStreamConfig, DataProvider, DataProviderConnector, DataRequest, Packet,
    PipelineConfig, Player, PlayerController, PlayerEvent, PlayerResult, PlayerState,
    ProviderEvent, StreamConfig, StreamController, StreamKind, VideoCodec, VideoStreamConfig,
};
use aulos_pipeline::mock::MockPlayerFactory;
use bytes::Bytes;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Provider that synthesizes packets on demand.
struct DemoProvider {
    events_tx: broadcast::Sender<ProviderEvent>,
}

impl DemoProvider {
    fn new() -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(1024);
        Arc::new(Self { events_tx })
    }

    fn announce_configs(&self) {
        let _ = self
            .events_tx
            .send(ProviderEvent::StreamConfigReady(StreamConfig::Audio(
                AudioStreamConfig {
                    codec: AudioCodec::Aac,
                    sample_rate: 48_000,
                    channels: 2,
                    bitrate: 128_000,
                    extradata: None,
                },
            )));
        let _ = self
            .events_tx
            .send(ProviderEvent::StreamConfigReady(StreamConfig::Video(
                VideoStreamConfig {
                    codec: VideoCodec::H264,
                    width: 1920,
                    height: 1080,
                    frame_rate: 30,
                    bitrate: 4_000_000,
                    extradata: None,
                },
            )));
    }

    fn feed(&self, from: Duration, span: Duration) {
        for kind in StreamKind::ALL {
            let mut pts = from;
            while pts <= from + span {
                let _ = self.events_tx.send(ProviderEvent::PacketReady(
                    Packet::frame(kind, pts, pts, Bytes::from_static(b"generated-access-unit")),
                ));
                pts += Duration::from_millis(20);
            }
        }
    }
}

#[async_trait]
impl DataProvider for DemoProvider {
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events_tx.subscribe()
    }

    fn on_time_updated(&self, _position: Duration) {}

    fn on_state_changed(&self, state: PlayerState) {
        println!("provider observed state: {state:?}");
    }

    fn on_data_state_changed(&self, _request: DataRequest) {}

    fn on_buffering_state_changed(&self, _buffering: bool) {}

    async fn seek(&self, position: Duration, _token: CancellationToken) -> PlayerResult<Duration> {
        println!("provider repositioned to {position:?}");
        Ok(position)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::default().add_directive("aulos=debug".parse()?),
        )
        .init();

    let factory = MockPlayerFactory::new();
    let core = StreamController::new(factory.factory(), None, PipelineConfig::default())?;
    let controller = PlayerController::new(core, &[StreamKind::Audio, StreamKind::Video])?;
    let provider = DemoProvider::new();

    let connector = DataProviderConnector::new(
        Arc::clone(&controller),
        Arc::clone(&provider) as Arc<dyn DataProvider>,
    );
    connector.connect().await?;

    let mut events = controller.subscribe();

    // Announce codecs and prebuffer 5 s of content; the controller prepares
    // itself once every stream holds enough.
    provider.announce_configs();
    provider.feed(Duration::ZERO, Duration::from_secs(5));
    loop {
        if let Ok(PlayerEvent::StateChanged(PlayerState::Prepared)) = events.recv().await {
            break;
        }
    }

    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                PlayerEvent::TimeUpdated(_) | PlayerEvent::DataNeeded(_) => {}
                other => println!("player event: {other:?}"),
            }
        }
    });

    controller.play()?;
    tokio::time::sleep(Duration::from_secs(2)).await;

    // Seek forward; packets after the provider acknowledged the seek belong
    // to the new generation.
    let seek = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.seek(Duration::from_secs(3)).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    provider.feed(Duration::from_secs(3), Duration::from_secs(5));
    let actual = seek.await??;
    println!("seeked to {actual:?}");

    tokio::time::sleep(Duration::from_secs(1)).await;
    controller.stop()?;
    controller.core().dispose().await;
    Ok(())
}
