#![forbid(unsafe_code)]

//! Glue between the data provider, DRM announcements and the pipeline core.

use std::sync::{
    Arc, OnceLock,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use aulos_core::{
    DrmConfiguration, Packet, PlayerError, PlayerResult, STREAM_COUNT, StreamConfig, StreamKind,
};
use aulos_events::PlayerEvent;
use aulos_pipeline::StreamController;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::{
    packet_stream::PacketStream,
    traits::{Player, PlayerClient},
};

/// Player-side endpoint: implements [`Player`] for the application and
/// routes producer events into the pipeline.
pub struct PlayerController {
    core: Arc<StreamController>,
    packet_streams: [OnceLock<Arc<PacketStream>>; STREAM_COUNT],
    current_time: Mutex<Duration>,
    duration: Mutex<Option<Duration>>,
    seeking: AtomicBool,
    client: RwLock<Option<Arc<dyn PlayerClient>>>,
}

impl PlayerController {
    /// Create the controller endpoint and initialize one pipeline stream per
    /// kind in `kinds`. The stream count is fixed from here on.
    pub fn new(core: Arc<StreamController>, kinds: &[StreamKind]) -> PlayerResult<Arc<Self>> {
        let this = Arc::new(Self {
            core: Arc::clone(&core),
            packet_streams: Default::default(),
            current_time: Mutex::new(Duration::ZERO),
            duration: Mutex::new(None),
            seeking: AtomicBool::new(false),
            client: RwLock::new(None),
        });
        for kind in kinds {
            core.initialize(*kind)?;
            let _ = this.packet_streams[kind.index()]
                .set(Arc::new(PacketStream::new(*kind, Arc::clone(&core))));
        }
        this.spawn_time_tracker();
        Ok(this)
    }

    /// The pipeline core this endpoint drives.
    #[must_use]
    pub fn core(&self) -> &Arc<StreamController> {
        &self.core
    }

    /// Position of the most recent clock tick.
    #[must_use]
    pub fn current_time(&self) -> Duration {
        *self.current_time.lock()
    }

    /// Clip duration announced by the producer, if any.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        *self.duration.lock()
    }

    fn packet_stream(&self, kind: StreamKind) -> PlayerResult<&Arc<PacketStream>> {
        self.packet_streams[kind.index()]
            .get()
            .ok_or(PlayerError::InvalidArgument("stream not initialized"))
    }

    fn spawn_time_tracker(self: &Arc<Self>) {
        let mut rx = self.core.subscribe();
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(PlayerEvent::TimeUpdated(position)) => {
                        let Some(this) = weak.upgrade() else { break };
                        *this.current_time.lock() = position;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    // -- producer event routing --------------------------------------------

    pub fn on_clip_duration_changed(&self, duration: Duration) {
        debug!(?duration, "clip duration announced");
        *self.duration.lock() = Some(duration);
    }

    pub fn on_drm_init_data(&self, kind: StreamKind, data: &Bytes) {
        // Key exchange happens outside the controller; the announcement is
        // only logged here.
        debug!(%kind, len = data.len(), "drm init data found");
    }

    pub fn on_set_drm_configuration(&self, config: &DrmConfiguration) {
        if let Ok(stream) = self.packet_stream(config.kind) {
            stream.set_drm(config.session);
        }
    }

    pub async fn on_stream_config_ready(&self, config: StreamConfig) -> PlayerResult<()> {
        self.packet_stream(config.kind())?.on_config(config).await
    }

    pub async fn on_packet_ready(&self, packet: Packet) -> PlayerResult<()> {
        self.packet_stream(packet.kind)?.process(packet).await
    }

    pub fn on_stream_error(&self, message: String) {
        warn!(%message, "producer reported stream error");
        self.core.events().publish(PlayerEvent::PlaybackError(message));
        let _ = self.core.stop();
    }

    /// Producer-side buffering: a stall pauses playback and reports progress
    /// 0; replenishment resumes and reports 100.
    pub fn on_buffering_state_changed(&self, buffering: bool) {
        self.core
            .events()
            .publish(PlayerEvent::BufferingStateChanged(buffering));
        if buffering {
            if let Err(e) = self.core.pause() {
                debug!(?e, "pause on buffering stall failed");
            }
            self.core
                .events()
                .publish(PlayerEvent::BufferingProgress(0));
        } else {
            if let Err(e) = Arc::clone(&self.core).play() {
                debug!(?e, "resume after buffering failed");
            }
            self.core
                .events()
                .publish(PlayerEvent::BufferingProgress(100));
        }
    }

    async fn seek_inner(&self, position: Duration) -> PlayerResult<Duration> {
        // Clamp to the announced duration.
        let target = match *self.duration.lock() {
            Some(duration) => position.min(duration),
            None => position,
        };
        debug!(?position, ?target, "seek");

        // Bumps the seek generation synchronously; packets the producer
        // emits after acknowledging the seek are stamped with it.
        let completion = self.core.seek(target);

        let client = self.client.read().clone();
        let client_result = match client {
            Some(client) => client.seek(target, self.core.dispose_token()).await,
            None => Ok(target),
        };

        let actual = match client_result {
            Ok(actual) => actual,
            Err(e) => {
                // The producer never repositioned, so the pipeline-side seek
                // would wait forever for post-seek packets while holding the
                // operation serializer. Reap it and emit the completion it
                // still owes.
                completion.abort();
                if completion.await.is_err() && !self.core.is_disposed() {
                    self.core.events().publish(PlayerEvent::SeekCompleted {
                        id: self.core.current_seek_id(),
                    });
                }
                return Err(e);
            }
        };

        match completion.await {
            Ok(result) => result?,
            Err(e) => return Err(PlayerError::native("Playback Error", e.to_string())),
        }

        *self.current_time.lock() = actual;
        Ok(actual)
    }
}

#[async_trait]
impl Player for PlayerController {
    fn play(&self) -> PlayerResult<()> {
        Arc::clone(&self.core).play()
    }

    fn pause(&self) -> PlayerResult<()> {
        self.core.pause()
    }

    fn stop(&self) -> PlayerResult<()> {
        self.core.stop()
    }

    async fn seek(&self, position: Duration) -> PlayerResult<Duration> {
        if self.seeking.swap(true, Ordering::SeqCst) {
            return Err(PlayerError::InvalidState("seek already in progress".into()));
        }
        let result = self.seek_inner(position).await;
        self.seeking.store(false, Ordering::SeqCst);
        result
    }

    async fn set_stream_config(&self, config: StreamConfig) -> PlayerResult<()> {
        self.on_stream_config_ready(config).await
    }

    async fn append_packet(&self, packet: Packet) -> PlayerResult<()> {
        self.on_packet_ready(packet).await
    }

    fn set_duration(&self, duration: Duration) -> PlayerResult<()> {
        self.on_clip_duration_changed(duration);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.core.subscribe()
    }

    fn client(&self) -> Option<Arc<dyn PlayerClient>> {
        self.client.read().clone()
    }

    fn set_client(&self, client: Arc<dyn PlayerClient>) {
        *self.client.write() = Some(client);
    }
}
