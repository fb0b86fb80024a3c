#![forbid(unsafe_code)]

//! Per-stream ingress decoration.
//!
//! A [`PacketStream`] sits between the data provider and packet storage for
//! one stream: it stamps the seek generation in effect, attaches the active
//! DRM session, patches codec extradata into the first access unit after a
//! configuration change, and mirrors configs as in-band boundary packets.

use std::{sync::Arc, time::Duration};

use aulos_core::{
    DrmSessionHandle, Packet, PacketPayload, PlayerResult, StreamConfig, StreamKind,
};
use aulos_pipeline::StreamController;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tracing::{debug, trace};

pub struct PacketStream {
    kind: StreamKind,
    core: Arc<StreamController>,
    drm: Mutex<Option<DrmSessionHandle>>,
    /// Extradata of the most recent config, consumed by the next frame.
    pending_extradata: Mutex<Option<Bytes>>,
    last_config: Mutex<Option<StreamConfig>>,
}

impl PacketStream {
    pub fn new(kind: StreamKind, core: Arc<StreamController>) -> Self {
        Self {
            kind,
            core,
            drm: Mutex::new(None),
            pending_extradata: Mutex::new(None),
            last_config: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// The config most recently announced by the producer.
    #[must_use]
    pub fn last_config(&self) -> Option<StreamConfig> {
        self.last_config.lock().clone()
    }

    /// Attach a DRM session; subsequent frame packets carry its handle.
    pub fn set_drm(&self, session: DrmSessionHandle) {
        debug!(kind = %self.kind, ?session, "drm session attached");
        *self.drm.lock() = Some(session);
    }

    /// Route a codec configuration: applied to the pipeline immediately and
    /// mirrored as an in-band boundary packet so the transfer task switches
    /// at the right position in the queue.
    pub async fn on_config(&self, config: StreamConfig) -> PlayerResult<()> {
        *self.pending_extradata.lock() = config.extradata().cloned();
        *self.last_config.lock() = Some(config.clone());

        self.core.set_stream_config(config.clone())?;
        let boundary = Packet::config(Duration::ZERO, config)
            .with_generation(self.core.current_seek_id());
        self.core.append_packet(boundary).await
    }

    /// Decorate and enqueue a producer packet.
    pub async fn process(&self, packet: Packet) -> PlayerResult<()> {
        let mut packet = packet.with_generation(self.core.current_seek_id());

        if let PacketPayload::Frame { data, .. } = &mut packet.payload {
            if let Some(extradata) = self.pending_extradata.lock().take() {
                trace!(
                    kind = %self.kind,
                    extradata_len = extradata.len(),
                    "patching codec extradata into access unit"
                );
                let mut patched = BytesMut::with_capacity(extradata.len() + data.len());
                patched.extend_from_slice(&extradata);
                patched.extend_from_slice(data);
                *data = patched.freeze();
            }
        }
        if packet.is_frame() && packet.drm.is_none() {
            packet.drm = *self.drm.lock();
        }

        self.core.append_packet(packet).await
    }
}
