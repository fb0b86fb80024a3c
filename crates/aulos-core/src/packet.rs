#![forbid(unsafe_code)]

//! Encoded media packets.

use std::time::Duration;

use bytes::Bytes;

use crate::{config::StreamConfig, stream::StreamKind};

/// Opaque handle to a DRM decryption session. Key management happens outside
/// the controller; packets only carry the handle through to the native player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DrmSessionHandle(pub u64);

/// DRM setup announced by the data provider for one stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrmConfiguration {
    pub kind: StreamKind,
    /// Scheme identifier, e.g. `"cenc"` or a key-system UUID.
    pub scheme: String,
    pub session: DrmSessionHandle,
}

/// Payload of a [`Packet`].
///
/// Exactly one of {frame data, config, end-of-stream} per packet; the enum
/// makes the states mutually exclusive by construction.
#[derive(Clone, Debug)]
pub enum PacketPayload {
    /// An encoded access unit.
    Frame { data: Bytes, keyframe: bool },
    /// An in-band codec configuration boundary.
    Config(StreamConfig),
    /// End of this elementary stream.
    Eos,
}

/// One encoded elementary-stream packet.
#[derive(Clone, Debug)]
pub struct Packet {
    pub kind: StreamKind,
    pub pts: Duration,
    pub dts: Duration,
    /// Seek generation in effect when the producer emitted this packet.
    /// The transfer layer discards packets whose generation predates the
    /// current seek target.
    pub generation: u64,
    pub drm: Option<DrmSessionHandle>,
    pub payload: PacketPayload,
}

impl Packet {
    /// An encoded access unit.
    #[must_use]
    pub fn frame(kind: StreamKind, pts: Duration, dts: Duration, data: Bytes) -> Self {
        Self {
            kind,
            pts,
            dts,
            generation: 0,
            drm: None,
            payload: PacketPayload::Frame {
                data,
                keyframe: false,
            },
        }
    }

    /// An in-band configuration carrier, timestamped at the boundary it
    /// applies from.
    #[must_use]
    pub fn config(pts: Duration, config: StreamConfig) -> Self {
        Self {
            kind: config.kind(),
            pts,
            dts: pts,
            generation: 0,
            drm: None,
            payload: PacketPayload::Config(config),
        }
    }

    /// An end-of-stream marker for `kind`.
    #[must_use]
    pub fn eos(kind: StreamKind) -> Self {
        Self {
            kind,
            pts: Duration::ZERO,
            dts: Duration::ZERO,
            generation: 0,
            drm: None,
            payload: PacketPayload::Eos,
        }
    }

    /// Mark the frame as a keyframe. No effect on non-frame payloads.
    #[must_use]
    pub fn with_keyframe(mut self, is_keyframe: bool) -> Self {
        if let PacketPayload::Frame { keyframe, .. } = &mut self.payload {
            *keyframe = is_keyframe;
        }
        self
    }

    /// Stamp the seek generation.
    #[must_use]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Attach a DRM session handle.
    #[must_use]
    pub fn with_drm(mut self, session: DrmSessionHandle) -> Self {
        self.drm = Some(session);
        self
    }

    /// Whether this packet carries frame data.
    #[must_use]
    pub fn is_frame(&self) -> bool {
        matches!(self.payload, PacketPayload::Frame { .. })
    }

    /// Whether this packet is an end-of-stream marker.
    #[must_use]
    pub fn is_eos(&self) -> bool {
        matches!(self.payload, PacketPayload::Eos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AudioCodec, AudioStreamConfig};

    fn aac() -> StreamConfig {
        StreamConfig::Audio(AudioStreamConfig {
            codec: AudioCodec::Aac,
            sample_rate: 48_000,
            channels: 2,
            bitrate: 128_000,
            extradata: None,
        })
    }

    #[test]
    fn frame_builder_stamps_metadata() {
        let p = Packet::frame(
            StreamKind::Video,
            Duration::from_millis(40),
            Duration::from_millis(40),
            Bytes::from_static(b"au"),
        )
        .with_keyframe(true)
        .with_generation(3)
        .with_drm(DrmSessionHandle(7));

        assert!(p.is_frame());
        assert_eq!(p.generation, 3);
        assert_eq!(p.drm, Some(DrmSessionHandle(7)));
        assert!(matches!(
            p.payload,
            PacketPayload::Frame { keyframe: true, .. }
        ));
    }

    #[test]
    fn config_packet_takes_kind_from_config() {
        let p = Packet::config(Duration::ZERO, aac());
        assert_eq!(p.kind, StreamKind::Audio);
        assert!(matches!(p.payload, PacketPayload::Config(_)));
    }

    #[test]
    fn eos_packet_is_terminal_marker() {
        let p = Packet::eos(StreamKind::Audio);
        assert!(p.is_eos());
        assert!(!p.is_frame());
    }

    #[test]
    fn with_keyframe_ignores_non_frames() {
        let p = Packet::eos(StreamKind::Video).with_keyframe(true);
        assert!(p.is_eos());
    }
}
