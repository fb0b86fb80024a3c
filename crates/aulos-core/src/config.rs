#![forbid(unsafe_code)]

//! Codec configuration descriptors.
//!
//! A [`StreamConfig`] describes how the native player must set up the decoder
//! for one elementary stream. Configs compare by value; the transfer layer
//! uses [`StreamConfig::requires_restart`] to decide whether a mid-stream
//! config change can be absorbed by the running player or needs a full
//! player restart.

use bytes::Bytes;

use crate::stream::StreamKind;

/// Audio codec identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum AudioCodec {
    Aac,
    Ac3,
    Eac3,
    Mp3,
    Opus,
    Vorbis,
}

/// Video codec identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum VideoCodec {
    H264,
    H265,
    Vp8,
    Vp9,
    Av1,
}

/// Decoder setup for an audio stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioStreamConfig {
    pub codec: AudioCodec,
    pub sample_rate: u32,
    pub channels: u8,
    /// Average bitrate in bits per second. Feeds buffer-level estimation.
    pub bitrate: u64,
    /// Codec-specific initialization data (e.g. AudioSpecificConfig).
    pub extradata: Option<Bytes>,
}

/// Decoder setup for a video stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoStreamConfig {
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
    /// Frames per second, rounded. Informational.
    pub frame_rate: u32,
    /// Average bitrate in bits per second. Feeds buffer-level estimation.
    pub bitrate: u64,
    /// Codec-specific initialization data (e.g. SPS/PPS).
    pub extradata: Option<Bytes>,
}

/// Codec configuration for one elementary stream. Equality is by value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamConfig {
    Audio(AudioStreamConfig),
    Video(VideoStreamConfig),
}

impl StreamConfig {
    /// The stream kind this config belongs to.
    #[must_use]
    pub fn kind(&self) -> StreamKind {
        match self {
            StreamConfig::Audio(_) => StreamKind::Audio,
            StreamConfig::Video(_) => StreamKind::Video,
        }
    }

    /// Average bitrate in bits per second.
    #[must_use]
    pub fn bitrate(&self) -> u64 {
        match self {
            StreamConfig::Audio(c) => c.bitrate,
            StreamConfig::Video(c) => c.bitrate,
        }
    }

    /// Codec initialization data, if any.
    #[must_use]
    pub fn extradata(&self) -> Option<&Bytes> {
        match self {
            StreamConfig::Audio(c) => c.extradata.as_ref(),
            StreamConfig::Video(c) => c.extradata.as_ref(),
        }
    }

    /// Whether switching from `self` to `next` is a destructive
    /// reconfiguration.
    ///
    /// A codec identity change cannot be absorbed by the running native
    /// player; parameter changes within the same codec (resolution, bitrate,
    /// extradata) can.
    #[must_use]
    pub fn requires_restart(&self, next: &StreamConfig) -> bool {
        match (self, next) {
            (StreamConfig::Audio(a), StreamConfig::Audio(b)) => a.codec != b.codec,
            (StreamConfig::Video(a), StreamConfig::Video(b)) => a.codec != b.codec,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(codec: AudioCodec) -> StreamConfig {
        StreamConfig::Audio(AudioStreamConfig {
            codec,
            sample_rate: 48_000,
            channels: 2,
            bitrate: 128_000,
            extradata: None,
        })
    }

    fn video(codec: VideoCodec, width: u32) -> StreamConfig {
        StreamConfig::Video(VideoStreamConfig {
            codec,
            width,
            height: 1080,
            frame_rate: 30,
            bitrate: 4_000_000,
            extradata: None,
        })
    }

    #[test]
    fn equality_is_by_value() {
        assert_eq!(audio(AudioCodec::Aac), audio(AudioCodec::Aac));
        assert_ne!(audio(AudioCodec::Aac), audio(AudioCodec::Opus));
    }

    #[test]
    fn same_codec_parameter_change_is_absorbable() {
        let a = video(VideoCodec::H264, 1920);
        let b = video(VideoCodec::H264, 1280);
        assert!(!a.requires_restart(&b));
    }

    #[test]
    fn codec_change_requires_restart() {
        let a = video(VideoCodec::H264, 1920);
        let b = video(VideoCodec::H265, 1920);
        assert!(a.requires_restart(&b));
    }

    #[test]
    fn kind_change_requires_restart() {
        assert!(audio(AudioCodec::Aac).requires_restart(&video(VideoCodec::H264, 1920)));
    }
}
