#![forbid(unsafe_code)]

//! Per-stream buffer-level accounting.

use std::time::Duration;

use aulos_core::{DataRequest, StreamConfig, StreamKind};
use parking_lot::Mutex;
use tracing::trace;

/// Default target buffer depth.
pub const DEFAULT_TARGET_DEPTH: Duration = Duration::from_secs(10);

/// Below this level the buffer counts as empty (unless EOS was seen).
const EMPTY_EPSILON: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct Inner {
    first_in: Option<Duration>,
    last_in: Option<Duration>,
    last_out: Option<Duration>,
    eos_seen: bool,
    avg_bitrate: u64,
    reported_full: bool,
}

impl Inner {
    /// Buffered content duration: newest ingested PTS minus the newest
    /// consumed PTS (or the first ingested PTS while nothing left yet).
    fn level(&self) -> Duration {
        let Some(last_in) = self.last_in else {
            return Duration::ZERO;
        };
        let baseline = self.last_out.or(self.first_in).unwrap_or(last_in);
        last_in.saturating_sub(baseline)
    }

    fn is_empty(&self) -> bool {
        !self.eos_seen && self.level() < EMPTY_EPSILON
    }
}

/// Buffer-level accountant for one elementary stream.
///
/// Ingests packet PTS on enqueue/dequeue and derives [`DataRequest`] hints
/// telling the producer how much more content the pipeline wants.
#[derive(Debug)]
pub struct StreamBuffer {
    kind: StreamKind,
    target_depth: Duration,
    inner: Mutex<Inner>,
}

impl StreamBuffer {
    #[must_use]
    pub fn new(kind: StreamKind) -> Self {
        Self::with_target_depth(kind, DEFAULT_TARGET_DEPTH)
    }

    #[must_use]
    pub fn with_target_depth(kind: StreamKind, target_depth: Duration) -> Self {
        Self {
            kind,
            target_depth,
            inner: Mutex::new(Inner::default()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Record a packet entering storage.
    pub fn data_in(&self, pts: Duration) {
        let mut inner = self.inner.lock();
        if inner.first_in.is_none() {
            inner.first_in = Some(pts);
        }
        inner.last_in = Some(inner.last_in.map_or(pts, |prev| prev.max(pts)));
    }

    /// Record a packet leaving storage toward the player.
    pub fn data_out(&self, pts: Duration) {
        let mut inner = self.inner.lock();
        inner.last_out = Some(inner.last_out.map_or(pts, |prev| prev.max(pts)));
    }

    /// Record that the stream's end was observed on ingress. An empty buffer
    /// with EOS seen is drained, not underrun.
    pub fn mark_eos_dts(&self) {
        self.inner.lock().eos_seen = true;
    }

    /// Whether end-of-stream was observed on ingress.
    #[must_use]
    pub fn eos_seen(&self) -> bool {
        self.inner.lock().eos_seen
    }

    /// Capture the average bitrate from a codec configuration.
    pub fn update_buffer_configuration(&self, config: &StreamConfig) {
        let mut inner = self.inner.lock();
        inner.avg_bitrate = config.bitrate();
        trace!(kind = %self.kind, bitrate = inner.avg_bitrate, "buffer configuration updated");
    }

    /// Forget the PTS window, e.g. across a seek. Keeps the bitrate.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        let bitrate = inner.avg_bitrate;
        *inner = Inner {
            avg_bitrate: bitrate,
            ..Inner::default()
        };
    }

    /// Downstream reported its buffer full: stop requesting data.
    pub fn report_full_buffer(&self) {
        self.inner.lock().reported_full = true;
    }

    /// Downstream consumes again: resume requesting data.
    pub fn report_actual_buffer(&self) {
        self.inner.lock().reported_full = false;
    }

    /// Coarse "needs buffering" signal.
    #[must_use]
    pub fn needs_buffering(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Current fill hint for the producer.
    #[must_use]
    pub fn data_request(&self) -> DataRequest {
        let inner = self.inner.lock();
        let duration_needed = if inner.reported_full {
            Duration::ZERO
        } else {
            self.target_depth.saturating_sub(inner.level())
        };
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let bytes_needed = (duration_needed.as_secs_f64() * inner.avg_bitrate as f64 / 8.0) as u64;
        DataRequest {
            kind: self.kind,
            bytes_needed,
            duration_needed,
            is_buffer_empty: inner.is_empty(),
        }
    }
}
