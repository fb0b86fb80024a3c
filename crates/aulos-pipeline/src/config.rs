#![forbid(unsafe_code)]

use std::time::Duration;

/// Tuning knobs of the pipeline. Design-time configuration, not exposed at
/// runtime.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Content every initialized stream must hold before prepare/seek lets
    /// the native player run. Default: 2 s.
    pub prebuffer_duration: Duration,
    /// Poll interval of the prebuffer gate. Default: 1 s.
    pub prebuffer_poll_interval: Duration,
    /// Period of the playback clock publishing `TimeUpdated`. Default: 500 ms.
    pub clock_interval: Duration,
    /// Period of the buffer-level reporter publishing `DataNeeded`.
    /// Default: 1 s.
    pub buffer_event_interval: Duration,
    /// Target buffer depth per stream. Default: 10 s.
    pub target_buffer_depth: Duration,
    /// Bound of each per-stream packet queue. Default: 256 packets.
    pub packet_queue_capacity: usize,
    /// Capacity of the player event bus. Default: 64.
    pub event_channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            prebuffer_duration: Duration::from_secs(2),
            prebuffer_poll_interval: Duration::from_secs(1),
            clock_interval: Duration::from_millis(500),
            buffer_event_interval: Duration::from_secs(1),
            target_buffer_depth: Duration::from_secs(10),
            packet_queue_capacity: 256,
            event_channel_capacity: 64,
        }
    }
}

impl PipelineConfig {
    /// Set the prebuffer threshold.
    #[must_use]
    pub fn with_prebuffer_duration(mut self, duration: Duration) -> Self {
        self.prebuffer_duration = duration;
        self
    }

    /// Set the prebuffer poll interval.
    #[must_use]
    pub fn with_prebuffer_poll_interval(mut self, interval: Duration) -> Self {
        self.prebuffer_poll_interval = interval;
        self
    }

    /// Set the playback clock period.
    #[must_use]
    pub fn with_clock_interval(mut self, interval: Duration) -> Self {
        self.clock_interval = interval;
        self
    }

    /// Set the buffer-level reporter period.
    #[must_use]
    pub fn with_buffer_event_interval(mut self, interval: Duration) -> Self {
        self.buffer_event_interval = interval;
        self
    }

    /// Set the per-stream target buffer depth.
    #[must_use]
    pub fn with_target_buffer_depth(mut self, depth: Duration) -> Self {
        self.target_buffer_depth = depth;
        self
    }

    /// Set the per-stream packet queue bound.
    #[must_use]
    pub fn with_packet_queue_capacity(mut self, capacity: usize) -> Self {
        self.packet_queue_capacity = capacity;
        self
    }
}
