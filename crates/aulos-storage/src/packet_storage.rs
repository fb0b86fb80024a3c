#![forbid(unsafe_code)]

//! Per-stream packet FIFO with duration accounting.

use std::sync::{
    OnceLock,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::time::Duration;

use aulos_core::{Packet, STREAM_COUNT, StreamKind};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{StorageError, StorageResult};

/// Sentinel for "no PTS observed yet".
const PTS_UNSET: u64 = u64::MAX;

fn pts_nanos(pts: Duration) -> u64 {
    // Nanoseconds overflow u64 only after ~584 years of media time.
    u64::try_from(pts.as_nanos()).unwrap_or(PTS_UNSET - 1)
}

/// One stream's queue: a bounded channel plus the PTS window of its content.
///
/// Stored duration is `last_pts_in − last_pts_out`, where the out baseline
/// starts at the first enqueued PTS until something is dequeued.
struct StreamQueue {
    tx: Mutex<Option<kanal::AsyncSender<Packet>>>,
    rx: kanal::AsyncReceiver<Packet>,
    pts_in: AtomicU64,
    pts_out: AtomicU64,
    input_disabled: AtomicBool,
}

impl StreamQueue {
    fn new(capacity: usize) -> Self {
        let (tx, rx) = kanal::bounded_async(capacity.max(1));
        Self {
            tx: Mutex::new(Some(tx)),
            rx,
            pts_in: AtomicU64::new(PTS_UNSET),
            pts_out: AtomicU64::new(PTS_UNSET),
            input_disabled: AtomicBool::new(false),
        }
    }

    fn record_in(&self, pts: Duration) {
        let nanos = pts_nanos(pts);
        self.pts_in.store(nanos, Ordering::Release);
        // First packet in also sets the out baseline.
        let _ = self.pts_out.compare_exchange(
            PTS_UNSET,
            nanos,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    fn record_out(&self, pts: Duration) {
        self.pts_out.store(pts_nanos(pts), Ordering::Release);
    }

    fn duration(&self) -> Duration {
        let pts_in = self.pts_in.load(Ordering::Acquire);
        let pts_out = self.pts_out.load(Ordering::Acquire);
        if pts_in == PTS_UNSET || pts_out == PTS_UNSET {
            return Duration::ZERO;
        }
        Duration::from_nanos(pts_in.saturating_sub(pts_out))
    }

    fn reset_window(&self) {
        self.pts_in.store(PTS_UNSET, Ordering::Release);
        self.pts_out.store(PTS_UNSET, Ordering::Release);
    }
}

/// Per-stream FIFO of encoded packets.
///
/// Bounded multi-producer single-consumer channel per stream: producers push
/// from the event side and suspend when the queue is full; the stream's
/// transfer task is the single consumer. The stored-duration estimate backs
/// the prebuffer gate.
pub struct PacketStorage {
    queues: [OnceLock<StreamQueue>; STREAM_COUNT],
    capacity: usize,
}

impl std::fmt::Debug for PacketStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketStorage")
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl PacketStorage {
    /// Create storage with the given per-stream queue capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            queues: Default::default(),
            capacity,
        }
    }

    /// Create the queue for `kind`. Must be called exactly once per kind.
    pub fn initialize(&self, kind: StreamKind) -> StorageResult<()> {
        self.queues[kind.index()]
            .set(StreamQueue::new(self.capacity))
            .map_err(|_| StorageError::AlreadyInitialized(kind))?;
        debug!(%kind, capacity = self.capacity, "packet storage initialized");
        Ok(())
    }

    /// Whether `kind` has been initialized.
    #[must_use]
    pub fn is_initialized(&self, kind: StreamKind) -> bool {
        self.queues[kind.index()].get().is_some()
    }

    fn queue(&self, kind: StreamKind) -> StorageResult<&StreamQueue> {
        self.queues[kind.index()]
            .get()
            .ok_or(StorageError::Uninitialized(kind))
    }

    /// Enqueue a packet, suspending while the queue is full.
    ///
    /// Fails with [`StorageError::InputDisabled`] after
    /// [`disable_input`](Self::disable_input) and [`StorageError::Closed`]
    /// after [`mark_complete`](Self::mark_complete).
    pub async fn push(&self, packet: Packet) -> StorageResult<()> {
        let queue = self.queue(packet.kind)?;
        if queue.input_disabled.load(Ordering::Acquire) {
            return Err(StorageError::InputDisabled(packet.kind));
        }
        let tx = queue.tx.lock().clone().ok_or(StorageError::Closed)?;

        let is_frame = packet.is_frame();
        let pts = packet.pts;
        tx.send(packet).await.map_err(|_| StorageError::Closed)?;
        if is_frame {
            queue.record_in(pts);
        }
        Ok(())
    }

    /// Dequeue the next packet, suspending while the queue is empty.
    ///
    /// Single consumer per stream. After [`mark_complete`](Self::mark_complete)
    /// the remaining packets drain normally, then `take` fails with
    /// [`StorageError::Closed`].
    pub async fn take(&self, kind: StreamKind) -> StorageResult<Packet> {
        let queue = self.queue(kind)?;
        let packet = queue.rx.recv().await.map_err(|_| StorageError::Closed)?;
        if packet.is_frame() {
            queue.record_out(packet.pts);
        }
        Ok(packet)
    }

    /// Stored content duration for `kind`. Zero when uninitialized or empty.
    #[must_use]
    pub fn duration(&self, kind: StreamKind) -> Duration {
        self.queues[kind.index()]
            .get()
            .map_or(Duration::ZERO, StreamQueue::duration)
    }

    /// Re-base the duration window at `pts` after the stream repositioned.
    ///
    /// The consumed-side PTS is pinned to `pts`; the ingested-side PTS keeps
    /// its value only if it is newer. Without this, a backward seek would
    /// leave the window measuring against pre-seek timestamps and the stored
    /// duration would read zero regardless of content.
    pub fn rebase_window(&self, kind: StreamKind, pts: Duration) {
        let Some(queue) = self.queues[kind.index()].get() else {
            return;
        };
        let nanos = pts_nanos(pts);
        queue.pts_out.store(nanos, Ordering::Release);
        let pts_in = queue.pts_in.load(Ordering::Acquire);
        if pts_in == PTS_UNSET || pts_in < nanos {
            queue.pts_in.store(nanos, Ordering::Release);
        }
    }

    /// Drop all queued packets for `kind` and reset the duration window.
    pub fn clear(&self, kind: StreamKind) -> StorageResult<()> {
        let queue = self.queue(kind)?;
        let mut dropped = 0usize;
        while let Ok(Some(_)) = queue.rx.try_recv() {
            dropped += 1;
        }
        queue.reset_window();
        trace!(%kind, dropped, "packet storage cleared");
        Ok(())
    }

    /// Reject further input for `kind`. Queued packets stay consumable.
    pub fn disable_input(&self, kind: StreamKind) {
        if let Some(queue) = self.queues[kind.index()].get() {
            queue.input_disabled.store(true, Ordering::Release);
        }
    }

    /// Complete `kind`: no more packets will be pushed. The consumer drains
    /// the remainder, then observes [`StorageError::Closed`].
    pub fn mark_complete(&self, kind: StreamKind) {
        if let Some(queue) = self.queues[kind.index()].get() {
            queue.tx.lock().take();
            debug!(%kind, "packet storage completed");
        }
    }

    /// Complete and disable every initialized stream. Idempotent.
    pub fn dispose(&self) {
        for kind in StreamKind::ALL {
            self.disable_input(kind);
            self.mark_complete(kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use rstest::rstest;

    use super::*;

    fn frame(kind: StreamKind, pts_ms: u64) -> Packet {
        Packet::frame(
            kind,
            Duration::from_millis(pts_ms),
            Duration::from_millis(pts_ms),
            Bytes::from_static(b"au"),
        )
    }

    fn storage_with(kind: StreamKind) -> PacketStorage {
        let storage = PacketStorage::new(64);
        storage.initialize(kind).unwrap();
        storage
    }

    #[test]
    fn double_initialize_is_rejected() {
        let storage = storage_with(StreamKind::Audio);
        assert_eq!(
            storage.initialize(StreamKind::Audio),
            Err(StorageError::AlreadyInitialized(StreamKind::Audio))
        );
    }

    #[tokio::test]
    async fn push_to_uninitialized_stream_fails() {
        let storage = PacketStorage::new(64);
        let result = storage.push(frame(StreamKind::Video, 0)).await;
        assert_eq!(result, Err(StorageError::Uninitialized(StreamKind::Video)));
    }

    #[tokio::test]
    async fn take_returns_packets_in_fifo_order() {
        let storage = storage_with(StreamKind::Audio);
        storage.push(frame(StreamKind::Audio, 0)).await.unwrap();
        storage.push(frame(StreamKind::Audio, 20)).await.unwrap();

        let first = storage.take(StreamKind::Audio).await.unwrap();
        let second = storage.take(StreamKind::Audio).await.unwrap();
        assert_eq!(first.pts, Duration::ZERO);
        assert_eq!(second.pts, Duration::from_millis(20));
    }

    #[tokio::test]
    async fn duration_tracks_pts_window() {
        let storage = storage_with(StreamKind::Video);
        for pts in [0u64, 500, 1000, 1500] {
            storage.push(frame(StreamKind::Video, pts)).await.unwrap();
        }
        assert_eq!(storage.duration(StreamKind::Video), Duration::from_millis(1500));

        // Consuming the head shrinks the window.
        let _ = storage.take(StreamKind::Video).await.unwrap();
        let _ = storage.take(StreamKind::Video).await.unwrap();
        assert_eq!(storage.duration(StreamKind::Video), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn non_frame_packets_do_not_affect_duration() {
        let storage = storage_with(StreamKind::Audio);
        storage.push(frame(StreamKind::Audio, 100)).await.unwrap();
        storage.push(Packet::eos(StreamKind::Audio)).await.unwrap();
        assert_eq!(storage.duration(StreamKind::Audio), Duration::ZERO);

        let _ = storage.take(StreamKind::Audio).await.unwrap();
        let eos = storage.take(StreamKind::Audio).await.unwrap();
        assert!(eos.is_eos());
    }

    #[tokio::test]
    async fn clear_drops_queued_packets_and_resets_duration() {
        let storage = storage_with(StreamKind::Audio);
        for pts in [0u64, 1000, 2000] {
            storage.push(frame(StreamKind::Audio, pts)).await.unwrap();
        }
        storage.clear(StreamKind::Audio).unwrap();

        assert_eq!(storage.duration(StreamKind::Audio), Duration::ZERO);
        storage.push(frame(StreamKind::Audio, 5000)).await.unwrap();
        let next = storage.take(StreamKind::Audio).await.unwrap();
        assert_eq!(next.pts, Duration::from_millis(5000));
    }

    #[tokio::test]
    async fn mark_complete_drains_then_closes() {
        let storage = storage_with(StreamKind::Video);
        storage.push(frame(StreamKind::Video, 0)).await.unwrap();
        storage.mark_complete(StreamKind::Video);

        assert!(storage.take(StreamKind::Video).await.is_ok());
        assert_eq!(
            storage.take(StreamKind::Video).await.unwrap_err(),
            StorageError::Closed
        );
    }

    #[tokio::test]
    async fn push_after_complete_fails() {
        let storage = storage_with(StreamKind::Video);
        storage.mark_complete(StreamKind::Video);
        assert_eq!(
            storage.push(frame(StreamKind::Video, 0)).await.unwrap_err(),
            StorageError::Closed
        );
    }

    #[tokio::test]
    async fn disabled_input_rejects_push_but_allows_take() {
        let storage = storage_with(StreamKind::Audio);
        storage.push(frame(StreamKind::Audio, 0)).await.unwrap();
        storage.disable_input(StreamKind::Audio);

        assert_eq!(
            storage.push(frame(StreamKind::Audio, 20)).await.unwrap_err(),
            StorageError::InputDisabled(StreamKind::Audio)
        );
        assert!(storage.take(StreamKind::Audio).await.is_ok());
    }

    #[rstest]
    #[case(StreamKind::Audio)]
    #[case(StreamKind::Video)]
    #[tokio::test]
    async fn dispose_is_idempotent(#[case] kind: StreamKind) {
        let storage = storage_with(kind);
        storage.dispose();
        storage.dispose();
        assert_eq!(storage.take(kind).await.unwrap_err(), StorageError::Closed);
    }

    #[tokio::test]
    async fn rebase_window_restarts_accounting_after_backward_reposition() {
        let storage = storage_with(StreamKind::Audio);
        for pts in [0u64, 1000, 2000, 3000] {
            storage.push(frame(StreamKind::Audio, pts)).await.unwrap();
        }
        while storage.take(StreamKind::Audio).await.is_ok() {
            if storage.duration(StreamKind::Audio) == Duration::ZERO {
                break;
            }
        }

        // Seek back to 1 s: without a rebase the window would stay pinned at
        // the consumed 3 s mark and new content would never count.
        storage.rebase_window(StreamKind::Audio, Duration::from_secs(1));
        for pts in [1000u64, 1500, 2000] {
            storage.push(frame(StreamKind::Audio, pts)).await.unwrap();
        }
        assert_eq!(storage.duration(StreamKind::Audio), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn take_suspends_until_push() {
        let storage = std::sync::Arc::new(storage_with(StreamKind::Audio));
        let reader = {
            let storage = storage.clone();
            tokio::spawn(async move { storage.take(StreamKind::Audio).await })
        };

        tokio::task::yield_now().await;
        storage.push(frame(StreamKind::Audio, 40)).await.unwrap();

        let taken = reader.await.unwrap().unwrap();
        assert_eq!(taken.pts, Duration::from_millis(40));
    }
}
