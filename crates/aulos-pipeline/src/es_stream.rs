#![forbid(unsafe_code)]

//! Per-stream transfer pump.
//!
//! An [`EsStream`] moves packets from [`PacketStorage`] into the native
//! player for one elementary stream, honoring start/stop, codec
//! reconfiguration boundaries and seek generations. Packets leave storage in
//! FIFO order and are submitted in that order, so delivery stays monotonic
//! in DTS per stream.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use aulos_core::{Packet, PacketPayload, PlayerError, PlayerResult, StreamConfig, StreamKind};
use aulos_storage::{PacketStorage, StorageError, StreamBuffer};
use parking_lot::{Mutex, RwLock};
use tokio::{
    sync::{Notify, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::platform::{PlatformPlayer, SubmitStatus};

/// Transfer state of one stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EsStreamState {
    Idle,
    Configured,
    Starting,
    Transferring,
    Stopped,
    /// Terminal for input; the stream never pumps again.
    Disabled,
}

/// Outcome of pushing a config into the stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigOutcome {
    /// Config applied (or replaced the held one) immediately.
    Accepted,
    /// Transfer is running; the config was queued and the in-band boundary
    /// will decide between absorbing it and requesting a restart.
    Queued,
}

/// Outcome of repositioning the stream to a new seek generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamSeekOutcome {
    Completed,
    /// The codec config changed destructively across the seek boundary; the
    /// native player must be restarted before transfer can resume.
    RestartRequired,
}

/// Upward emissions from a stream toward the controller.
#[derive(Clone, Debug)]
pub enum EsStreamEvent {
    /// A destructive config boundary was reached; the player must be
    /// recreated.
    Reconfigure(StreamKind),
    /// The transfer task hit a fatal submission error.
    Error { kind: StreamKind, message: String },
}

enum SubmitOutcome {
    Sent,
    Cancelled,
    Failed,
}

struct TransferRun {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Per-stream transfer pump between packet storage and the native player.
pub struct EsStream {
    kind: StreamKind,
    storage: Arc<PacketStorage>,
    buffer: Arc<StreamBuffer>,
    player: RwLock<Arc<dyn PlatformPlayer>>,
    state: Mutex<EsStreamState>,
    /// Seek generation packets must match to be delivered.
    target_generation: AtomicU64,
    /// Config currently applied to the player.
    active_config: Mutex<Option<StreamConfig>>,
    /// Config waiting for the player restart (or the in-band boundary).
    pending_config: Mutex<Option<StreamConfig>>,
    /// Packet taken out of storage but not yet delivered; the next run
    /// delivers it first so nothing is lost or reordered across stop/start.
    parked_packet: Mutex<Option<Packet>>,
    wakeup: Notify,
    /// Serializes transfer runs: a new run waits for the previous task to
    /// fully exit before consuming storage, preserving FIFO delivery.
    pump_gate: Arc<tokio::sync::Mutex<()>>,
    run: Mutex<Option<TransferRun>>,
    events_tx: mpsc::UnboundedSender<EsStreamEvent>,
}

impl EsStream {
    pub fn new(
        kind: StreamKind,
        storage: Arc<PacketStorage>,
        buffer: Arc<StreamBuffer>,
        player: Arc<dyn PlatformPlayer>,
        events_tx: mpsc::UnboundedSender<EsStreamEvent>,
    ) -> Self {
        Self {
            kind,
            storage,
            buffer,
            player: RwLock::new(player),
            state: Mutex::new(EsStreamState::Idle),
            target_generation: AtomicU64::new(0),
            active_config: Mutex::new(None),
            pending_config: Mutex::new(None),
            parked_packet: Mutex::new(None),
            wakeup: Notify::new(),
            pump_gate: Arc::new(tokio::sync::Mutex::new(())),
            run: Mutex::new(None),
            events_tx,
        }
    }

    #[must_use]
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    #[must_use]
    pub fn state(&self) -> EsStreamState {
        *self.state.lock()
    }

    /// Whether a config has been pushed into this stream.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !matches!(self.state(), EsStreamState::Idle | EsStreamState::Disabled)
    }

    /// Bind the underlying native-player reference. Valid while transfer is
    /// not running.
    pub fn set_player(&self, player: Arc<dyn PlatformPlayer>) -> PlayerResult<()> {
        let state = self.state.lock();
        match *state {
            EsStreamState::Idle | EsStreamState::Configured | EsStreamState::Stopped => {
                *self.player.write() = player;
                Ok(())
            }
            other => Err(PlayerError::InvalidState(format!(
                "cannot rebind player while {other:?}"
            ))),
        }
    }

    /// Push a codec configuration into the stream.
    pub fn set_stream_config(&self, config: StreamConfig) -> PlayerResult<ConfigOutcome> {
        let mut state = self.state.lock();
        match *state {
            EsStreamState::Disabled => Err(PlayerError::InvalidState(
                "stream disabled".into(),
            )),
            EsStreamState::Idle => {
                self.push_config_to_player(&config)?;
                *self.active_config.lock() = Some(config);
                *state = EsStreamState::Configured;
                debug!(kind = %self.kind, "stream configured");
                Ok(ConfigOutcome::Accepted)
            }
            EsStreamState::Configured | EsStreamState::Stopped => {
                self.push_config_to_player(&config)?;
                *self.active_config.lock() = Some(config);
                Ok(ConfigOutcome::Accepted)
            }
            EsStreamState::Starting | EsStreamState::Transferring => {
                if self.active_config.lock().as_ref() == Some(&config) {
                    return Ok(ConfigOutcome::Accepted);
                }
                debug!(kind = %self.kind, "config change while transferring, queued");
                *self.pending_config.lock() = Some(config);
                Ok(ConfigOutcome::Queued)
            }
        }
    }

    /// Re-apply the held config after the native player was replaced.
    pub fn reset_stream_config(&self) -> PlayerResult<()> {
        let config = {
            let pending = self.pending_config.lock().take();
            pending.or_else(|| self.active_config.lock().clone())
        };
        let Some(config) = config else {
            return Err(PlayerError::InvalidState("no config to re-apply".into()));
        };
        self.push_config_to_player(&config)?;
        let mut state = self.state.lock();
        if *state == EsStreamState::Idle {
            *state = EsStreamState::Configured;
        }
        *self.active_config.lock() = Some(config);
        debug!(kind = %self.kind, "stream config re-applied");
        Ok(())
    }

    fn push_config_to_player(&self, config: &StreamConfig) -> PlayerResult<()> {
        let player = self.player.read().clone();
        player.set_stream_config(config)
    }

    /// Spawn (or resume) the transfer task.
    pub fn start(self: &Arc<Self>, parent: &CancellationToken) -> PlayerResult<()> {
        {
            let mut state = self.state.lock();
            match *state {
                EsStreamState::Disabled => {
                    return Err(PlayerError::InvalidState("stream disabled".into()));
                }
                EsStreamState::Idle => {
                    return Err(PlayerError::InvalidState("stream not configured".into()));
                }
                EsStreamState::Starting | EsStreamState::Transferring => return Ok(()),
                EsStreamState::Configured | EsStreamState::Stopped => {
                    *state = EsStreamState::Starting;
                }
            }
        }

        let cancel = parent.child_token();
        let task = tokio::spawn(Arc::clone(self).transfer_loop(cancel.clone()));
        *self.run.lock() = Some(TransferRun { cancel, task });
        Ok(())
    }

    /// Signal the transfer task to park at the next safe point. Queued
    /// packets stay in storage. Idempotent, callable from any state.
    pub fn stop(&self) {
        {
            let mut state = self.state.lock();
            match *state {
                EsStreamState::Starting | EsStreamState::Transferring => {
                    *state = EsStreamState::Stopped;
                }
                _ => {}
            }
        }
        if let Some(run) = self.run.lock().as_ref() {
            run.cancel.cancel();
        }
    }

    /// Terminal shutdown of this stream's input.
    pub fn disable(&self) {
        *self.state.lock() = EsStreamState::Disabled;
        if let Some(run) = self.run.lock().as_ref() {
            run.cancel.cancel();
        }
        self.storage.disable_input(self.kind);
        debug!(kind = %self.kind, "stream disabled");
    }

    /// Completion handle of the current transfer run, for awaiting
    /// quiescence. Taking it does not stop the task.
    pub fn take_active_task(&self) -> Option<JoinHandle<()>> {
        self.run.lock().take().map(|run| run.task)
    }

    /// Nudge the transfer task after a buffer-underrun report.
    pub fn wakeup(&self) {
        self.wakeup.notify_one();
    }

    /// Install `seek_id` as the target generation and discard storage up to
    /// the first packet of that generation, which is parked for the next
    /// transfer run.
    ///
    /// Suspends until the producer delivers post-seek packets; cancellable
    /// via `token`.
    pub async fn seek(
        &self,
        seek_id: u64,
        token: &CancellationToken,
    ) -> PlayerResult<StreamSeekOutcome> {
        self.target_generation.store(seek_id, Ordering::Release);
        self.parked_packet.lock().take();
        self.buffer.reset();
        let mut discarded = 0usize;

        loop {
            let packet = tokio::select! {
                () = token.cancelled() => return Err(PlayerError::Cancelled),
                result = self.storage.take(self.kind) => match result {
                    Ok(packet) => packet,
                    // Storage only closes on dispose.
                    Err(StorageError::Closed) => return Err(PlayerError::Cancelled),
                    Err(e) => return Err(e.into()),
                },
            };

            if packet.generation < seek_id {
                discarded += 1;
                continue;
            }

            let outcome = match &packet.payload {
                PacketPayload::Config(config) => {
                    let destructive = self
                        .active_config
                        .lock()
                        .as_ref()
                        .is_some_and(|current| current.requires_restart(config));
                    if destructive {
                        *self.pending_config.lock() = Some(config.clone());
                        StreamSeekOutcome::RestartRequired
                    } else {
                        StreamSeekOutcome::Completed
                    }
                }
                _ => StreamSeekOutcome::Completed,
            };

            debug!(
                kind = %self.kind,
                seek_id,
                discarded,
                ?outcome,
                "seek reached target generation"
            );
            // Stored-duration accounting restarts at the new position.
            self.storage.rebase_window(self.kind, packet.pts);
            *self.parked_packet.lock() = Some(packet);
            return Ok(outcome);
        }
    }

    // -- transfer task -----------------------------------------------------

    async fn transfer_loop(self: Arc<Self>, cancel: CancellationToken) {
        // A previous run may still be winding down; wait for it so storage
        // keeps a single consumer and delivery order is preserved.
        let _pump = self.pump_gate.clone().lock_owned().await;

        {
            let mut state = self.state.lock();
            if *state != EsStreamState::Starting {
                // stop()/disable() raced the spawn.
                return;
            }
            *state = EsStreamState::Transferring;
        }
        trace!(kind = %self.kind, "transfer started");

        loop {
            let Some(packet) = self.next_packet(&cancel).await else {
                break;
            };

            let target = self.target_generation.load(Ordering::Acquire);
            if packet.generation < target {
                trace!(
                    kind = %self.kind,
                    generation = packet.generation,
                    target,
                    "discarding stale packet"
                );
                continue;
            }

            match &packet.payload {
                PacketPayload::Eos => {
                    let player = self.player.read().clone();
                    if let Err(e) = player.submit_eos(self.kind) {
                        warn!(kind = %self.kind, ?e, "eos submission failed");
                    }
                    self.buffer.mark_eos_dts();
                    debug!(kind = %self.kind, "eos submitted, transfer parked");
                    break;
                }
                PacketPayload::Config(config) => {
                    if !self.apply_config_boundary(config) {
                        break;
                    }
                }
                PacketPayload::Frame { .. } => {
                    match self.submit_with_backpressure(&packet, &cancel).await {
                        SubmitOutcome::Sent => {}
                        SubmitOutcome::Cancelled => {
                            // Hold the packet for the next run.
                            *self.parked_packet.lock() = Some(packet);
                            break;
                        }
                        SubmitOutcome::Failed => break,
                    }
                }
            }
        }

        let mut state = self.state.lock();
        if *state == EsStreamState::Transferring {
            *state = EsStreamState::Stopped;
        }
        trace!(kind = %self.kind, state = ?*state, "transfer parked");
    }

    async fn next_packet(&self, cancel: &CancellationToken) -> Option<Packet> {
        if let Some(packet) = self.parked_packet.lock().take() {
            return Some(packet);
        }
        tokio::select! {
            () = cancel.cancelled() => None,
            result = self.storage.take(self.kind) => result.ok(),
        }
    }

    /// Handle an in-band config boundary. Returns `false` when the loop must
    /// park (destructive change emitted upstream, or the player rejected the
    /// config).
    fn apply_config_boundary(&self, config: &StreamConfig) -> bool {
        let current = self.active_config.lock().clone();
        match current {
            Some(ref active) if active == config => {
                trace!(kind = %self.kind, "duplicate config boundary, skipped");
                true
            }
            Some(ref active) if active.requires_restart(config) => {
                debug!(kind = %self.kind, "destructive config boundary");
                *self.pending_config.lock() = Some(config.clone());
                let _ = self
                    .events_tx
                    .send(EsStreamEvent::Reconfigure(self.kind));
                false
            }
            _ => {
                let player = self.player.read().clone();
                match player.set_stream_config(config) {
                    Ok(()) => {
                        *self.active_config.lock() = Some(config.clone());
                        self.pending_config.lock().take();
                        debug!(kind = %self.kind, "config boundary absorbed");
                        true
                    }
                    Err(e) => {
                        warn!(kind = %self.kind, ?e, "player rejected config");
                        let _ = self.events_tx.send(EsStreamEvent::Error {
                            kind: self.kind,
                            message: e.to_string(),
                        });
                        false
                    }
                }
            }
        }
    }

    async fn submit_with_backpressure(
        &self,
        packet: &Packet,
        cancel: &CancellationToken,
    ) -> SubmitOutcome {
        loop {
            if cancel.is_cancelled() {
                return SubmitOutcome::Cancelled;
            }
            let player = self.player.read().clone();
            match player.submit_packet(packet) {
                Ok(SubmitStatus::Accepted) => {
                    self.buffer.data_out(packet.pts);
                    return SubmitOutcome::Sent;
                }
                Ok(SubmitStatus::Full) => {
                    trace!(kind = %self.kind, "player buffer full, waiting for wakeup");
                    tokio::select! {
                        () = cancel.cancelled() => return SubmitOutcome::Cancelled,
                        () = self.wakeup.notified() => {}
                    }
                }
                Err(e) => {
                    warn!(kind = %self.kind, ?e, "packet submission failed");
                    let _ = self.events_tx.send(EsStreamEvent::Error {
                        kind: self.kind,
                        message: e.to_string(),
                    });
                    return SubmitOutcome::Failed;
                }
            }
        }
    }
}
