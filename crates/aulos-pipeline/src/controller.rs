#![forbid(unsafe_code)]

//! The stream controller.
//!
//! Owns the playback state machine, the per-stream transfer pumps, the
//! packet storage, the playback clock and the native player handle.
//! `prepare`, `seek` and `reconfigure` are exclusive operations serialized
//! on a single-permit async mutex; `play`/`pause`/`stop` manipulate transfer
//! enablement and the clock directly.

use std::sync::{
    Arc, OnceLock,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::time::Duration;

use aulos_core::{
    Packet, PlayerError, PlayerResult, PlayerState, STREAM_COUNT, StreamConfig, StreamKind,
};
use aulos_events::{EventBus, PlayerEvent};
use aulos_storage::{PacketStorage, StreamBuffer};
use parking_lot::{Mutex, RwLock};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
    clock::{self, ClockHandle},
    config::PipelineConfig,
    es_stream::{EsStream, EsStreamEvent, StreamSeekOutcome},
    platform::{
        BufferStatus, DisplayHandle, PlatformEvent, PlatformPlayer, PlatformState, PlayerFactory,
        ReadyCallback,
    },
};

/// Internal lifecycle of the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ControllerState {
    Uninitialized,
    Initialized,
    Preparing,
    Ready,
    Playing,
    Paused,
    Seeking,
    Reconfiguring,
    Stopping,
    Disposed,
}

struct ListenerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Orchestrator of the elementary-stream pipeline.
pub struct StreamController {
    config: PipelineConfig,
    /// Controller-wide cancellation, fired on dispose.
    active: CancellationToken,
    /// Single-permit serializer for prepare/seek/reconfigure.
    serializer: tokio::sync::Mutex<()>,
    player: RwLock<Arc<dyn PlatformPlayer>>,
    factory: PlayerFactory,
    display: Option<DisplayHandle>,
    streams: [OnceLock<Arc<EsStream>>; STREAM_COUNT],
    buffers: [OnceLock<Arc<StreamBuffer>>; STREAM_COUNT],
    storage: Arc<PacketStorage>,
    seek_id: AtomicU64,
    state: Mutex<ControllerState>,
    last_player_state: Mutex<PlayerState>,
    bus: EventBus<PlayerEvent>,
    clock: Mutex<Option<ClockHandle>>,
    es_events_tx: mpsc::UnboundedSender<EsStreamEvent>,
    ready_tx: mpsc::UnboundedSender<StreamKind>,
    platform_listener: Mutex<Option<ListenerHandle>>,
    disposed: AtomicBool,
}

impl StreamController {
    /// Create the controller and its first native player.
    ///
    /// Must be called within a tokio runtime; the controller spawns its
    /// listener tasks immediately.
    pub fn new(
        factory: PlayerFactory,
        display: Option<DisplayHandle>,
        config: PipelineConfig,
    ) -> PlayerResult<Arc<Self>> {
        let player = factory()?;
        player.open()?;
        player.set_secure_output(true)?;
        if let Some(display) = display {
            player.set_display(display)?;
        }

        let (es_events_tx, es_events_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();
        let platform_events = player.subscribe();

        let this = Arc::new(Self {
            bus: EventBus::new(config.event_channel_capacity),
            storage: Arc::new(PacketStorage::new(config.packet_queue_capacity)),
            config,
            active: CancellationToken::new(),
            serializer: tokio::sync::Mutex::new(()),
            player: RwLock::new(player),
            factory,
            display,
            streams: Default::default(),
            buffers: Default::default(),
            seek_id: AtomicU64::new(0),
            state: Mutex::new(ControllerState::Uninitialized),
            last_player_state: Mutex::new(PlayerState::Idle),
            clock: Mutex::new(None),
            es_events_tx,
            ready_tx,
            platform_listener: Mutex::new(None),
            disposed: AtomicBool::new(false),
        });

        this.spawn_platform_listener(platform_events);
        this.spawn_es_event_listener(es_events_rx);
        this.spawn_ready_marshaller(ready_rx);
        this.spawn_buffer_reporter();
        info!("stream controller created");
        Ok(this)
    }

    // -- observability -----------------------------------------------------

    /// The controller's event subject.
    #[must_use]
    pub fn events(&self) -> &EventBus<PlayerEvent> {
        &self.bus
    }

    /// Subscribe to controller events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.bus.subscribe()
    }

    /// Last published observable state.
    #[must_use]
    pub fn player_state(&self) -> PlayerState {
        *self.last_player_state.lock()
    }

    /// Seek generation currently in effect. Packets appended by the producer
    /// must carry this generation to survive the transfer fence.
    #[must_use]
    pub fn current_seek_id(&self) -> u64 {
        self.seek_id.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// A token cancelled when the controller is disposed, for narrowing
    /// work that must not outlive it.
    #[must_use]
    pub fn dispose_token(&self) -> CancellationToken {
        self.active.child_token()
    }

    pub(crate) fn current_player(&self) -> Arc<dyn PlatformPlayer> {
        self.player.read().clone()
    }

    // -- stream setup ------------------------------------------------------

    /// Create the storage queue, buffer accountant and transfer pump for
    /// `kind`. Once per kind.
    pub fn initialize(&self, kind: StreamKind) -> PlayerResult<()> {
        self.ensure_live()?;
        self.storage.initialize(kind)?;

        let buffer = Arc::new(StreamBuffer::with_target_depth(
            kind,
            self.config.target_buffer_depth,
        ));
        let stream = Arc::new(EsStream::new(
            kind,
            Arc::clone(&self.storage),
            Arc::clone(&buffer),
            self.current_player(),
            self.es_events_tx.clone(),
        ));
        // The storage gate above makes double-initialization unreachable here.
        let _ = self.buffers[kind.index()].set(buffer);
        let _ = self.streams[kind.index()].set(stream);

        let mut state = self.state.lock();
        if *state == ControllerState::Uninitialized {
            *state = ControllerState::Initialized;
        }
        debug!(%kind, "stream initialized");
        Ok(())
    }

    /// Push a codec configuration into `config.kind()`'s stream. When the
    /// last initialized stream becomes configured, preparation starts in the
    /// background.
    pub fn set_stream_config(self: &Arc<Self>, config: StreamConfig) -> PlayerResult<()> {
        self.ensure_live()?;
        let kind = config.kind();
        self.buffer(kind)?.update_buffer_configuration(&config);
        self.stream(kind)?.set_stream_config(config).map_err(|e| {
            if matches!(e, PlayerError::UnsupportedStream(_)) {
                self.bus.publish(PlayerEvent::PlaybackError(e.to_string()));
            }
            e
        })?;

        let should_prepare = {
            let mut state = self.state.lock();
            if *state == ControllerState::Initialized && self.all_streams_configured() {
                *state = ControllerState::Preparing;
                true
            } else {
                false
            }
        };
        if should_prepare {
            debug!("all streams configured, starting preparation");
            tokio::spawn(Arc::clone(self).run_prepare());
        }
        Ok(())
    }

    /// Append a packet to its stream's storage, suspending while the queue
    /// is full.
    pub async fn append_packet(&self, packet: Packet) -> PlayerResult<()> {
        self.ensure_live()?;
        let kind = packet.kind;
        let pts = packet.pts;
        let is_frame = packet.is_frame();
        let is_eos = packet.is_eos();

        self.storage.push(packet).await?;

        let buffer = self.buffer(kind)?;
        if is_frame {
            buffer.data_in(pts);
        } else if is_eos {
            buffer.mark_eos_dts();
        }
        Ok(())
    }

    // -- non-suspending playback controls ----------------------------------

    /// Enter playback. Requires every initialized stream configured and the
    /// native player in Ready or Paused (Playing is a no-op).
    pub fn play(self: &Arc<Self>) -> PlayerResult<()> {
        self.ensure_live()?;
        if !self.all_streams_configured() {
            return Err(PlayerError::InvalidState(
                "not all streams configured".into(),
            ));
        }

        let player = self.current_player();
        match player.state() {
            PlatformState::Playing => return Ok(()),
            PlatformState::Ready => player.start().map_err(|e| {
                self.bus
                    .publish(PlayerEvent::PlaybackError("Start Failed".into()));
                PlayerError::native("Start Failed", e.to_string())
            })?,
            PlatformState::Paused => player.resume().map_err(|e| {
                self.bus
                    .publish(PlayerEvent::PlaybackError("Start Failed".into()));
                PlayerError::native("Start Failed", e.to_string())
            })?,
            PlatformState::Idle => {
                return Err(PlayerError::InvalidState("player not prepared".into()));
            }
        }

        self.enable_transfer();
        self.start_clock();
        self.set_state(ControllerState::Playing);
        self.publish_state(PlayerState::Playing);
        Ok(())
    }

    /// Leave playback but keep the position.
    pub fn pause(&self) -> PlayerResult<()> {
        self.ensure_live()?;
        self.disable_transfer();
        // Lifecycle-transition failures of the native player are expected
        // (e.g. pause racing a stop) and suppressed.
        if let Err(e) = self.current_player().pause() {
            debug!(?e, "native pause suppressed");
        }
        self.stop_clock_detached();
        self.set_state(ControllerState::Paused);
        self.publish_state(PlayerState::Paused);
        Ok(())
    }

    /// Stop playback. A no-op (publishing nothing) unless the native player
    /// is Playing or Paused.
    pub fn stop(&self) -> PlayerResult<()> {
        self.ensure_live()?;
        let player = self.current_player();
        match player.state() {
            PlatformState::Playing | PlatformState::Paused => {
                self.set_state(ControllerState::Stopping);
                self.disable_transfer();
                if let Err(e) = player.stop() {
                    debug!(?e, "native stop suppressed");
                }
                self.stop_clock_detached();
                self.set_state(ControllerState::Initialized);
                self.publish_state(PlayerState::Idle);
            }
            _ => trace!("stop ignored outside playback"),
        }
        Ok(())
    }

    // -- seek --------------------------------------------------------------

    /// Reposition playback. Returns the operation's completion handle.
    ///
    /// The new seek generation takes effect before this returns, so packets
    /// the producer emits after acknowledging the seek are stamped correctly.
    pub fn seek(self: &Arc<Self>, position: Duration) -> JoinHandle<PlayerResult<()>> {
        let id = self.seek_id.fetch_add(1, Ordering::SeqCst) + 1;
        let token = self.active.child_token();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.ensure_live()?;
            this.run_seek(id, position, token).await
        })
    }

    async fn run_seek(
        self: Arc<Self>,
        id: u64,
        position: Duration,
        token: CancellationToken,
    ) -> PlayerResult<()> {
        debug!(id, ?position, "seek requested");
        self.set_state(ControllerState::Seeking);
        let result = self.seek_inner(id, position, &token).await;

        // SeekCompleted is due even on failure, unless dispose cancelled us.
        if !self.active.is_cancelled() {
            self.bus.publish(PlayerEvent::SeekCompleted { id });
        }

        match &result {
            Ok(()) => debug!(id, "seek completed"),
            Err(e) if e.is_cancelled() => debug!(id, "seek cancelled"),
            Err(e) => {
                warn!(id, ?e, "seek failed");
                self.bus
                    .publish(PlayerEvent::PlaybackError("Seek Failed".into()));
            }
        }
        result
    }

    async fn seek_inner(
        self: &Arc<Self>,
        id: u64,
        position: Duration,
        token: &CancellationToken,
    ) -> PlayerResult<()> {
        self.quiesce_streams(token).await?;
        self.bus.publish(PlayerEvent::SeekStarted { id, position });

        let _permit = self.serializer.lock().await;

        let streams = self.initialized_streams();
        let outcomes =
            futures::future::try_join_all(streams.iter().map(|s| s.seek(id, token))).await?;

        if outcomes
            .iter()
            .any(|o| *o == StreamSeekOutcome::RestartRequired)
        {
            debug!(id, "destructive reconfiguration across seek boundary");
            self.reconfigure_locked(token).await?;
            return Ok(());
        }

        self.prebuffer(token).await?;

        let player = self.current_player();
        player
            .seek(position, self.ready_callback())
            .await
            .map_err(|e| {
                if e.is_cancelled() {
                    e
                } else {
                    PlayerError::native("Seek Failed", e.to_string())
                }
            })?;

        self.start_clock();
        self.set_state(ControllerState::Playing);
        Ok(())
    }

    // -- prepare -----------------------------------------------------------

    async fn run_prepare(self: Arc<Self>) {
        let token = self.active.child_token();
        match self.prepare_inner(&token).await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {
                debug!("preparation cancelled");
                self.disable_transfer();
                self.set_state(ControllerState::Initialized);
            }
            Err(e) => {
                warn!(?e, "preparation failed");
                self.disable_transfer();
                self.set_state(ControllerState::Initialized);
                self.bus.publish(PlayerEvent::PlaybackError(e.to_string()));
            }
        }
    }

    async fn prepare_inner(self: &Arc<Self>, token: &CancellationToken) -> PlayerResult<()> {
        let _permit = self.serializer.lock().await;
        self.prebuffer(token).await?;

        let player = self.current_player();
        player.prepare(self.ready_callback()).await?;

        self.start_clock();
        self.set_state(ControllerState::Ready);
        self.publish_state(PlayerState::Prepared);
        Ok(())
    }

    /// Wait until every initialized stream holds at least the prebuffer
    /// threshold (or reached EOS on ingress).
    async fn prebuffer(&self, token: &CancellationToken) -> PlayerResult<()> {
        loop {
            let ready = self.initialized_kinds().into_iter().all(|kind| {
                self.storage.duration(kind) >= self.config.prebuffer_duration
                    || self.buffers[kind.index()]
                        .get()
                        .is_some_and(|b| b.eos_seen())
            });
            if ready {
                return Ok(());
            }
            trace!("prebuffering");
            tokio::select! {
                () = token.cancelled() => return Err(PlayerError::Cancelled),
                () = tokio::time::sleep(self.config.prebuffer_poll_interval) => {}
            }
        }
    }

    // -- reconfigure -------------------------------------------------------

    fn trigger_reconfigure(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let token = this.active.child_token();
            let _permit = this.serializer.lock().await;
            match this.reconfigure_locked(&token).await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => debug!("reconfiguration cancelled"),
                Err(e) => {
                    warn!(?e, "reconfiguration failed");
                    this.disable_transfer();
                    this.bus
                        .publish(PlayerEvent::PlaybackError("Restart Error".into()));
                }
            }
        });
    }

    /// Replace the native player wholesale. Caller holds the serializer.
    async fn reconfigure_locked(self: &Arc<Self>, token: &CancellationToken) -> PlayerResult<()> {
        info!("reconfiguring native player");
        self.set_state(ControllerState::Reconfiguring);
        self.disable_transfer();
        self.prebuffer(token).await?;
        self.quiesce_streams(token).await?;

        let old = self.current_player();
        if let Err(e) = old.stop() {
            debug!(?e, "native stop before dispose suppressed");
        }
        old.dispose();

        let player = (self.factory)()?;
        player.open()?;
        player.set_secure_output(true)?;
        if let Some(display) = self.display {
            player.set_display(display)?;
        }
        let platform_events = player.subscribe();
        *self.player.write() = Arc::clone(&player);
        self.spawn_platform_listener(platform_events);

        for stream in self.initialized_streams() {
            stream.set_player(Arc::clone(&player))?;
            stream.reset_stream_config()?;
        }

        player.prepare(self.ready_callback()).await?;
        self.set_state(ControllerState::Ready);
        self.publish_state(PlayerState::Prepared);
        self.play()
    }

    // -- dispose -----------------------------------------------------------

    /// Tear everything down. Idempotent; public calls fail with `Disposed`
    /// afterwards.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("disposing stream controller");
        self.set_state(ControllerState::Disposed);
        self.active.cancel();

        self.disable_all_streams();
        let clock = self.take_clock();

        for stream in self.initialized_streams() {
            if let Some(task) = stream.take_active_task() {
                let _ = task.await;
            }
        }
        if let Some(clock) = clock {
            let _ = clock.task.await;
        }
        if let Some(listener) = self.platform_listener.lock().take() {
            listener.cancel.cancel();
            listener.task.abort();
        }

        self.storage.dispose();
        self.current_player().dispose();
    }

    // -- internals ---------------------------------------------------------

    fn ensure_live(&self) -> PlayerResult<()> {
        if self.is_disposed() {
            return Err(PlayerError::Disposed);
        }
        Ok(())
    }

    fn set_state(&self, state: ControllerState) {
        *self.state.lock() = state;
    }

    fn publish_state(&self, state: PlayerState) {
        *self.last_player_state.lock() = state;
        self.bus.publish(PlayerEvent::StateChanged(state));
    }

    fn stream(&self, kind: StreamKind) -> PlayerResult<&Arc<EsStream>> {
        self.streams[kind.index()]
            .get()
            .ok_or(PlayerError::InvalidArgument("stream not initialized"))
    }

    fn buffer(&self, kind: StreamKind) -> PlayerResult<&Arc<StreamBuffer>> {
        self.buffers[kind.index()]
            .get()
            .ok_or(PlayerError::InvalidArgument("stream not initialized"))
    }

    fn initialized_streams(&self) -> Vec<Arc<EsStream>> {
        self.streams
            .iter()
            .filter_map(|slot| slot.get().cloned())
            .collect()
    }

    fn initialized_kinds(&self) -> Vec<StreamKind> {
        StreamKind::ALL
            .into_iter()
            .filter(|kind| self.storage.is_initialized(*kind))
            .collect()
    }

    fn all_streams_configured(&self) -> bool {
        let streams = self.initialized_streams();
        !streams.is_empty() && streams.iter().all(|s| s.is_configured())
    }

    fn enable_transfer(&self) {
        for stream in self.initialized_streams() {
            if let Err(e) = stream.start(&self.active) {
                debug!(kind = %stream.kind(), ?e, "transfer not started");
            }
        }
    }

    fn disable_transfer(&self) {
        for stream in self.initialized_streams() {
            stream.stop();
        }
    }

    /// Disable transfer and input on every stream (EOS / fatal error path).
    fn disable_all_streams(&self) {
        for stream in self.initialized_streams() {
            stream.disable();
        }
    }

    /// Stop transfer and the clock, then await full quiescence of their
    /// tasks.
    async fn quiesce_streams(&self, token: &CancellationToken) -> PlayerResult<()> {
        self.disable_transfer();
        let mut handles: Vec<JoinHandle<()>> = Vec::new();
        for stream in self.initialized_streams() {
            if let Some(task) = stream.take_active_task() {
                handles.push(task);
            }
        }
        if let Some(clock) = self.take_clock() {
            handles.push(clock.task);
        }

        let joined = futures::future::join_all(handles);
        tokio::select! {
            () = token.cancelled() => Err(PlayerError::Cancelled),
            results = joined => {
                for result in results {
                    if let Err(e) = result {
                        warn!(?e, "background task join failed");
                    }
                }
                Ok(())
            }
        }
    }

    fn start_clock(self: &Arc<Self>) {
        let mut guard = self.clock.lock();
        if guard.is_some() {
            return;
        }
        let cancel = self.active.child_token();
        *guard = Some(clock::spawn(self, self.config.clock_interval, cancel));
        trace!("clock generator started");
    }

    fn take_clock(&self) -> Option<ClockHandle> {
        let handle = self.clock.lock().take();
        if let Some(handle) = &handle {
            handle.cancel.cancel();
        }
        handle
    }

    fn stop_clock_detached(&self) {
        let _ = self.take_clock();
    }

    /// Callback handed to the native player's prepare/seek. Invoked from
    /// arbitrary threads, so it only forwards the stream kind onto the
    /// controller's marshaller task.
    fn ready_callback(&self) -> ReadyCallback {
        let tx = self.ready_tx.clone();
        Arc::new(move |kind| {
            let _ = tx.send(kind);
        })
    }

    // -- background listeners ----------------------------------------------

    fn spawn_platform_listener(self: &Arc<Self>, mut rx: broadcast::Receiver<PlatformEvent>) {
        let cancel = self.active.child_token();
        let token = cancel.clone();
        let weak = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    event = rx.recv() => match event {
                        Ok(event) => {
                            let Some(this) = weak.upgrade() else { break };
                            this.handle_platform_event(event);
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "platform events lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });
        let previous = self
            .platform_listener
            .lock()
            .replace(ListenerHandle { cancel, task });
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }
    }

    fn handle_platform_event(self: &Arc<Self>, event: PlatformEvent) {
        match event {
            PlatformEvent::EndOfStream => {
                info!("native end of stream");
                self.disable_all_streams();
                self.stop_clock_detached();
                self.publish_state(PlayerState::Completed);
            }
            PlatformEvent::Error(message) => {
                warn!(%message, "native player error");
                self.disable_all_streams();
                self.stop_clock_detached();
                self.bus.publish(PlayerEvent::PlaybackError(message));
            }
            PlatformEvent::BufferStatus {
                kind,
                status: BufferStatus::Underrun,
            } => {
                trace!(%kind, "underrun, waking transfer");
                if let Ok(stream) = self.stream(kind) {
                    stream.wakeup();
                }
            }
            PlatformEvent::BufferStatus {
                kind,
                status: BufferStatus::Overrun,
            } => {
                debug!(%kind, "native buffer overrun");
            }
        }
    }

    fn spawn_es_event_listener(
        self: &Arc<Self>,
        mut rx: mpsc::UnboundedReceiver<EsStreamEvent>,
    ) {
        let token = self.active.clone();
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    () = token.cancelled() => break,
                    event = rx.recv() => match event {
                        Some(event) => event,
                        None => break,
                    }
                };
                let Some(this) = weak.upgrade() else { break };
                match event {
                    EsStreamEvent::Reconfigure(kind) => {
                        debug!(%kind, "stream requested reconfiguration");
                        this.trigger_reconfigure();
                    }
                    EsStreamEvent::Error { kind, message } => {
                        warn!(%kind, %message, "stream transfer error");
                        this.disable_all_streams();
                        this.stop_clock_detached();
                        this.bus.publish(PlayerEvent::PlaybackError(message));
                    }
                }
            }
        });
    }

    fn spawn_ready_marshaller(self: &Arc<Self>, mut rx: mpsc::UnboundedReceiver<StreamKind>) {
        let token = self.active.clone();
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let kind = tokio::select! {
                    () = token.cancelled() => break,
                    kind = rx.recv() => match kind {
                        Some(kind) => kind,
                        None => break,
                    }
                };
                let Some(this) = weak.upgrade() else { break };
                if let Ok(stream) = this.stream(kind) {
                    if let Err(e) = stream.start(&this.active) {
                        debug!(%kind, ?e, "ready-to-start ignored");
                    }
                }
            }
        });
    }

    fn spawn_buffer_reporter(self: &Arc<Self>) {
        let token = self.active.clone();
        let weak = Arc::downgrade(self);
        let interval = self.config.buffer_event_interval;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    () = tokio::time::sleep(interval) => {}
                }
                let Some(this) = weak.upgrade() else { break };
                for kind in this.initialized_kinds() {
                    if let Some(buffer) = this.buffers[kind.index()].get() {
                        this.bus
                            .publish(PlayerEvent::DataNeeded(buffer.data_request()));
                    }
                }
            }
        });
    }
}

impl std::fmt::Debug for StreamController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamController")
            .field("state", &*self.state.lock())
            .field("seek_id", &self.seek_id.load(Ordering::Relaxed))
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
