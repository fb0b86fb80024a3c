#![forbid(unsafe_code)]

//! Scripted platform player for tests.
//!
//! [`MockPlatformPlayer`] keeps every submitted packet and config, lets the
//! test emit platform events, answer submissions with `Full` to exercise
//! back-pressure, and fail lifecycle calls on demand.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use aulos_core::{Packet, PlayerError, PlayerResult, StreamConfig, StreamKind};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::platform::{
    DisplayHandle, PlatformEvent, PlatformPlayer, PlatformState, PlayerFactory, ReadyCallback,
    SubmitStatus,
};

/// In-process platform player double.
pub struct MockPlatformPlayer {
    state: Mutex<PlatformState>,
    events_tx: broadcast::Sender<PlatformEvent>,
    configs: Mutex<Vec<StreamConfig>>,
    submitted: Mutex<Vec<Packet>>,
    eos_streams: Mutex<Vec<StreamKind>>,
    playing_time: Mutex<Duration>,
    display: Mutex<Option<DisplayHandle>>,
    opened: AtomicBool,
    disposed: AtomicBool,
    secure_output: AtomicBool,
    /// Number of upcoming `submit_packet` calls answered with `Full`.
    full_responses: AtomicUsize,
    fail_start: AtomicBool,
    fail_prepare: AtomicBool,
    reject_configs: AtomicBool,
}

impl Default for MockPlatformPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatformPlayer {
    #[must_use]
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(PlatformState::Idle),
            events_tx,
            configs: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            eos_streams: Mutex::new(Vec::new()),
            playing_time: Mutex::new(Duration::ZERO),
            display: Mutex::new(None),
            opened: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            secure_output: AtomicBool::new(false),
            full_responses: AtomicUsize::new(0),
            fail_start: AtomicBool::new(false),
            fail_prepare: AtomicBool::new(false),
            reject_configs: AtomicBool::new(false),
        }
    }

    // -- scripting ---------------------------------------------------------

    /// Emit a platform event toward the controller.
    pub fn emit(&self, event: PlatformEvent) {
        let _ = self.events_tx.send(event);
    }

    /// Advance the reported presentation time.
    pub fn set_playing_time(&self, position: Duration) {
        *self.playing_time.lock() = position;
    }

    /// Answer the next `n` packet submissions with [`SubmitStatus::Full`].
    pub fn respond_full(&self, n: usize) {
        self.full_responses.store(n, Ordering::Release);
    }

    /// Make `start()` fail.
    pub fn fail_start(&self) {
        self.fail_start.store(true, Ordering::Release);
    }

    /// Make `prepare()` fail.
    pub fn fail_prepare(&self) {
        self.fail_prepare.store(true, Ordering::Release);
    }

    /// Reject every config as unsupported.
    pub fn reject_configs(&self) {
        self.reject_configs.store(true, Ordering::Release);
    }

    // -- inspection --------------------------------------------------------

    /// All packets accepted so far.
    #[must_use]
    pub fn submitted(&self) -> Vec<Packet> {
        self.submitted.lock().clone()
    }

    /// Accepted packets for one stream.
    #[must_use]
    pub fn submitted_for(&self, kind: StreamKind) -> Vec<Packet> {
        self.submitted
            .lock()
            .iter()
            .filter(|p| p.kind == kind)
            .cloned()
            .collect()
    }

    /// Streams that received an EOS submission.
    #[must_use]
    pub fn eos_streams(&self) -> Vec<StreamKind> {
        self.eos_streams.lock().clone()
    }

    /// Every config pushed into the player, in order.
    #[must_use]
    pub fn configs(&self) -> Vec<StreamConfig> {
        self.configs.lock().clone()
    }

    #[must_use]
    pub fn is_opened(&self) -> bool {
        self.opened.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn secure_output_enabled(&self) -> bool {
        self.secure_output.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn display(&self) -> Option<DisplayHandle> {
        *self.display.lock()
    }

    fn configured_kinds(&self) -> Vec<StreamKind> {
        let mut kinds: Vec<StreamKind> =
            self.configs.lock().iter().map(StreamConfig::kind).collect();
        kinds.sort_by_key(|k| k.index());
        kinds.dedup();
        kinds
    }

    fn live(&self) -> PlayerResult<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(PlayerError::Disposed);
        }
        Ok(())
    }
}

#[async_trait]
impl PlatformPlayer for MockPlatformPlayer {
    fn open(&self) -> PlayerResult<()> {
        self.live()?;
        self.opened.store(true, Ordering::Release);
        Ok(())
    }

    fn set_secure_output(&self, enabled: bool) -> PlayerResult<()> {
        self.live()?;
        self.secure_output.store(enabled, Ordering::Release);
        Ok(())
    }

    fn set_display(&self, display: DisplayHandle) -> PlayerResult<()> {
        self.live()?;
        *self.display.lock() = Some(display);
        Ok(())
    }

    fn state(&self) -> PlatformState {
        *self.state.lock()
    }

    fn start(&self) -> PlayerResult<()> {
        self.live()?;
        if self.fail_start.load(Ordering::Acquire) {
            return Err(PlayerError::native("Start Failed", "scripted failure"));
        }
        *self.state.lock() = PlatformState::Playing;
        Ok(())
    }

    fn pause(&self) -> PlayerResult<()> {
        self.live()?;
        let mut state = self.state.lock();
        if *state != PlatformState::Playing {
            return Err(PlayerError::InvalidState(format!(
                "pause in {state:?}"
            )));
        }
        *state = PlatformState::Paused;
        Ok(())
    }

    fn resume(&self) -> PlayerResult<()> {
        self.live()?;
        let mut state = self.state.lock();
        if *state != PlatformState::Paused {
            return Err(PlayerError::InvalidState(format!(
                "resume in {state:?}"
            )));
        }
        *state = PlatformState::Playing;
        Ok(())
    }

    fn stop(&self) -> PlayerResult<()> {
        self.live()?;
        *self.state.lock() = PlatformState::Idle;
        Ok(())
    }

    async fn prepare(&self, on_ready: ReadyCallback) -> PlayerResult<()> {
        self.live()?;
        if self.fail_prepare.load(Ordering::Acquire) {
            return Err(PlayerError::native("Playback Error", "prepare rejected"));
        }
        for kind in self.configured_kinds() {
            on_ready(kind);
        }
        *self.state.lock() = PlatformState::Ready;
        Ok(())
    }

    async fn seek(&self, position: Duration, on_ready: ReadyCallback) -> PlayerResult<()> {
        self.live()?;
        *self.playing_time.lock() = position;
        for kind in self.configured_kinds() {
            on_ready(kind);
        }
        Ok(())
    }

    fn playing_time(&self) -> PlayerResult<Duration> {
        self.live()?;
        Ok(*self.playing_time.lock())
    }

    fn set_stream_config(&self, config: &StreamConfig) -> PlayerResult<()> {
        self.live()?;
        if self.reject_configs.load(Ordering::Acquire) {
            return Err(PlayerError::UnsupportedStream(format!("{config:?}")));
        }
        self.configs.lock().push(config.clone());
        Ok(())
    }

    fn submit_packet(&self, packet: &Packet) -> PlayerResult<SubmitStatus> {
        self.live()?;
        let remaining = self.full_responses.load(Ordering::Acquire);
        if remaining > 0 {
            self.full_responses.store(remaining - 1, Ordering::Release);
            return Ok(SubmitStatus::Full);
        }
        self.submitted.lock().push(packet.clone());
        Ok(SubmitStatus::Accepted)
    }

    fn submit_eos(&self, kind: StreamKind) -> PlayerResult<()> {
        self.live()?;
        self.eos_streams.lock().push(kind);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.events_tx.subscribe()
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }
}

/// Factory keeping track of every player it created, so tests can reach the
/// instance installed after a reconfiguration.
#[derive(Clone, Default)]
pub struct MockPlayerFactory {
    created: Arc<Mutex<Vec<Arc<MockPlatformPlayer>>>>,
}

impl MockPlayerFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A [`PlayerFactory`] handing out fresh mocks.
    #[must_use]
    pub fn factory(&self) -> PlayerFactory {
        let created = Arc::clone(&self.created);
        Arc::new(move || {
            let player = Arc::new(MockPlatformPlayer::new());
            created.lock().push(Arc::clone(&player));
            Ok(player as Arc<dyn PlatformPlayer>)
        })
    }

    /// Number of players created so far.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }

    /// The most recently created player.
    #[must_use]
    pub fn latest(&self) -> Option<Arc<MockPlatformPlayer>> {
        self.created.lock().last().cloned()
    }

    /// Player by creation index.
    #[must_use]
    pub fn nth(&self, index: usize) -> Option<Arc<MockPlatformPlayer>> {
        self.created.lock().get(index).cloned()
    }
}
