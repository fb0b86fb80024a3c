//! Integration tests driving the [`StreamController`] against the scripted
//! platform player.

use std::{sync::Arc, time::Duration};

use aulos_core::{
    AudioCodec, AudioStreamConfig, Packet, PlayerError, PlayerState, StreamConfig, StreamKind,
    VideoCodec, VideoStreamConfig,
};
use aulos_events::PlayerEvent;
use aulos_pipeline::{
    BufferStatus, DisplayHandle, PipelineConfig, PlatformEvent, PlatformPlayer, StreamController,
    mock::MockPlayerFactory,
};
use bytes::Bytes;
use tokio::{sync::broadcast, time::timeout};

const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

fn test_config() -> PipelineConfig {
    PipelineConfig::default()
        .with_prebuffer_duration(Duration::from_millis(200))
        .with_prebuffer_poll_interval(Duration::from_millis(10))
        .with_clock_interval(Duration::from_millis(20))
        .with_buffer_event_interval(Duration::from_millis(50))
}

fn aac() -> StreamConfig {
    StreamConfig::Audio(AudioStreamConfig {
        codec: AudioCodec::Aac,
        sample_rate: 48_000,
        channels: 2,
        bitrate: 128_000,
        extradata: None,
    })
}

fn opus() -> StreamConfig {
    StreamConfig::Audio(AudioStreamConfig {
        codec: AudioCodec::Opus,
        sample_rate: 48_000,
        channels: 2,
        bitrate: 96_000,
        extradata: None,
    })
}

fn h264() -> StreamConfig {
    StreamConfig::Video(VideoStreamConfig {
        codec: VideoCodec::H264,
        width: 1920,
        height: 1080,
        frame_rate: 30,
        bitrate: 4_000_000,
        extradata: None,
    })
}

struct Fixture {
    factory: MockPlayerFactory,
    controller: Arc<StreamController>,
    events: broadcast::Receiver<PlayerEvent>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fixture() -> Fixture {
    init_tracing();
    let factory = MockPlayerFactory::new();
    let controller = StreamController::new(
        factory.factory(),
        Some(DisplayHandle(7)),
        test_config(),
    )
    .unwrap();
    let events = controller.subscribe();
    Fixture {
        factory,
        controller,
        events,
    }
}

/// Push `span_ms` worth of frames starting at `from_ms`, 20 ms apart.
async fn feed(
    controller: &Arc<StreamController>,
    kind: StreamKind,
    from_ms: u64,
    span_ms: u64,
    generation: u64,
) {
    let mut pts = from_ms;
    while pts <= from_ms + span_ms {
        let packet = Packet::frame(
            kind,
            Duration::from_millis(pts),
            Duration::from_millis(pts),
            Bytes::from_static(b"access-unit"),
        )
        .with_generation(generation);
        controller.append_packet(packet).await.unwrap();
        pts += 20;
    }
}

async fn wait_for(
    rx: &mut broadcast::Receiver<PlayerEvent>,
    pred: impl Fn(&PlayerEvent) -> bool,
) -> PlayerEvent {
    timeout(EVENT_TIMEOUT, async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
            }
        }
    })
    .await
    .expect("event not observed in time")
}

fn drain(rx: &mut broadcast::Receiver<PlayerEvent>) -> Vec<PlayerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Bring a two-stream fixture into the Prepared state.
async fn prepared_fixture() -> Fixture {
    let mut f = fixture();
    f.controller.initialize(StreamKind::Audio).unwrap();
    f.controller.initialize(StreamKind::Video).unwrap();
    f.controller.set_stream_config(aac()).unwrap();
    f.controller.set_stream_config(h264()).unwrap();

    feed(&f.controller, StreamKind::Audio, 0, 3000, 0).await;
    feed(&f.controller, StreamKind::Video, 0, 3000, 0).await;

    wait_for(&mut f.events, |e| {
        matches!(e, PlayerEvent::StateChanged(PlayerState::Prepared))
    })
    .await;
    f
}

// -- happy path -------------------------------------------------------------

#[tokio::test]
async fn prepare_publishes_prepared_once_and_play_enters_playing() {
    let mut f = prepared_fixture().await;

    f.controller.play().unwrap();
    wait_for(&mut f.events, |e| {
        matches!(e, PlayerEvent::StateChanged(PlayerState::Playing))
    })
    .await;

    // Clock ticks at the configured cadence.
    wait_for(&mut f.events, |e| matches!(e, PlayerEvent::TimeUpdated(_))).await;
    wait_for(&mut f.events, |e| matches!(e, PlayerEvent::TimeUpdated(_))).await;

    // Packets reached the native player for both streams.
    let player = f.factory.latest().unwrap();
    assert!(!player.submitted_for(StreamKind::Audio).is_empty());
    assert!(!player.submitted_for(StreamKind::Video).is_empty());

    f.controller.dispose().await;
}

#[tokio::test]
async fn prepare_waits_for_every_stream_to_prebuffer() {
    let mut f = fixture();
    f.controller.initialize(StreamKind::Audio).unwrap();
    f.controller.initialize(StreamKind::Video).unwrap();
    f.controller.set_stream_config(aac()).unwrap();
    f.controller.set_stream_config(h264()).unwrap();

    // Only audio gets data: prepare must not complete.
    feed(&f.controller, StreamKind::Audio, 0, 3000, 0).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(
        !drain(&mut f.events)
            .iter()
            .any(|e| matches!(e, PlayerEvent::StateChanged(PlayerState::Prepared)))
    );

    // Video catches up: prepare completes.
    feed(&f.controller, StreamKind::Video, 0, 3000, 0).await;
    wait_for(&mut f.events, |e| {
        matches!(e, PlayerEvent::StateChanged(PlayerState::Prepared))
    })
    .await;

    f.controller.dispose().await;
}

#[tokio::test]
async fn play_before_configuration_is_invalid() {
    let f = fixture();
    f.controller.initialize(StreamKind::Audio).unwrap();
    assert!(matches!(
        f.controller.play(),
        Err(PlayerError::InvalidState(_))
    ));
    f.controller.dispose().await;
}

// -- seek -------------------------------------------------------------------

#[tokio::test]
async fn seek_quiesces_repositions_and_completes_once() {
    let mut f = prepared_fixture().await;
    f.controller.play().unwrap();

    let handle = f.controller.seek(Duration::from_secs(2));
    assert_eq!(f.controller.current_seek_id(), 1);

    // Producer acknowledges the seek: post-seek packets carry generation 1.
    feed(&f.controller, StreamKind::Audio, 2000, 1000, 1).await;
    feed(&f.controller, StreamKind::Video, 2000, 1000, 1).await;

    handle.await.unwrap().unwrap();

    let events = drain(&mut f.events);
    let started: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, PlayerEvent::SeekStarted { .. }))
        .collect();
    let completed: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, PlayerEvent::SeekCompleted { .. }))
        .collect();
    assert_eq!(started.len(), 1);
    assert_eq!(completed.len(), 1);
    assert!(matches!(
        started[0],
        PlayerEvent::SeekStarted { id: 1, position } if *position == Duration::from_secs(2)
    ));
    assert!(matches!(completed[0], PlayerEvent::SeekCompleted { id: 1 }));

    // SeekStarted strictly precedes SeekCompleted.
    let started_at = events
        .iter()
        .position(|e| matches!(e, PlayerEvent::SeekStarted { .. }))
        .unwrap();
    let completed_at = events
        .iter()
        .position(|e| matches!(e, PlayerEvent::SeekCompleted { .. }))
        .unwrap();
    assert!(started_at < completed_at);

    // The native player was repositioned.
    let player = f.factory.latest().unwrap();
    assert_eq!(player.playing_time().unwrap(), Duration::from_secs(2));

    f.controller.dispose().await;
}

#[tokio::test]
async fn stale_generation_packets_never_reach_the_player_after_seek() {
    let mut f = prepared_fixture().await;
    f.controller.play().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let handle = f.controller.seek(Duration::from_secs(2));
    // Late packets of the old generation race the seek.
    feed(&f.controller, StreamKind::Audio, 3000, 200, 0).await;
    feed(&f.controller, StreamKind::Video, 3000, 200, 0).await;
    feed(&f.controller, StreamKind::Audio, 2000, 1000, 1).await;
    feed(&f.controller, StreamKind::Video, 2000, 1000, 1).await;
    handle.await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let player = f.factory.latest().unwrap();
    let submitted = player.submitted();
    let first_new = submitted
        .iter()
        .position(|p| p.generation == 1)
        .expect("no post-seek packet delivered");
    assert!(
        submitted[first_new..].iter().all(|p| p.generation == 1),
        "stale packet crossed the generation fence"
    );
    wait_for(&mut f.events, |e| matches!(e, PlayerEvent::TimeUpdated(_))).await;

    f.controller.dispose().await;
}

#[tokio::test]
async fn seek_with_destructive_config_recreates_the_player() {
    let mut f = prepared_fixture().await;
    f.controller.play().unwrap();

    let handle = f.controller.seek(Duration::from_secs(2));

    // The producer repositions and announces a new audio codec at the
    // seek boundary.
    f.controller
        .append_packet(Packet::config(Duration::from_secs(2), opus()).with_generation(1))
        .await
        .unwrap();
    feed(&f.controller, StreamKind::Audio, 2000, 1000, 1).await;
    feed(&f.controller, StreamKind::Video, 2000, 1000, 1).await;

    handle.await.unwrap().unwrap();

    // Old player disposed, replacement created and set up.
    assert_eq!(f.factory.created_count(), 2);
    let old = f.factory.nth(0).unwrap();
    let new = f.factory.nth(1).unwrap();
    assert!(old.is_disposed());
    assert!(new.is_opened());
    assert!(new.secure_output_enabled());
    assert_eq!(new.display(), Some(DisplayHandle(7)));

    // Streams re-applied their configs onto the new player: the audio
    // stream carries the new codec.
    assert!(new.configs().iter().any(|c| *c == opus()));
    assert!(new.configs().iter().any(|c| *c == h264()));

    // Seek still completed, and playback resumed.
    let events = drain(&mut f.events);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, PlayerEvent::SeekCompleted { id: 1 }))
    );
    assert!(
        events
            .iter()
            .any(|e| matches!(e, PlayerEvent::StateChanged(PlayerState::Playing)))
    );

    f.controller.dispose().await;
}

#[tokio::test]
async fn seek_after_dispose_fails_with_disposed() {
    let f = prepared_fixture().await;
    f.controller.dispose().await;
    let result = f.controller.seek(Duration::from_secs(1)).await.unwrap();
    assert!(matches!(result, Err(PlayerError::Disposed)));
}

// -- cancellation -----------------------------------------------------------

#[tokio::test]
async fn dispose_during_prebuffer_cancels_prepare_without_error() {
    let mut f = fixture();
    f.controller.initialize(StreamKind::Audio).unwrap();
    f.controller.set_stream_config(aac()).unwrap();

    // No data fed: prepare sits in its prebuffer loop.
    tokio::time::sleep(Duration::from_millis(50)).await;
    f.controller.dispose().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let events = drain(&mut f.events);
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, PlayerEvent::PlaybackError(_))),
        "cancellation must not surface as a playback error"
    );
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, PlayerEvent::StateChanged(PlayerState::Prepared)))
    );

    // Disposed controller rejects further calls; dispose stays idempotent.
    assert!(matches!(f.controller.play(), Err(PlayerError::Disposed)));
    assert!(matches!(
        f.controller.initialize(StreamKind::Video),
        Err(PlayerError::Disposed)
    ));
    f.controller.dispose().await;
}

// -- native events ----------------------------------------------------------

#[tokio::test]
async fn underrun_wakes_the_stream_without_state_change() {
    let mut f = prepared_fixture().await;
    f.controller.play().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let player = f.factory.latest().unwrap();

    // Bounce the next submission of each stream so both pumps park on
    // back-pressure, then push one more frame per stream.
    player.respond_full(2);
    feed(&f.controller, StreamKind::Audio, 3020, 0, 0).await;
    feed(&f.controller, StreamKind::Video, 3020, 0, 0).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let audio_before = player.submitted_for(StreamKind::Audio).len();
    let video_before = player.submitted_for(StreamKind::Video).len();

    drain(&mut f.events);
    player.emit(PlatformEvent::BufferStatus {
        kind: StreamKind::Audio,
        status: BufferStatus::Underrun,
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Only the woken stream resumed transfer.
    assert_eq!(
        player.submitted_for(StreamKind::Audio).len(),
        audio_before + 1
    );
    assert_eq!(player.submitted_for(StreamKind::Video).len(), video_before);
    assert!(
        !drain(&mut f.events)
            .iter()
            .any(|e| matches!(e, PlayerEvent::StateChanged(_))),
        "underrun must not change state"
    );

    f.controller.dispose().await;
}

#[tokio::test]
async fn native_eos_completes_playback_and_disables_input() {
    let mut f = prepared_fixture().await;
    f.controller.play().unwrap();
    let player = f.factory.latest().unwrap();

    player.emit(PlatformEvent::EndOfStream);
    wait_for(&mut f.events, |e| {
        matches!(e, PlayerEvent::StateChanged(PlayerState::Completed))
    })
    .await;

    // Input is rejected after completion.
    let result = f
        .controller
        .append_packet(Packet::frame(
            StreamKind::Audio,
            Duration::from_secs(4),
            Duration::from_secs(4),
            Bytes::from_static(b"late"),
        ))
        .await;
    assert!(result.is_err());

    f.controller.dispose().await;
}

#[tokio::test]
async fn native_error_publishes_playback_error() {
    let mut f = prepared_fixture().await;
    f.controller.play().unwrap();
    let player = f.factory.latest().unwrap();

    player.emit(PlatformEvent::Error("decoder died".into()));
    let event = wait_for(&mut f.events, |e| {
        matches!(e, PlayerEvent::PlaybackError(_))
    })
    .await;
    assert!(matches!(
        event,
        PlayerEvent::PlaybackError(message) if message == "decoder died"
    ));

    f.controller.dispose().await;
}

// -- idempotence and no-ops -------------------------------------------------

#[tokio::test]
async fn stop_outside_playback_publishes_nothing() {
    let mut f = prepared_fixture().await;
    drain(&mut f.events);

    // Native player is Ready (prepared), not Playing/Paused.
    f.controller.stop().unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(
        !drain(&mut f.events)
            .iter()
            .any(|e| matches!(e, PlayerEvent::StateChanged(_)))
    );

    f.controller.dispose().await;
}

#[tokio::test]
async fn stop_during_playback_returns_to_idle() {
    let mut f = prepared_fixture().await;
    f.controller.play().unwrap();
    wait_for(&mut f.events, |e| {
        matches!(e, PlayerEvent::StateChanged(PlayerState::Playing))
    })
    .await;

    f.controller.stop().unwrap();
    wait_for(&mut f.events, |e| {
        matches!(e, PlayerEvent::StateChanged(PlayerState::Idle))
    })
    .await;

    f.controller.dispose().await;
}

#[tokio::test]
async fn no_time_updates_after_pause() {
    let mut f = prepared_fixture().await;
    f.controller.play().unwrap();
    wait_for(&mut f.events, |e| matches!(e, PlayerEvent::TimeUpdated(_))).await;

    f.controller.pause().unwrap();
    wait_for(&mut f.events, |e| {
        matches!(e, PlayerEvent::StateChanged(PlayerState::Paused))
    })
    .await;

    // Allow in-flight ticks to flush, then expect silence.
    tokio::time::sleep(Duration::from_millis(60)).await;
    drain(&mut f.events);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(
        !drain(&mut f.events)
            .iter()
            .any(|e| matches!(e, PlayerEvent::TimeUpdated(_))),
        "clock must stop with pause"
    );

    f.controller.dispose().await;
}

#[tokio::test]
async fn pause_then_play_resumes_via_native_resume() {
    let mut f = prepared_fixture().await;
    f.controller.play().unwrap();
    f.controller.pause().unwrap();

    f.controller.play().unwrap();
    wait_for(&mut f.events, |e| {
        matches!(e, PlayerEvent::StateChanged(PlayerState::Playing))
    })
    .await;
    assert_eq!(
        f.factory.latest().unwrap().state(),
        aulos_pipeline::PlatformState::Playing
    );

    f.controller.dispose().await;
}

// -- buffer reporting -------------------------------------------------------

#[tokio::test]
async fn buffer_reporter_publishes_data_requests() {
    let mut f = prepared_fixture().await;
    let event = wait_for(&mut f.events, |e| matches!(e, PlayerEvent::DataNeeded(_))).await;
    if let PlayerEvent::DataNeeded(request) = event {
        assert!(request.duration_needed > Duration::ZERO);
    }
    f.controller.dispose().await;
}

#[tokio::test]
async fn unsupported_config_surfaces_as_playback_error() {
    let mut f = fixture();
    f.controller.initialize(StreamKind::Audio).unwrap();
    f.factory.latest().unwrap().reject_configs();

    let result = f.controller.set_stream_config(aac());
    assert!(matches!(result, Err(PlayerError::UnsupportedStream(_))));
    wait_for(&mut f.events, |e| {
        matches!(e, PlayerEvent::PlaybackError(m) if m.starts_with("unsupported stream config"))
    })
    .await;

    f.controller.dispose().await;
}

#[tokio::test]
async fn double_initialize_is_an_invalid_argument() {
    let f = fixture();
    f.controller.initialize(StreamKind::Audio).unwrap();
    assert!(matches!(
        f.controller.initialize(StreamKind::Audio),
        Err(PlayerError::InvalidArgument(_))
    ));
    f.controller.dispose().await;
}
