#![forbid(unsafe_code)]

//! Playback clock.
//!
//! A background task that periodically reads the native player's playing
//! time and publishes `TimeUpdated`. Runs only while the controller is in
//! (or entering) playback; stopped on pause, stop, seek quiesce and dispose.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use aulos_core::PlayerError;
use aulos_events::PlayerEvent;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::controller::StreamController;

pub(crate) struct ClockHandle {
    pub(crate) cancel: CancellationToken,
    pub(crate) task: JoinHandle<()>,
}

pub(crate) fn spawn(
    controller: &Arc<StreamController>,
    interval: Duration,
    cancel: CancellationToken,
) -> ClockHandle {
    let weak: Weak<StreamController> = Arc::downgrade(controller);
    let token = cancel.clone();
    let task = tokio::spawn(async move {
        trace!("clock started");
        loop {
            let Some(this) = weak.upgrade() else { break };
            match this.current_player().playing_time() {
                Ok(position) => this.events().publish(PlayerEvent::TimeUpdated(position)),
                Err(PlayerError::Disposed) => {
                    // The player went away underneath a running clock; this is
                    // not a transient read failure.
                    this.events()
                        .publish(PlayerEvent::PlaybackError("Playback Error".into()));
                    break;
                }
                Err(e) => debug!(?e, "transient playing-time read failure"),
            }
            drop(this);

            tokio::select! {
                () = token.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
        }
        trace!("clock stopped");
    });
    ClockHandle { cancel, task }
}
