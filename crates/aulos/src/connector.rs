#![forbid(unsafe_code)]

//! Subscription bus between a [`PlayerController`] and a [`DataProvider`].
//!
//! `connect()` builds two forwarding halves — player events toward the
//! provider and provider events toward the player — each a task confined to
//! the connector's cancellation scope, which keeps observer execution
//! single-threaded per half. The embedded [`PlayerClient`] suspends both
//! halves around `DataProvider::seek` and rebuilds them on every exit path,
//! so neither side observes the other's events while the seek is in flight.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use aulos_core::{PlayerError, PlayerResult};
use aulos_events::{PlayerEvent, ProviderEvent};
use crate::traits::Player;
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    player_controller::PlayerController,
    traits::{DataProvider, PlayerClient},
};

struct SubscriptionSet {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

async fn teardown(slot: &mut Option<SubscriptionSet>) {
    if let Some(set) = slot.take() {
        set.cancel.cancel();
        for task in set.tasks {
            let _ = task.await;
        }
    }
}

/// Connects one controller/provider pair for the connection's lifetime.
pub struct DataProviderConnector {
    controller: Arc<PlayerController>,
    provider: Arc<dyn DataProvider>,
    subscriptions: Arc<tokio::sync::Mutex<Option<SubscriptionSet>>>,
}

impl DataProviderConnector {
    pub fn new(controller: Arc<PlayerController>, provider: Arc<dyn DataProvider>) -> Self {
        Self {
            controller,
            provider,
            subscriptions: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    /// Build both subscription halves and install the seek client.
    pub async fn connect(&self) -> PlayerResult<()> {
        let mut subscriptions = self.subscriptions.lock().await;
        if subscriptions.is_some() {
            return Err(PlayerError::InvalidState("already connected".into()));
        }
        *subscriptions = Some(build_subscriptions(&self.controller, &self.provider));

        self.controller.set_client(Arc::new(ConnectorClient {
            controller: Arc::clone(&self.controller),
            provider: Arc::clone(&self.provider),
            subscriptions: Arc::clone(&self.subscriptions),
        }));
        debug!("data provider connected");
        Ok(())
    }

    /// Tear down both subscription halves.
    pub async fn disconnect(&self) {
        teardown(&mut *self.subscriptions.lock().await).await;
        debug!("data provider disconnected");
    }
}

struct ConnectorClient {
    controller: Arc<PlayerController>,
    provider: Arc<dyn DataProvider>,
    subscriptions: Arc<tokio::sync::Mutex<Option<SubscriptionSet>>>,
}

#[async_trait]
impl PlayerClient for ConnectorClient {
    async fn seek(&self, position: Duration, token: CancellationToken) -> PlayerResult<Duration> {
        let mut subscriptions = self.subscriptions.lock().await;
        teardown(&mut subscriptions).await;

        let result = self.provider.seek(position, token).await;

        // Rebuilt on every exit path, including provider failure.
        *subscriptions = Some(build_subscriptions(&self.controller, &self.provider));
        result
    }
}

fn build_subscriptions(
    controller: &Arc<PlayerController>,
    provider: &Arc<dyn DataProvider>,
) -> SubscriptionSet {
    let cancel = CancellationToken::new();
    let player_half = spawn_player_half(controller, provider, cancel.clone());
    let provider_half = spawn_provider_half(controller, provider, cancel.clone());
    SubscriptionSet {
        cancel,
        tasks: vec![player_half, provider_half],
    }
}

/// Half (a): player events toward the provider.
fn spawn_player_half(
    controller: &Arc<PlayerController>,
    provider: &Arc<dyn DataProvider>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let mut rx = controller.subscribe();
    let provider = Arc::clone(provider);
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                () = cancel.cancelled() => break,
                event = rx.recv() => match event {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "player events lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            };
            match event {
                PlayerEvent::TimeUpdated(position) => provider.on_time_updated(position),
                PlayerEvent::StateChanged(state) => provider.on_state_changed(state),
                PlayerEvent::DataNeeded(request) => provider.on_data_state_changed(request),
                PlayerEvent::BufferingStateChanged(buffering) => {
                    provider.on_buffering_state_changed(buffering);
                }
                _ => {}
            }
        }
    })
}

/// Half (b): provider events toward the player.
fn spawn_provider_half(
    controller: &Arc<PlayerController>,
    provider: &Arc<dyn DataProvider>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let mut rx = provider.subscribe();
    let controller = Arc::clone(controller);
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                () = cancel.cancelled() => break,
                event = rx.recv() => match event {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "provider events lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            };
            match event {
                ProviderEvent::ClipDurationChanged(duration) => {
                    controller.on_clip_duration_changed(duration);
                }
                ProviderEvent::DrmInitDataFound { kind, data } => {
                    controller.on_drm_init_data(kind, &data);
                }
                ProviderEvent::SetDrmConfiguration(config) => {
                    controller.on_set_drm_configuration(&config);
                }
                ProviderEvent::StreamConfigReady(config) => {
                    // Routing suspends on a full queue; stay cancellable so a
                    // teardown during seek cannot deadlock on back-pressure.
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        result = controller.on_stream_config_ready(config) => {
                            if let Err(e) = result {
                                debug!(?e, "stream config rejected");
                            }
                        }
                    }
                }
                ProviderEvent::PacketReady(packet) => {
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        result = controller.on_packet_ready(packet) => {
                            if let Err(e) = result {
                                debug!(?e, "packet rejected");
                            }
                        }
                    }
                }
                ProviderEvent::StreamError(message) => controller.on_stream_error(message),
                ProviderEvent::BufferingStateChanged(buffering) => {
                    controller.on_buffering_state_changed(buffering);
                }
                _ => {}
            }
        }
    })
}
