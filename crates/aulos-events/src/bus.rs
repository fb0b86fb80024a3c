#![forbid(unsafe_code)]

use tokio::sync::broadcast;

/// Broadcast-backed event subject.
///
/// All publishers share a cloned `EventBus`; each subscriber gets an
/// independent receiver. `publish()` is a sync call and works from both
/// async tasks and blocking threads. If there are no subscribers, events are
/// silently dropped. Slow subscribers receive `RecvError::Lagged(n)` instead
/// of blocking publishers.
#[derive(Debug)]
pub struct EventBus<E> {
    tx: broadcast::Sender<E>,
}

impl<E: Clone> EventBus<E> {
    /// Create a new bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: impl Into<E>) {
        let _ = self.tx.send(event.into());
    }

    /// Subscribe to all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use aulos_core::PlayerState;

    use super::*;
    use crate::PlayerEvent;

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus: EventBus<PlayerEvent> = EventBus::new(16);
        bus.publish(PlayerEvent::StateChanged(PlayerState::Idle));
    }

    #[tokio::test]
    async fn subscribers_see_events_in_publish_order() {
        let bus: EventBus<PlayerEvent> = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(PlayerEvent::StateChanged(PlayerState::Prepared));
        bus.publish(PlayerEvent::TimeUpdated(Duration::from_millis(500)));

        assert!(matches!(
            rx.recv().await.unwrap(),
            PlayerEvent::StateChanged(PlayerState::Prepared)
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            PlayerEvent::TimeUpdated(_)
        ));
    }

    #[tokio::test]
    async fn each_subscriber_receives_independently() {
        let bus: EventBus<PlayerEvent> = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(PlayerEvent::BufferingStateChanged(true));

        assert!(matches!(
            rx1.recv().await.unwrap(),
            PlayerEvent::BufferingStateChanged(true)
        ));
        assert!(matches!(
            rx2.recv().await.unwrap(),
            PlayerEvent::BufferingStateChanged(true)
        ));
    }

    #[tokio::test]
    async fn lagged_subscriber_gets_error_not_blockage() {
        let bus: EventBus<PlayerEvent> = EventBus::new(2);
        let mut rx = bus.subscribe();

        for i in 0..10 {
            bus.publish(PlayerEvent::TimeUpdated(Duration::from_millis(i)));
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
    }

    #[test]
    fn clone_shares_the_channel() {
        let bus: EventBus<PlayerEvent> = EventBus::new(16);
        let bus2 = bus.clone();
        let mut rx = bus.subscribe();

        bus2.publish(PlayerEvent::StateChanged(PlayerState::Playing));
        assert!(rx.try_recv().is_ok());
    }
}
