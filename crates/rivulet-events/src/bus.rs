use tokio::sync::broadcast;

use crate::Event;

/// Event bus shared by loaders, transports and the consumer.
///
/// Loaders receive a cloned `EventBus` through their config and publish
/// directly from dispatch, which may run on a transport callback outside any
/// async context. Subscribers see every loader on the bus; sessions are told
/// apart by the `session` id carried in [`SessionEvent`](crate::SessionEvent).
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish to current subscribers. Dropped when nobody listens.
    ///
    /// Accepts sub-enum values directly: `bus.publish(LoaderEvent::Discarded { bytes })`.
    pub fn publish<E: Into<Event>>(&self, event: E) {
        let _ = self.tx.send(event.into());
    }

    /// Whether any subscriber is attached. Lets publishers skip building
    /// costly events.
    pub fn is_observed(&self) -> bool {
        self.tx.receiver_count() > 0
    }

    /// Subscribe to all future events.
    ///
    /// A subscriber that falls more than `capacity` events behind gets
    /// `RecvError::Lagged(n)` and resumes at the oldest retained event;
    /// loaders never block on it.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
