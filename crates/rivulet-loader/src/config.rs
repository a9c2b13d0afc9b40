use std::{fmt, sync::Arc};

use rivulet_events::EventBus;
use serde_json::Value;

use crate::{rollback::RollbackHandler, slot::SessionSlot, transport::PlayerRef};

/// Configuration for a [`TransportLoader`](crate::TransportLoader).
#[derive(Clone, Default)]
pub struct LoaderConfig {
    /// Forwarded to the transport as part of the load request.
    pub video_id: Option<String>,
    /// Backend-specific options. Each transport reads its own keys.
    pub transport_options: Value,
    /// Player handle bound to the transport and passed to rollback handlers.
    pub player: Option<PlayerRef>,
    /// Fallback logic invoked when the transport gives up.
    pub rollback: Option<Arc<dyn RollbackHandler>>,
    /// Event bus (optional; nothing is published without one).
    pub bus: Option<EventBus>,
    /// Session slot shared with other loaders.
    ///
    /// When `None`, the backend picks one (see
    /// [`TransportFactory::default_slot`](crate::TransportFactory::default_slot)).
    pub slot: Option<SessionSlot>,
}

impl LoaderConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_video_id<S: Into<String>>(mut self, video_id: S) -> Self {
        self.video_id = Some(video_id.into());
        self
    }

    #[must_use]
    pub fn with_transport_options(mut self, options: Value) -> Self {
        self.transport_options = options;
        self
    }

    #[must_use]
    pub fn with_player(mut self, player: PlayerRef) -> Self {
        self.player = Some(player);
        self
    }

    /// Set the rollback handler. Closures taking a `RollbackRequest` work directly.
    #[must_use]
    pub fn with_rollback<H: RollbackHandler + 'static>(mut self, handler: H) -> Self {
        self.rollback = Some(Arc::new(handler));
        self
    }

    /// Set event bus for subscribing to loader events.
    #[must_use]
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    #[must_use]
    pub fn with_slot(mut self, slot: SessionSlot) -> Self {
        self.slot = Some(slot);
        self
    }
}

impl fmt::Debug for LoaderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderConfig")
            .field("video_id", &self.video_id)
            .field("transport_options", &self.transport_options)
            .field("player", &self.player)
            .field("rollback", &self.rollback.is_some())
            .field("bus", &self.bus)
            .field("slot", &self.slot)
            .finish()
    }
}
