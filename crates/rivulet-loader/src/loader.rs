use std::sync::Arc;

use rivulet_core::LoaderStatus;
use rivulet_events::SessionEvent;
use rivulet_platform::Mutex;
use tracing::{debug, warn};

use crate::{
    config::LoaderConfig,
    dispatch::Shared,
    error::{LoaderError, LoaderResult, TransportError},
    observer::LoaderObserver,
    slot::{SessionSlot, SlotLease},
    source::{ByteRange, DataSource, SourceDescriptor},
    transport::{EventListener, RollbackHook, Transport, TransportFactory},
};

/// Uniform loader contract consumed by demuxers and players.
pub trait BaseLoader: Send {
    fn loader_type(&self) -> &'static str;

    fn status(&self) -> LoaderStatus;

    fn is_working(&self) -> bool {
        self.status().is_working()
    }

    fn needs_stash_buffer(&self) -> bool;

    fn content_length(&self) -> Option<u64>;

    fn received_length(&self) -> u64;

    fn set_observer(&mut self, observer: Arc<dyn LoaderObserver>);

    /// Start fetching `source`, tearing down any previous session first.
    ///
    /// # Errors
    ///
    /// Fails when the source has no url, the loader is terminal or destroyed,
    /// or the backend cannot start a session.
    fn open(&mut self, source: DataSource, range: Option<ByteRange>) -> LoaderResult<()>;

    /// Stop delivering data. Status becomes `Complete` immediately; the
    /// transport keeps running until `destroy`.
    fn abort(&mut self);

    /// Release the transport and detach the observer. Safe to call repeatedly.
    fn destroy(&mut self);
}

/// [`BaseLoader`] bound to one backend through its [`TransportFactory`].
///
/// Dropping the loader destroys it.
pub struct TransportLoader<F: TransportFactory> {
    factory: F,
    config: LoaderConfig,
    shared: Arc<Shared>,
    transport: Arc<Mutex<Option<F::Transport>>>,
    slot: SessionSlot,
    lease: Option<SlotLease>,
}

impl<F: TransportFactory> TransportLoader<F> {
    pub fn new(factory: F, config: LoaderConfig) -> Self {
        let shared = Arc::new(Shared::new(
            factory.kind(),
            config.rollback.clone(),
            config.bus.clone(),
        ));
        let slot = config
            .slot
            .clone()
            .unwrap_or_else(|| factory.default_slot());
        Self {
            factory,
            config,
            shared,
            transport: Arc::new(Mutex::new(None)),
            slot,
            lease: None,
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn LoaderObserver>) -> Self {
        self.set_observer(observer);
        self
    }

    pub fn is_supported(&self) -> bool {
        self.factory.is_supported()
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Clonable handle for status queries and `abort` from observer callbacks.
    pub fn handle(&self) -> LoaderHandle {
        LoaderHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Whether this loader currently holds its session slot.
    pub fn holds_slot(&self) -> bool {
        self.lease.as_ref().is_some_and(SlotLease::is_held)
    }

    fn preempt_callback(&self, session: u64) -> impl FnOnce() + Send + 'static {
        let shared = Arc::downgrade(&self.shared);
        let cell = Arc::clone(&self.transport);
        move || {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            if !shared.preempt(session) {
                return;
            }
            let transport = cell.lock().take();
            if let Some(mut transport) = transport {
                debug!(loader = shared.name(), session, "destroying preempted transport");
                transport.destroy();
            }
        }
    }

    fn release_transport(&mut self, session: u64) {
        let transport = self.transport.lock().take();
        if let Some(mut transport) = transport {
            debug!(loader = self.shared.name(), session, "tearing down transport");
            transport.destroy();
            self.shared.publish(SessionEvent::Destroyed {
                backend: self.shared.name(),
                session,
            });
        }
        self.lease = None;
    }

    fn start(&mut self, source: &DataSource, range: Option<ByteRange>) -> LoaderResult<()> {
        let backend = self.factory.kind();
        let session = self.shared.begin_session(source, range);
        let lease = self.slot.acquire(backend, self.preempt_callback(session));

        let mut transport = self
            .factory
            .create(&self.config.transport_options)
            .inspect_err(|_| self.shared.fail_open(session))?;

        if let Some(player) = &self.config.player {
            transport.bind_player(player.clone());
        }
        if self.shared.has_rollback_handler()
            && transport.bind_rollback_hook(RollbackHook::new(&self.shared, session))
        {
            self.shared.mark_hook_bound(session);
        }
        transport.listen(EventListener::new(&self.shared, session));
        self.shared.mark_bound(session);

        let descriptor = SourceDescriptor {
            video_id: self.config.video_id.clone(),
            src: source.url.clone(),
            range,
        };
        if let Err(error) = transport.load_source(descriptor) {
            self.shared.fail_open(session);
            transport.destroy();
            return Err(error.into());
        }

        let stale = {
            let mut cell = self.transport.lock();
            if self.shared.is_current(session) {
                *cell = Some(transport);
                None
            } else {
                Some(transport)
            }
        };
        if let Some(mut transport) = stale {
            debug!(loader = backend, session, "session ended while opening");
            transport.destroy();
            return Ok(());
        }

        self.lease = Some(lease);
        debug!(loader = backend, session, url = %source.url, ?range, "opened");
        self.shared.publish(SessionEvent::Opened { backend, session });
        Ok(())
    }
}

impl<F: TransportFactory> BaseLoader for TransportLoader<F> {
    fn loader_type(&self) -> &'static str {
        self.factory.kind()
    }

    fn status(&self) -> LoaderStatus {
        self.shared.status()
    }

    fn needs_stash_buffer(&self) -> bool {
        self.factory.needs_stash_buffer()
    }

    fn content_length(&self) -> Option<u64> {
        self.shared.content_length()
    }

    fn received_length(&self) -> u64 {
        self.shared.received_length()
    }

    fn set_observer(&mut self, observer: Arc<dyn LoaderObserver>) {
        self.shared.set_observer(observer);
    }

    fn open(&mut self, source: DataSource, range: Option<ByteRange>) -> LoaderResult<()> {
        if !source.has_url() {
            return Err(LoaderError::MissingUrl);
        }
        self.shared.check_open()?;
        if !self.factory.is_supported() {
            return Err(TransportError::Unsupported {
                backend: self.factory.kind(),
            }
            .into());
        }

        let previous = self.shared.end_session();
        self.release_transport(previous);

        self.start(&source, range).inspect_err(|error| {
            warn!(loader = self.factory.kind(), %error, "open failed");
        })
    }

    fn abort(&mut self) {
        self.shared.abort();
    }

    fn destroy(&mut self) {
        let Some(session) = self.shared.destroy() else {
            return;
        };
        self.release_transport(session);
        debug!(loader = self.factory.kind(), "destroyed");
    }
}

impl<F: TransportFactory> Drop for TransportLoader<F> {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl<F: TransportFactory + std::fmt::Debug> std::fmt::Debug for TransportLoader<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportLoader")
            .field("factory", &self.factory)
            .field("status", &self.shared.status())
            .field("received_length", &self.shared.received_length())
            .finish_non_exhaustive()
    }
}

/// Shared view of a loader.
///
/// An observer that keeps a handle keeps the loader state alive until the
/// loader is destroyed, which detaches the observer.
#[derive(Clone)]
pub struct LoaderHandle {
    shared: Arc<Shared>,
}

impl LoaderHandle {
    pub fn loader_type(&self) -> &'static str {
        self.shared.name()
    }

    pub fn status(&self) -> LoaderStatus {
        self.shared.status()
    }

    pub fn content_length(&self) -> Option<u64> {
        self.shared.content_length()
    }

    pub fn received_length(&self) -> u64 {
        self.shared.received_length()
    }

    pub fn is_aborted(&self) -> bool {
        self.shared.is_aborted()
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.is_destroyed()
    }

    pub fn abort(&self) {
        self.shared.abort();
    }
}

impl std::fmt::Debug for LoaderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderHandle")
            .field("loader", &self.shared.name())
            .field("status", &self.shared.status())
            .finish()
    }
}
