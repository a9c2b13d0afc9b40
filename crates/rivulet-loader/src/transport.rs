use std::{
    any::Any,
    fmt,
    sync::{Arc, Weak},
};

use bytes::Bytes;
use rivulet_core::{LoaderErrorKind, RollbackTrigger};

use crate::{
    dispatch::Shared,
    error::{LoaderResult, TransportError},
    slot::SessionSlot,
    source::SourceDescriptor,
};

/// Payload of a `ReceiveBuffer` event. Only `Binary` is a valid chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    Binary(Bytes),
    Text(String),
    Empty,
}

impl Payload {
    pub fn len(&self) -> usize {
        match self {
            Self::Binary(bytes) => bytes.len(),
            Self::Text(text) => text.len(),
            Self::Empty => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Self::Binary(_) => "binary",
            Self::Text(_) => "text",
            Self::Empty => "empty",
        }
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Self::Binary(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(bytes))
    }
}

/// Opaque player handle forwarded to transports and rollback handlers.
///
/// The loader never looks inside; consumers downcast it back.
#[derive(Clone)]
pub struct PlayerRef(Arc<dyn Any + Send + Sync>);

impl PlayerRef {
    pub fn new<T: Any + Send + Sync>(player: T) -> Self {
        Self(Arc::new(player))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    /// Whether both handles point at the same player.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for PlayerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PlayerRef").finish_non_exhaustive()
    }
}

/// Everything a transport can report to its loader.
#[derive(Clone, Debug)]
pub enum TransportEvent {
    ReceiveBuffer(Payload),
    /// Declared total size, ahead of the first payload.
    SizeHint(u64),
    BufferEof,
    HttpStatusInvalid { status: u16, status_text: String },
    Failure {
        kind: LoaderErrorKind,
        message: String,
    },
    /// The transport gave up; the consumer should fall back to another backend.
    Rollback { player: Option<PlayerRef> },
    /// Codes the loader does not understand. Ignored.
    Other { code: i32 },
}

/// Listener bound to one transport session.
///
/// Events from a session that was torn down, preempted or replaced by a
/// newer `open` are dropped silently.
#[derive(Clone)]
pub struct EventListener {
    shared: Weak<Shared>,
    epoch: u64,
}

impl EventListener {
    pub(crate) fn new(shared: &Arc<Shared>, epoch: u64) -> Self {
        Self {
            shared: Arc::downgrade(shared),
            epoch,
        }
    }

    /// Feed one event into the loader.
    ///
    /// # Errors
    ///
    /// Returns the loader error when the observer left it unhandled.
    pub fn emit(&self, event: TransportEvent) -> LoaderResult<()> {
        match self.shared.upgrade() {
            Some(shared) => shared.handle(self.epoch, event),
            None => Ok(()),
        }
    }

    /// Whether the session this listener belongs to is still current.
    pub fn is_live(&self) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| shared.is_current(self.epoch))
    }

    pub fn session(&self) -> u64 {
        self.epoch
    }
}

impl fmt::Debug for EventListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListener")
            .field("session", &self.epoch)
            .finish_non_exhaustive()
    }
}

/// Direct rollback entry point handed to transports that support one.
#[derive(Clone)]
pub struct RollbackHook {
    shared: Weak<Shared>,
    epoch: u64,
}

impl RollbackHook {
    pub(crate) fn new(shared: &Arc<Shared>, epoch: u64) -> Self {
        Self {
            shared: Arc::downgrade(shared),
            epoch,
        }
    }

    pub fn fire(&self, player: Option<PlayerRef>) {
        if let Some(shared) = self.shared.upgrade() {
            shared.request_rollback(self.epoch, player, RollbackTrigger::Hook);
        }
    }
}

impl fmt::Debug for RollbackHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RollbackHook")
            .field("session", &self.epoch)
            .finish_non_exhaustive()
    }
}

/// One live transfer session owned by a loader.
pub trait Transport: Send + 'static {
    /// Start fetching. Called once, after `listen`.
    ///
    /// # Errors
    ///
    /// Returns an error when the request cannot be issued at all.
    fn load_source(&mut self, source: SourceDescriptor) -> Result<(), TransportError>;

    fn listen(&mut self, listener: EventListener);

    fn bind_player(&mut self, _player: PlayerRef) {}

    /// Returns `true` when the transport will call the hook itself; rollback
    /// codes on the event stream are then ignored for this session.
    fn bind_rollback_hook(&mut self, _hook: RollbackHook) -> bool {
        false
    }

    /// Release every resource. Must be safe to call once after any other method.
    fn destroy(&mut self);
}

/// Creates transports of one backend kind.
pub trait TransportFactory: Send + Sync + 'static {
    type Transport: Transport;

    /// Backend name, also reported as the loader type.
    fn kind(&self) -> &'static str;

    fn is_supported(&self) -> bool;

    /// Whether consumers should stash chunks before parsing.
    fn needs_stash_buffer(&self) -> bool {
        false
    }

    /// Slot used when the loader config does not name one.
    ///
    /// Backends that allow only one live session per process return a
    /// shared slot here.
    fn default_slot(&self) -> SessionSlot {
        SessionSlot::new()
    }

    /// # Errors
    ///
    /// Returns an error when the backend cannot construct a session from `options`.
    fn create(&self, options: &serde_json::Value) -> Result<Self::Transport, TransportError>;
}
