use std::sync::Arc;

use rivulet_core::RollbackTrigger;
use rivulet_platform::Mutex;
use tracing::debug;

use crate::{
    source::{ByteRange, DataSource},
    transport::PlayerRef,
};

/// Consumer-supplied fallback logic, typically swapping in an HTTP loader.
pub trait RollbackHandler: Send + Sync {
    fn on_rollback(&self, request: RollbackRequest);
}

impl<F> RollbackHandler for F
where
    F: Fn(RollbackRequest) + Send + Sync,
{
    fn on_rollback(&self, request: RollbackRequest) {
        self(request);
    }
}

/// Snapshot of the session at the moment the transport gave up.
#[derive(Clone, Debug)]
pub struct RollbackRequest {
    pub trigger: RollbackTrigger,
    pub player: Option<PlayerRef>,
    pub source: Option<DataSource>,
    /// Absolute offset of the first byte not yet delivered in this session.
    pub resume_from: u64,
    /// Bytes delivered by the loader so far.
    pub received_length: u64,
    pub content_length: Option<u64>,
}

impl RollbackRequest {
    /// Range a fallback loader should open to continue without gaps.
    pub fn resume_range(&self) -> ByteRange {
        ByteRange::from_start(self.resume_from)
    }
}

#[derive(Debug, Default)]
struct Latch {
    fired: Option<u64>,
    closed: bool,
}

/// Routes both rollback paths into the one handler.
///
/// Fires at most once per occurrence id and never after [`close`](Self::close).
pub struct RollbackCoordinator {
    handler: Option<Arc<dyn RollbackHandler>>,
    latch: Mutex<Latch>,
}

impl RollbackCoordinator {
    pub fn new(handler: Option<Arc<dyn RollbackHandler>>) -> Self {
        Self {
            handler,
            latch: Mutex::new(Latch::default()),
        }
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Invoke the handler for `occurrence` unless it already ran for it.
    ///
    /// Returns whether the handler was called.
    pub fn request(&self, occurrence: u64, request: RollbackRequest) -> bool {
        let Some(handler) = self.handler.as_ref() else {
            debug!(occurrence, "rollback requested without a handler");
            return false;
        };
        {
            let mut latch = self.latch.lock();
            if latch.closed || latch.fired == Some(occurrence) {
                debug!(occurrence, closed = latch.closed, "rollback suppressed");
                return false;
            }
            latch.fired = Some(occurrence);
        }
        debug!(occurrence, trigger = ?request.trigger, resume_from = request.resume_from, "rollback");
        handler.on_rollback(request);
        true
    }

    pub fn close(&self) {
        self.latch.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.latch.lock().closed
    }
}

impl std::fmt::Debug for RollbackCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollbackCoordinator")
            .field("has_handler", &self.has_handler())
            .field("latch", &*self.latch.lock())
            .finish()
    }
}
