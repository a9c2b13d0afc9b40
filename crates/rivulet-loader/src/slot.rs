//! Process-wide serialization of transport sessions.
//!
//! Some backends (peer overlays in particular) can run only one session per
//! process. A [`SessionSlot`] models that resource: acquiring it preempts the
//! current holder, and the returned [`SlotLease`] releases it on drop.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, LazyLock},
};

use rivulet_platform::Mutex;
use tracing::debug;

static GLOBAL_SLOTS: LazyLock<Mutex<HashMap<&'static str, SessionSlot>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

struct Holder {
    id: u64,
    backend: &'static str,
    preempt: Box<dyn FnOnce() + Send>,
}

#[derive(Default)]
struct SlotInner {
    next_id: u64,
    holder: Option<Holder>,
}

#[derive(Clone, Default)]
pub struct SessionSlot {
    inner: Arc<Mutex<SlotInner>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot shared by every loader of `backend` in this process.
    pub fn global(backend: &'static str) -> Self {
        GLOBAL_SLOTS.lock().entry(backend).or_default().clone()
    }

    pub fn is_occupied(&self) -> bool {
        self.inner.lock().holder.is_some()
    }

    pub fn holder_backend(&self) -> Option<&'static str> {
        self.inner.lock().holder.as_ref().map(|h| h.backend)
    }

    /// Take the slot. The previous holder's `preempt` callback runs before
    /// this returns, outside the slot lock.
    pub fn acquire<F>(&self, backend: &'static str, preempt: F) -> SlotLease
    where
        F: FnOnce() + Send + 'static,
    {
        let (lease, previous) = {
            let mut inner = self.inner.lock();
            inner.next_id += 1;
            let id = inner.next_id;
            let previous = inner.holder.replace(Holder {
                id,
                backend,
                preempt: Box::new(preempt),
            });
            let lease = SlotLease {
                inner: Arc::clone(&self.inner),
                id,
            };
            (lease, previous)
        };

        if let Some(previous) = previous {
            debug!(
                backend = previous.backend,
                lease = previous.id,
                by = backend,
                "preempting session"
            );
            (previous.preempt)();
        }
        lease
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for SessionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSlot")
            .field("holder", &self.holder_backend())
            .finish()
    }
}

/// Exclusive hold on a [`SessionSlot`].
pub struct SlotLease {
    inner: Arc<Mutex<SlotInner>>,
    id: u64,
}

impl SlotLease {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// `false` once another acquirer took the slot.
    pub fn is_held(&self) -> bool {
        self.inner
            .lock()
            .holder
            .as_ref()
            .is_some_and(|h| h.id == self.id)
    }
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        let released = {
            let mut inner = self.inner.lock();
            if inner.holder.as_ref().is_some_and(|h| h.id == self.id) {
                inner.holder.take()
            } else {
                None
            }
        };
        // The preempt closure may own transport state; drop it unlocked.
        drop(released);
    }
}

impl fmt::Debug for SlotLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotLease").field("id", &self.id).finish()
    }
}
