//! Translation of transport events into observer callbacks.
//!
//! All loader state lives in [`Shared`]. Every mutation happens under its
//! lock; observer callbacks are invoked after the lock is released, and the
//! session is re-checked before each callback so that an observer calling
//! `abort` or `destroy` takes effect for everything that follows.

use std::sync::Arc;

use bytes::Bytes;
use rivulet_core::{LoaderStatus, RollbackTrigger};
use rivulet_events::{Event, EventBus, LoaderEvent, SessionEvent};
use rivulet_platform::Mutex;
use tracing::{debug, trace, warn};

use crate::{
    error::{LoaderError, LoaderResult},
    observer::LoaderObserver,
    rollback::{RollbackCoordinator, RollbackHandler, RollbackRequest},
    source::{ByteRange, DataSource},
    transport::{Payload, PlayerRef, TransportEvent},
};

#[derive(Debug, Default)]
struct LoaderState {
    status: LoaderStatus,
    content_length: Option<u64>,
    received_length: u64,
    /// Bytes delivered since the current session opened.
    session_received: u64,
    range_from: u64,
    abort_requested: bool,
    destroyed: bool,
    /// Identifies the live transport session. Bumped whenever one ends.
    epoch: u64,
    hook_bound: bool,
    source: Option<DataSource>,
}

impl LoaderState {
    fn is_current(&self, epoch: u64) -> bool {
        !self.destroyed && self.epoch == epoch
    }

    fn accepts_data(&self) -> bool {
        !self.abort_requested && !self.status.is_terminal()
    }

    fn end_session(&mut self) -> u64 {
        let ended = self.epoch;
        self.epoch += 1;
        self.hook_bound = false;
        ended
    }
}

pub(crate) struct Shared {
    name: &'static str,
    state: Mutex<LoaderState>,
    observer: Mutex<Option<Arc<dyn LoaderObserver>>>,
    rollback: RollbackCoordinator,
    bus: Option<EventBus>,
}

impl Shared {
    pub(crate) fn new(
        name: &'static str,
        rollback: Option<Arc<dyn RollbackHandler>>,
        bus: Option<EventBus>,
    ) -> Self {
        Self {
            name,
            state: Mutex::new(LoaderState::default()),
            observer: Mutex::new(None),
            rollback: RollbackCoordinator::new(rollback),
            bus,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn status(&self) -> LoaderStatus {
        self.state.lock().status
    }

    pub(crate) fn content_length(&self) -> Option<u64> {
        self.state.lock().content_length
    }

    pub(crate) fn received_length(&self) -> u64 {
        self.state.lock().received_length
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.state.lock().abort_requested
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    pub(crate) fn is_current(&self, epoch: u64) -> bool {
        self.state.lock().is_current(epoch)
    }

    pub(crate) fn has_rollback_handler(&self) -> bool {
        self.rollback.has_handler()
    }

    pub(crate) fn set_observer(&self, observer: Arc<dyn LoaderObserver>) {
        if self.is_destroyed() {
            debug!(loader = self.name, "observer ignored after destroy");
            return;
        }
        *self.observer.lock() = Some(observer);
    }

    fn observer(&self) -> Option<Arc<dyn LoaderObserver>> {
        self.observer.lock().clone()
    }

    pub(crate) fn publish<E: Into<Event>>(&self, event: E) {
        if let Some(bus) = &self.bus {
            bus.publish(event);
        }
    }

    fn transition(&self, state: &mut LoaderState, to: LoaderStatus) {
        let from = state.status;
        if from == to {
            return;
        }
        state.status = to;
        debug!(loader = self.name, %from, %to, "status changed");
        self.publish(LoaderEvent::StatusChanged { from, to });
    }

    // Session lifecycle, driven by the adapter.

    pub(crate) fn check_open(&self) -> LoaderResult<()> {
        let state = self.state.lock();
        if state.destroyed {
            return Err(LoaderError::Destroyed);
        }
        if state.status.is_terminal() {
            return Err(LoaderError::Terminated {
                status: state.status,
            });
        }
        Ok(())
    }

    /// Invalidate the live session. Returns its id.
    pub(crate) fn end_session(&self) -> u64 {
        self.state.lock().end_session()
    }

    pub(crate) fn begin_session(&self, source: &DataSource, range: Option<ByteRange>) -> u64 {
        let mut state = self.state.lock();
        state.end_session();
        state.source = Some(source.clone());
        state.range_from = range.map_or(0, |r| r.from);
        state.session_received = 0;
        self.transition(&mut state, LoaderStatus::Connecting);
        state.epoch
    }

    pub(crate) fn mark_hook_bound(&self, epoch: u64) {
        let mut state = self.state.lock();
        if state.is_current(epoch) {
            state.hook_bound = true;
        }
    }

    pub(crate) fn mark_bound(&self, epoch: u64) {
        let mut state = self.state.lock();
        if state.is_current(epoch) && state.status == LoaderStatus::Connecting {
            self.transition(&mut state, LoaderStatus::Buffering);
        }
    }

    pub(crate) fn fail_open(&self, epoch: u64) {
        let mut state = self.state.lock();
        if state.is_current(epoch) {
            self.transition(&mut state, LoaderStatus::Error);
        }
    }

    /// Another loader took the session slot.
    pub(crate) fn preempt(&self, epoch: u64) -> bool {
        {
            let mut state = self.state.lock();
            if !state.is_current(epoch) {
                return false;
            }
            state.end_session();
            if state.status.is_working() {
                self.transition(&mut state, LoaderStatus::Idle);
            }
        }
        self.publish(SessionEvent::Preempted {
            backend: self.name,
            session: epoch,
        });
        true
    }

    pub(crate) fn abort(&self) {
        let mut state = self.state.lock();
        if state.destroyed {
            return;
        }
        state.abort_requested = true;
        if !state.status.is_terminal() {
            self.transition(&mut state, LoaderStatus::Complete);
        }
    }

    /// Returns the id of the session that was live, or `None` when the
    /// loader was already destroyed.
    pub(crate) fn destroy(&self) -> Option<u64> {
        let ended = {
            let mut state = self.state.lock();
            if state.destroyed {
                return None;
            }
            if state.status.is_working() {
                state.abort_requested = true;
                self.transition(&mut state, LoaderStatus::Complete);
            }
            state.destroyed = true;
            state.end_session()
        };
        self.observer.lock().take();
        self.rollback.close();
        Some(ended)
    }

    // Event dispatch.

    pub(crate) fn handle(&self, epoch: u64, event: TransportEvent) -> LoaderResult<()> {
        match event {
            TransportEvent::ReceiveBuffer(payload) => self.receive_buffer(epoch, payload),
            TransportEvent::SizeHint(length) => {
                self.announce_content_length(epoch, length);
                Ok(())
            }
            TransportEvent::BufferEof => {
                self.complete(epoch);
                Ok(())
            }
            TransportEvent::HttpStatusInvalid {
                status,
                status_text,
            } => self.fail(
                epoch,
                LoaderError::HttpStatusInvalid {
                    status,
                    status_text,
                },
            ),
            TransportEvent::Failure { kind, message } => {
                self.fail(epoch, LoaderError::Transport { kind, message })
            }
            TransportEvent::Rollback { player } => {
                self.request_rollback(epoch, player, RollbackTrigger::StateChange);
                Ok(())
            }
            TransportEvent::Other { code } => {
                trace!(loader = self.name, code, "ignoring transport event");
                Ok(())
            }
        }
    }

    fn receive_buffer(&self, epoch: u64, payload: Payload) -> LoaderResult<()> {
        let chunk = {
            let mut state = self.state.lock();
            if !state.is_current(epoch) {
                trace!(loader = self.name, epoch, "stale session; dropping payload");
                return Ok(());
            }
            if !state.accepts_data() {
                drop(state);
                self.discard(payload.len());
                return Ok(());
            }
            match payload {
                Payload::Binary(chunk) => chunk,
                other => {
                    self.transition(&mut state, LoaderStatus::Error);
                    drop(state);
                    return self.report(LoaderError::MalformedPayload {
                        loader: self.name,
                        found: other.type_name(),
                    });
                }
            }
        };

        if chunk.is_empty() {
            trace!(loader = self.name, "empty chunk");
            return Ok(());
        }
        self.announce_content_length(epoch, chunk.len() as u64);
        self.dispatch_chunk(epoch, chunk);
        Ok(())
    }

    fn announce_content_length(&self, epoch: u64, length: u64) {
        {
            let mut state = self.state.lock();
            if !state.is_current(epoch) || !state.accepts_data() || state.content_length.is_some()
            {
                return;
            }
            state.content_length = Some(length);
        }
        debug!(loader = self.name, length, "content length known");
        self.publish(LoaderEvent::ContentLengthKnown { length });
        if let Some(observer) = self.observer() {
            observer.on_content_length_known(length);
        }
    }

    fn dispatch_chunk(&self, epoch: u64, chunk: Bytes) {
        let len = chunk.len() as u64;
        let (byte_start, received_length) = {
            let mut state = self.state.lock();
            if !state.is_current(epoch) {
                return;
            }
            if !state.accepts_data() {
                drop(state);
                self.discard(chunk.len());
                return;
            }
            let byte_start = state.received_length;
            state.received_length += len;
            state.session_received += len;
            (byte_start, state.received_length)
        };

        trace!(loader = self.name, byte_start, received_length, "chunk");
        self.publish(LoaderEvent::DataDispatched {
            byte_start,
            received_length,
        });
        if let Some(observer) = self.observer() {
            observer.on_data_arrival(chunk, byte_start, received_length);
        }
    }

    fn discard(&self, bytes: usize) {
        trace!(loader = self.name, bytes, "discarding chunk after abort");
        self.publish(LoaderEvent::Discarded {
            bytes: bytes as u64,
        });
    }

    fn complete(&self, epoch: u64) {
        let (range_from, received_length) = {
            let mut state = self.state.lock();
            if !state.is_current(epoch) || !state.accepts_data() {
                return;
            }
            self.transition(&mut state, LoaderStatus::Complete);
            (state.range_from, state.received_length)
        };

        debug!(loader = self.name, range_from, received_length, "complete");
        self.publish(LoaderEvent::Completed {
            range_from,
            received_length,
        });
        if let Some(observer) = self.observer() {
            observer.on_complete(range_from, received_length);
        }
    }

    fn fail(&self, epoch: u64, error: LoaderError) -> LoaderResult<()> {
        {
            let mut state = self.state.lock();
            if !state.is_current(epoch) || !state.accepts_data() {
                debug!(loader = self.name, %error, "dropping error for finished session");
                return Ok(());
            }
            self.transition(&mut state, LoaderStatus::Error);
        }
        self.report(error)
    }

    /// Single error route: observer first, otherwise back to the caller.
    fn report(&self, error: LoaderError) -> LoaderResult<()> {
        let kind = error.kind();
        warn!(loader = self.name, %kind, %error, "loader error");
        if self.bus.as_ref().is_some_and(EventBus::is_observed) {
            self.publish(LoaderEvent::Error {
                kind,
                message: error.to_string(),
            });
        }
        match self.observer() {
            Some(observer) => observer.on_error(error),
            None => Err(error),
        }
    }

    pub(crate) fn request_rollback(
        &self,
        epoch: u64,
        player: Option<PlayerRef>,
        trigger: RollbackTrigger,
    ) {
        let request = {
            let state = self.state.lock();
            if !state.is_current(epoch) {
                debug!(loader = self.name, "rollback from stale session ignored");
                return;
            }
            if trigger == RollbackTrigger::StateChange && state.hook_bound {
                debug!(loader = self.name, "rollback hook bound; ignoring state change");
                return;
            }
            RollbackRequest {
                trigger,
                player,
                source: state.source.clone(),
                resume_from: state.range_from + state.session_received,
                received_length: state.received_length,
                content_length: state.content_length,
            }
        };

        let received_length = request.received_length;
        if self.rollback.request(epoch, request) {
            self.publish(LoaderEvent::RollbackRequested {
                trigger,
                received_length,
            });
        }
    }
}
