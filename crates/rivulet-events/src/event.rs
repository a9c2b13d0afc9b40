use crate::{LoaderEvent, SessionEvent};

/// Unified event for the loader pipeline.
///
/// Hierarchical: each subsystem has its own variant with a sub-enum.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Loader dispatch event.
    Loader(LoaderEvent),
    /// Transport session event.
    Session(SessionEvent),
}

impl From<LoaderEvent> for Event {
    fn from(e: LoaderEvent) -> Self {
        Self::Loader(e)
    }
}

impl From<SessionEvent> for Event {
    fn from(e: SessionEvent) -> Self {
        Self::Session(e)
    }
}
