use rivulet_core::{LoaderErrorKind, LoaderStatus, RollbackTrigger};

/// Events emitted by a loader while it dispatches transport data.
#[derive(Clone, Debug, PartialEq)]
pub enum LoaderEvent {
    /// Status moved from `from` to `to`.
    StatusChanged {
        from: LoaderStatus,
        to: LoaderStatus,
    },
    /// Total size became known. Fires at most once per loader.
    ContentLengthKnown { length: u64 },
    /// A chunk was handed to the consumer.
    DataDispatched { byte_start: u64, received_length: u64 },
    /// A chunk arrived after abort or a terminal status and was dropped.
    Discarded { bytes: u64 },
    /// The transport signalled end of data.
    Completed { range_from: u64, received_length: u64 },
    /// A fault was routed to the consumer.
    Error {
        kind: LoaderErrorKind,
        message: String,
    },
    /// The rollback coordinator was invoked.
    RollbackRequested {
        trigger: RollbackTrigger,
        received_length: u64,
    },
}
