#![forbid(unsafe_code)]

//! Pluggable data loaders for streaming media.
//!
//! A [`TransportLoader`] binds the [`BaseLoader`] contract to one backend
//! through a [`TransportFactory`]. Transport events flow through a single
//! dispatch path that keeps byte accounting contiguous, reports content
//! length at most once and stays silent after `abort` or `destroy`.
//!
//! Two backends ship here: [`PeerTransportFactory`] adapts peer-assisted
//! delivery engines, and [`HttpTransportFactory`] streams range requests
//! over `rivulet-net`. A [`RollbackHandler`] lets the consumer move from
//! the first to the second without losing its place.

mod config;
mod dispatch;
mod error;
mod http;
mod loader;
mod observer;
mod peer;
mod rollback;
mod slot;
mod source;
mod transport;

pub use crate::{
    config::LoaderConfig,
    error::{ErrorInfo, LoaderError, LoaderResult, TransportError},
    http::{HEADERS_KEY, HttpTransport, HttpTransportFactory, HttpTransportOptions},
    loader::{BaseLoader, LoaderHandle, TransportLoader},
    observer::LoaderObserver,
    peer::{
        P2P_OPTIONS_KEY, PeerEngine, PeerEngineProvider, PeerLoadRequest, PeerTransport,
        PeerTransportFactory, StateChange, StateChangeSink, codes,
    },
    rollback::{RollbackCoordinator, RollbackHandler, RollbackRequest},
    slot::{SessionSlot, SlotLease},
    source::{ByteRange, DataSource, SourceDescriptor},
    transport::{
        EventListener, Payload, PlayerRef, RollbackHook, Transport, TransportEvent,
        TransportFactory,
    },
};
pub use rivulet_core::{LoaderErrorKind, LoaderStatus, RollbackTrigger};
