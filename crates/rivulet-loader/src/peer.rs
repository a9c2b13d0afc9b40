//! Adapter for peer-assisted delivery engines.
//!
//! A peer engine reports everything through one state-change stream of
//! numeric codes. [`PeerTransport`] subscribes to it and demultiplexes the
//! codes into [`TransportEvent`]s; [`PeerTransportFactory`] checks engine
//! support and reads the engine's options from the `p2pOptions` key of the
//! loader's transport options.

use rivulet_core::LoaderErrorKind;
use serde_json::Value;
use tracing::trace;

use crate::{
    error::{LoaderResult, TransportError},
    slot::SessionSlot,
    source::SourceDescriptor,
    transport::{
        EventListener, Payload, PlayerRef, RollbackHook, Transport, TransportEvent,
        TransportFactory,
    },
};

pub const P2P_OPTIONS_KEY: &str = "p2pOptions";

/// State-change codes understood by the loader.
pub mod codes {
    pub const RECEIVE_BUFFER: i32 = 1;
    pub const ROLLBACK: i32 = 2;
    pub const BUFFER_EOF: i32 = 3;
    pub const HTTP_STATUS_INVALID: i32 = 4;
    pub const PEER_UNAVAILABLE: i32 = 5;
}

/// One entry of a peer engine's state-change stream.
#[derive(Clone, Debug)]
pub struct StateChange {
    pub code: i32,
    pub payload: Payload,
    pub player: Option<PlayerRef>,
    pub status_code: Option<u16>,
    pub message: Option<String>,
}

impl StateChange {
    pub fn new(code: i32) -> Self {
        Self {
            code,
            payload: Payload::Empty,
            player: None,
            status_code: None,
            message: None,
        }
    }

    pub fn receive_buffer(payload: impl Into<Payload>) -> Self {
        Self {
            payload: payload.into(),
            ..Self::new(codes::RECEIVE_BUFFER)
        }
    }

    pub fn rollback(player: Option<PlayerRef>) -> Self {
        Self {
            player,
            ..Self::new(codes::ROLLBACK)
        }
    }

    pub fn http_status_invalid(status: u16, status_text: impl Into<String>) -> Self {
        Self {
            status_code: Some(status),
            message: Some(status_text.into()),
            ..Self::new(codes::HTTP_STATUS_INVALID)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn into_event(self) -> TransportEvent {
        match self.code {
            codes::RECEIVE_BUFFER => TransportEvent::ReceiveBuffer(self.payload),
            codes::ROLLBACK => TransportEvent::Rollback {
                player: self.player,
            },
            codes::BUFFER_EOF => TransportEvent::BufferEof,
            codes::HTTP_STATUS_INVALID => TransportEvent::HttpStatusInvalid {
                status: self.status_code.unwrap_or_default(),
                status_text: self.message.unwrap_or_default(),
            },
            codes::PEER_UNAVAILABLE => TransportEvent::Failure {
                kind: LoaderErrorKind::PeerUnavailable,
                message: self
                    .message
                    .unwrap_or_else(|| "no peer available".to_owned()),
            },
            code => TransportEvent::Other { code },
        }
    }
}

/// Where a peer engine pushes its state changes.
#[derive(Clone, Debug)]
pub struct StateChangeSink {
    listener: EventListener,
}

impl StateChangeSink {
    /// # Errors
    ///
    /// Returns the loader error the observer left unhandled.
    pub fn send(&self, change: StateChange) -> LoaderResult<()> {
        trace!(code = change.code, "state change");
        self.listener.emit(change.into_event())
    }

    pub fn is_live(&self) -> bool {
        self.listener.is_live()
    }
}

/// Load request in the shape peer engines take it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerLoadRequest {
    pub video_id: Option<String>,
    pub src: String,
}

/// Peer delivery engine, typically wrapping a vendor SDK.
pub trait PeerEngine: Send + 'static {
    /// # Errors
    ///
    /// Returns an error when the engine refuses the source.
    fn load_source(&mut self, request: PeerLoadRequest) -> Result<(), TransportError>;

    fn subscribe(&mut self, sink: StateChangeSink);

    fn set_player(&mut self, _player: PlayerRef) {}

    /// Return `true` if the engine calls the hook itself instead of emitting
    /// a rollback state change.
    fn set_rollback(&mut self, _hook: RollbackHook) -> bool {
        false
    }

    fn destroy(&mut self);
}

/// Constructs engines from their options.
pub trait PeerEngineProvider: Send + Sync + 'static {
    type Engine: PeerEngine;

    fn is_supported(&self) -> bool;

    /// # Errors
    ///
    /// Returns an error when the engine cannot start with `options`.
    fn create(&self, options: &Value) -> Result<Self::Engine, TransportError>;
}

#[derive(Debug)]
pub struct PeerTransport<E> {
    engine: E,
}

impl<E: PeerEngine> PeerTransport<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}

impl<E: PeerEngine> Transport for PeerTransport<E> {
    fn load_source(&mut self, source: SourceDescriptor) -> Result<(), TransportError> {
        if let Some(range) = source.range.filter(|r| !r.is_full()) {
            trace!(from = range.from, "peer engines ignore range hints");
        }
        self.engine.load_source(PeerLoadRequest {
            video_id: source.video_id,
            src: source.src,
        })
    }

    fn listen(&mut self, listener: EventListener) {
        self.engine.subscribe(StateChangeSink { listener });
    }

    fn bind_player(&mut self, player: PlayerRef) {
        self.engine.set_player(player);
    }

    fn bind_rollback_hook(&mut self, hook: RollbackHook) -> bool {
        self.engine.set_rollback(hook)
    }

    fn destroy(&mut self) {
        self.engine.destroy();
    }
}

/// Factory for peer-backed loaders.
#[derive(Clone, Debug, Default)]
pub struct PeerTransportFactory<P> {
    provider: P,
}

impl<P: PeerEngineProvider> PeerTransportFactory<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P: PeerEngineProvider> TransportFactory for PeerTransportFactory<P> {
    type Transport = PeerTransport<P::Engine>;

    fn kind(&self) -> &'static str {
        "p2p"
    }

    fn is_supported(&self) -> bool {
        self.provider.is_supported()
    }

    /// Peer engines are process-wide: one live session at a time.
    fn default_slot(&self) -> SessionSlot {
        SessionSlot::global(self.kind())
    }

    fn create(&self, options: &Value) -> Result<Self::Transport, TransportError> {
        let engine_options = options.get(P2P_OPTIONS_KEY).unwrap_or(&Value::Null);
        self.provider.create(engine_options).map(PeerTransport::new)
    }
}
