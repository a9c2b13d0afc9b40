use rivulet_core::{LoaderErrorKind, LoaderStatus};
use thiserror::Error;

/// Failures raised while creating or driving a transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("{backend} transport is not supported here")]
    Unsupported { backend: &'static str },

    #[error("invalid source `{src}`: {reason}")]
    InvalidSource { src: String, reason: String },

    #[error("no async runtime available to drive the transport")]
    NoRuntime,

    #[error("transport rejected the request: {0}")]
    Rejected(String),
}

/// Every fault a loader reports, either through
/// [`LoaderObserver::on_error`](crate::LoaderObserver::on_error) or as a
/// returned `Err`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoaderError {
    #[error("{loader}: received payload is not a binary buffer (got {found})")]
    MalformedPayload {
        loader: &'static str,
        found: &'static str,
    },

    #[error("HTTP status code invalid: {status} {status_text}")]
    HttpStatusInvalid { status: u16, status_text: String },

    /// Backend-specific failure carrying its own classification.
    #[error("{kind}: {message}")]
    Transport {
        kind: LoaderErrorKind,
        message: String,
    },

    #[error("data source has no url")]
    MissingUrl,

    #[error("loader is {status}; a new loader is required to retry")]
    Terminated { status: LoaderStatus },

    #[error("loader was destroyed")]
    Destroyed,

    #[error(transparent)]
    Setup(#[from] TransportError),
}

impl LoaderError {
    /// Machine-readable classification.
    pub fn kind(&self) -> LoaderErrorKind {
        match self {
            Self::HttpStatusInvalid { .. } => LoaderErrorKind::HttpStatusCodeInvalid,
            Self::Transport { kind, .. } => *kind,
            Self::Setup(TransportError::Unsupported { .. }) => LoaderErrorKind::PeerUnavailable,
            Self::MalformedPayload { .. }
            | Self::MissingUrl
            | Self::Terminated { .. }
            | Self::Destroyed
            | Self::Setup(_) => LoaderErrorKind::Exception,
        }
    }

    /// `{code, msg}` pair handed to consumers alongside the kind.
    ///
    /// HTTP failures carry the status code and reason; everything else uses `-1`.
    pub fn info(&self) -> ErrorInfo {
        match self {
            Self::HttpStatusInvalid {
                status,
                status_text,
            } => ErrorInfo {
                code: i64::from(*status),
                msg: status_text.clone(),
            },
            other => ErrorInfo {
                code: -1,
                msg: other.to_string(),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: i64,
    pub msg: String,
}

pub type LoaderResult<T> = Result<T, LoaderError>;
