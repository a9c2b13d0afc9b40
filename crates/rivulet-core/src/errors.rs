use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of a loader failure.
///
/// `Exception` and `HttpStatusCodeInvalid` are produced by every adapter;
/// the remaining kinds are raised by transports that can detect them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoaderErrorKind {
    /// Malformed or unexpected payload.
    Exception,
    /// Transport reported a non-success HTTP status.
    HttpStatusCodeInvalid,
    ConnectingTimeout,
    /// Stream ended before the declared content length was reached.
    EarlyEof,
    UnrecoverableEarlyEof,
    /// Peer-assisted session could not serve data.
    PeerUnavailable,
}

impl LoaderErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exception => "Exception",
            Self::HttpStatusCodeInvalid => "HttpStatusCodeInvalid",
            Self::ConnectingTimeout => "ConnectingTimeout",
            Self::EarlyEof => "EarlyEof",
            Self::UnrecoverableEarlyEof => "UnrecoverableEarlyEof",
            Self::PeerUnavailable => "PeerUnavailable",
        }
    }
}

impl fmt::Display for LoaderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
