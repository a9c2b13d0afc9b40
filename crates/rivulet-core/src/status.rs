use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a single loader instance.
///
/// `Idle` is initial. `Complete` and `Error` are terminal: a loader that
/// reached either needs to be replaced by a new instance to retry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoaderStatus {
    #[default]
    Idle,
    Connecting,
    Buffering,
    Error,
    Complete,
}

impl LoaderStatus {
    /// `true` for `Complete` and `Error`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// `true` while a transfer is in flight (`Connecting` or `Buffering`).
    #[must_use]
    pub fn is_working(self) -> bool {
        matches!(self, Self::Connecting | Self::Buffering)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Buffering => "buffering",
            Self::Error => "error",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for LoaderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
