use serde::{Deserialize, Serialize};

/// Which integration path produced a rollback request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RollbackTrigger {
    /// The transport called the hook bound at session setup.
    Hook,
    /// The loader observed a rollback code on the transport's state-change stream.
    StateChange,
}
