/// Transport-session lifecycle events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A transport was created and the load request issued.
    Opened { backend: &'static str, session: u64 },
    /// The owning loader tore its transport down.
    Destroyed { backend: &'static str, session: u64 },
    /// Another loader took the session slot and tore this transport down.
    Preempted { backend: &'static str, session: u64 },
}
