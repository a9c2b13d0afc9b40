//! Scriptable peer engine.
//!
//! Every engine created by a [`MockPeerProvider`] reports into the same
//! [`PeerControl`], which tests use both to drive state changes and to
//! inspect what the loader did with the engine.

use std::{collections::HashMap, sync::Arc};

use rivulet_loader::{
    LoaderResult, PeerEngine, PeerEngineProvider, PeerLoadRequest, PlayerRef, RollbackHook,
    StateChange, StateChangeSink, TransportError,
};
use rivulet_platform::Mutex;
use serde_json::Value;

struct ControlState {
    supported: bool,
    accept_hook: bool,
    fail_create: Option<TransportError>,
    fail_load: Option<TransportError>,
    created: usize,
    destroyed: usize,
    log: Vec<String>,
    options: Vec<Value>,
    requests: Vec<PeerLoadRequest>,
    players: HashMap<usize, PlayerRef>,
    sinks: HashMap<usize, StateChangeSink>,
    hooks: HashMap<usize, RollbackHook>,
}

#[derive(Clone)]
pub struct PeerControl {
    state: Arc<Mutex<ControlState>>,
}

impl Default for PeerControl {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerControl {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ControlState {
                supported: true,
                accept_hook: false,
                fail_create: None,
                fail_load: None,
                created: 0,
                destroyed: 0,
                log: Vec::new(),
                options: Vec::new(),
                requests: Vec::new(),
                players: HashMap::new(),
                sinks: HashMap::new(),
                hooks: HashMap::new(),
            })),
        }
    }

    pub fn provider(&self) -> MockPeerProvider {
        MockPeerProvider {
            control: self.clone(),
        }
    }

    pub fn set_supported(&self, supported: bool) {
        self.state.lock().supported = supported;
    }

    /// Engines created from now on take the rollback hook.
    pub fn accept_rollback_hook(&self, accept: bool) {
        self.state.lock().accept_hook = accept;
    }

    pub fn fail_next_create(&self, error: TransportError) {
        self.state.lock().fail_create = Some(error);
    }

    pub fn fail_next_load(&self, error: TransportError) {
        self.state.lock().fail_load = Some(error);
    }

    pub fn created(&self) -> usize {
        self.state.lock().created
    }

    pub fn destroyed(&self) -> usize {
        self.state.lock().destroyed
    }

    /// Engines created and not yet destroyed.
    pub fn live(&self) -> usize {
        let state = self.state.lock();
        state.created - state.destroyed
    }

    /// Lifecycle log such as `["create#1", "load#1", "destroy#1"]`.
    pub fn log(&self) -> Vec<String> {
        self.state.lock().log.clone()
    }

    pub fn options(&self) -> Vec<Value> {
        self.state.lock().options.clone()
    }

    pub fn requests(&self) -> Vec<PeerLoadRequest> {
        self.state.lock().requests.clone()
    }

    pub fn player(&self, engine: usize) -> Option<PlayerRef> {
        self.state.lock().players.get(&engine).cloned()
    }

    pub fn has_hook(&self, engine: usize) -> bool {
        self.state.lock().hooks.contains_key(&engine)
    }

    /// Push a state change from the most recently created engine.
    pub fn send(&self, change: StateChange) -> LoaderResult<()> {
        let latest = self.created();
        self.send_to(latest, change)
    }

    /// Push a state change from engine `engine` (1-based), even if it was destroyed.
    ///
    /// # Panics
    ///
    /// Panics if that engine never subscribed.
    pub fn send_to(&self, engine: usize, change: StateChange) -> LoaderResult<()> {
        let sink = self.state.lock().sinks.get(&engine).cloned();
        sink.unwrap().send(change)
    }

    pub fn send_all<I>(&self, changes: I) -> LoaderResult<()>
    where
        I: IntoIterator<Item = StateChange>,
    {
        changes.into_iter().try_for_each(|change| self.send(change))
    }

    /// Call the rollback hook bound to the latest engine.
    ///
    /// # Panics
    ///
    /// Panics if the engine did not take a hook.
    pub fn fire_rollback(&self, player: Option<PlayerRef>) {
        let hook = {
            let state = self.state.lock();
            state.hooks.get(&state.created).cloned()
        };
        hook.unwrap().fire(player);
    }
}

pub struct MockPeerProvider {
    control: PeerControl,
}

impl PeerEngineProvider for MockPeerProvider {
    type Engine = MockPeerEngine;

    fn is_supported(&self) -> bool {
        self.control.state.lock().supported
    }

    fn create(&self, options: &Value) -> Result<MockPeerEngine, TransportError> {
        let mut state = self.control.state.lock();
        if let Some(error) = state.fail_create.take() {
            return Err(error);
        }
        state.created += 1;
        let id = state.created;
        state.log.push(format!("create#{id}"));
        state.options.push(options.clone());
        Ok(MockPeerEngine {
            id,
            accept_hook: state.accept_hook,
            control: self.control.clone(),
        })
    }
}

pub struct MockPeerEngine {
    id: usize,
    accept_hook: bool,
    control: PeerControl,
}

impl MockPeerEngine {
    pub fn id(&self) -> usize {
        self.id
    }
}

impl PeerEngine for MockPeerEngine {
    fn load_source(&mut self, request: PeerLoadRequest) -> Result<(), TransportError> {
        let mut state = self.control.state.lock();
        state.log.push(format!("load#{}", self.id));
        if let Some(error) = state.fail_load.take() {
            return Err(error);
        }
        state.requests.push(request);
        Ok(())
    }

    fn subscribe(&mut self, sink: StateChangeSink) {
        self.control.state.lock().sinks.insert(self.id, sink);
    }

    fn set_player(&mut self, player: PlayerRef) {
        self.control.state.lock().players.insert(self.id, player);
    }

    fn set_rollback(&mut self, hook: RollbackHook) -> bool {
        if self.accept_hook {
            self.control.state.lock().hooks.insert(self.id, hook);
        }
        self.accept_hook
    }

    fn destroy(&mut self) {
        let mut state = self.control.state.lock();
        state.destroyed += 1;
        state.log.push(format!("destroy#{}", self.id));
    }
}
