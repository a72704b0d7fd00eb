//! A scripted engine for tests.
//!
//! [`ScriptedEngine`] records every call made into it and answers from
//! state the test controls: injected peers, a join failure switch, and an
//! in-memory root list. [`ScriptedEngineFactory`] hands one to
//! [`Node::new`](crate::Node::new) and keeps a reference for the test.

use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use overlay_core::{
    ExternalAddress, Identity, IdentityType, Mac, MulticastGroup, NetworkId, Peer, Root,
};

use crate::device::{Device, LocalDevice};
use crate::engine::{Engine, EngineError, EngineFactory, NodeHandle};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineCall {
    Join(NetworkId),
    Leave(NetworkId),
    SetInterfaceAddresses(Vec<ExternalAddress>),
    StartListen(IpAddr, u16),
    StopListen(IpAddr, u16),
    MulticastSubscribe(NetworkId, MulticastGroup),
    MulticastUnsubscribe(NetworkId, MulticastGroup),
    SetRoot(String),
    RemoveRoot(String),
    Shutdown,
}

pub struct ScriptedEngine {
    handle: NodeHandle,
    identity: Identity,
    secret_text: String,
    calls: Mutex<Vec<EngineCall>>,
    peers: Mutex<Vec<Peer>>,
    roots: Mutex<BTreeMap<String, Root>>,
    devices: Mutex<HashMap<NetworkId, Arc<LocalDevice>>>,
    fail_joins: AtomicBool,
    fail_listen: AtomicBool,
}

impl ScriptedEngine {
    pub fn new(handle: NodeHandle, identity: Identity) -> Self {
        let secret_text = identity.to_string_with(true);
        Self {
            handle,
            identity,
            secret_text,
            calls: Mutex::new(Vec::new()),
            peers: Mutex::new(Vec::new()),
            roots: Mutex::new(BTreeMap::new()),
            devices: Mutex::new(HashMap::new()),
            fail_joins: AtomicBool::new(false),
            fail_listen: AtomicBool::new(false),
        }
    }

    pub fn handle(&self) -> NodeHandle {
        self.handle
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn set_peers(&self, peers: Vec<Peer>) {
        *self.peers.lock() = peers;
    }

    pub fn fail_joins(&self, fail: bool) {
        self.fail_joins.store(fail, Ordering::SeqCst);
    }

    pub fn fail_listen(&self, fail: bool) {
        self.fail_listen.store(fail, Ordering::SeqCst);
    }

    /// The device created for `network` by the last join.
    pub fn device(&self, network: NetworkId) -> Option<Arc<LocalDevice>> {
        self.devices.lock().get(&network).cloned()
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().push(call);
    }
}

impl Engine for ScriptedEngine {
    fn secret_identity(&self) -> String {
        self.secret_text.clone()
    }

    fn join(&self, network: NetworkId) -> Option<Arc<dyn Device>> {
        self.record(EngineCall::Join(network));
        if self.fail_joins.load(Ordering::SeqCst) {
            return None;
        }
        let mac = Mac::for_network(self.identity.address(), network);
        let device = Arc::new(LocalDevice::new(format!("test{network}"), mac));
        self.devices.lock().insert(network, Arc::clone(&device));
        Some(device)
    }

    fn leave(&self, network: NetworkId) {
        self.record(EngineCall::Leave(network));
    }

    fn peers(&self) -> Vec<Peer> {
        self.peers.lock().clone()
    }

    fn set_interface_addresses(&self, addresses: &[ExternalAddress]) {
        self.record(EngineCall::SetInterfaceAddresses(addresses.to_vec()));
    }

    fn start_listen(&self, ip: IpAddr, port: u16) -> bool {
        self.record(EngineCall::StartListen(ip, port));
        !self.fail_listen.load(Ordering::SeqCst)
    }

    fn stop_listen(&self, ip: IpAddr, port: u16) {
        self.record(EngineCall::StopListen(ip, port));
    }

    fn multicast_subscribe(&self, network: NetworkId, group: MulticastGroup) {
        self.record(EngineCall::MulticastSubscribe(network, group));
    }

    fn multicast_unsubscribe(&self, network: NetworkId, group: MulticastGroup) {
        self.record(EngineCall::MulticastUnsubscribe(network, group));
    }

    fn roots(&self) -> Vec<Root> {
        self.roots.lock().values().cloned().collect()
    }

    fn set_root(&self, root: Root) -> Result<(), EngineError> {
        self.record(EngineCall::SetRoot(root.name.clone()));
        if root.name.is_empty() {
            return Err(EngineError::Rejected("root name is empty".into()));
        }
        self.roots.lock().insert(root.name.clone(), root);
        Ok(())
    }

    fn remove_root(&self, name: &str) -> bool {
        self.record(EngineCall::RemoveRoot(name.to_string()));
        self.roots.lock().remove(name).is_some()
    }

    fn shutdown(&self) {
        self.record(EngineCall::Shutdown);
    }
}

#[derive(Default)]
pub struct ScriptedEngineFactory {
    identity: Option<Identity>,
    secret_text: Option<String>,
    fail_init: bool,
    created: Mutex<Option<Arc<ScriptedEngine>>>,
}

impl ScriptedEngineFactory {
    /// Each engine gets a freshly generated identity.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            ..Self::default()
        }
    }

    /// Engines report `text` as their identity instead of the real one.
    pub fn with_secret_text(text: impl Into<String>) -> Self {
        Self {
            secret_text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Engine creation always fails.
    pub fn failing() -> Self {
        Self {
            fail_init: true,
            ..Self::default()
        }
    }

    /// The most recently created engine.
    pub fn engine(&self) -> Option<Arc<ScriptedEngine>> {
        self.created.lock().clone()
    }
}

impl EngineFactory for ScriptedEngineFactory {
    fn create(&self, handle: NodeHandle, _base_path: &Path) -> Result<Arc<dyn Engine>, EngineError> {
        if self.fail_init {
            return Err(EngineError::Init("scripted failure".into()));
        }
        let identity = match &self.identity {
            Some(identity) => identity.clone(),
            None => Identity::generate(IdentityType::C25519)
                .map_err(|e| EngineError::Init(e.to_string()))?,
        };
        let mut engine = ScriptedEngine::new(handle, identity);
        if let Some(text) = &self.secret_text {
            engine.secret_text = text.clone();
        }
        let engine = Arc::new(engine);
        *self.created.lock() = Some(Arc::clone(&engine));
        Ok(engine)
    }
}
