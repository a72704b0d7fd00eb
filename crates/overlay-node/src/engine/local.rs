//! A standalone engine for running the controller without a protocol core.
//!
//! It owns the node identity and roots through the state callbacks, binds a
//! UDP socket for each listen request, and creates in-process devices on
//! join. It never discovers peers, so the node stays offline.

use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use overlay_core::{
    ExternalAddress, Identity, IdentityType, Mac, MulticastGroup, NetworkId, Peer, Root,
};

use crate::device::{Device, LocalDevice};
use crate::engine::callbacks;
use crate::engine::{Engine, EngineError, EngineFactory, NodeHandle};
use crate::events::EngineEvent;
use crate::storage::StateObjectKind;

const NO_ID: [u64; 2] = [0, 0];

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalEngineFactory;

impl EngineFactory for LocalEngineFactory {
    fn create(&self, handle: NodeHandle, _base_path: &Path) -> Result<Arc<dyn Engine>, EngineError> {
        Ok(Arc::new(LocalEngine::start(handle)?))
    }
}

pub struct LocalEngine {
    handle: NodeHandle,
    identity: Identity,
    sockets: Mutex<HashMap<SocketAddr, UdpSocket>>,
    devices: Mutex<HashMap<NetworkId, Arc<LocalDevice>>>,
    roots: Mutex<BTreeMap<String, Root>>,
    external: Mutex<Vec<ExternalAddress>>,
    subscriptions: Mutex<Vec<(NetworkId, MulticastGroup)>>,
}

impl LocalEngine {
    /// Load or generate the identity and load the roots, both through the
    /// state callbacks of `handle`.
    pub fn start(handle: NodeHandle) -> Result<Self, EngineError> {
        let identity = load_or_generate_identity(handle)?;
        let roots = load_roots(handle);
        callbacks::event(handle, EngineEvent::Up);
        Ok(Self {
            handle,
            identity,
            sockets: Mutex::new(HashMap::new()),
            devices: Mutex::new(HashMap::new()),
            roots: Mutex::new(roots),
            external: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
        })
    }

    /// Addresses most recently pushed by the controller.
    pub fn external_addresses(&self) -> Vec<ExternalAddress> {
        self.external.lock().clone()
    }

    /// Local addresses of the currently bound UDP sockets.
    pub fn bound(&self) -> Vec<SocketAddr> {
        let mut bound: Vec<_> = self.sockets.lock().keys().copied().collect();
        bound.sort();
        bound
    }

    fn persist_roots(&self, roots: &BTreeMap<String, Root>) {
        let list: Vec<&Root> = roots.values().collect();
        match serde_json::to_vec_pretty(&list) {
            Ok(json) => callbacks::state_put(self.handle, StateObjectKind::Roots, NO_ID, Some(json)),
            Err(e) => tracing::warn!("cannot encode roots: {e}"),
        }
    }
}

fn load_or_generate_identity(handle: NodeHandle) -> Result<Identity, EngineError> {
    if let Some(bytes) = callbacks::state_get(handle, StateObjectKind::IdentitySecret, NO_ID) {
        let text = String::from_utf8_lossy(&bytes);
        match text.parse::<Identity>() {
            Ok(identity) if identity.has_private() && identity.locally_validate() => {
                return Ok(identity);
            }
            Ok(_) => tracing::warn!("stored identity is not a valid secret identity, regenerating"),
            Err(e) => tracing::warn!("cannot parse stored identity, regenerating: {e}"),
        }
    }

    let identity = Identity::generate(IdentityType::C25519)
        .map_err(|e| EngineError::Init(format!("identity generation failed: {e}")))?;
    tracing::info!(address = %identity.address(), "generated new identity");
    callbacks::state_put(
        handle,
        StateObjectKind::IdentitySecret,
        NO_ID,
        Some(identity.to_string_with(true).into_bytes()),
    );
    callbacks::state_put(
        handle,
        StateObjectKind::IdentityPublic,
        NO_ID,
        Some(identity.to_string_with(false).into_bytes()),
    );
    Ok(identity)
}

fn load_roots(handle: NodeHandle) -> BTreeMap<String, Root> {
    let Some(bytes) = callbacks::state_get(handle, StateObjectKind::Roots, NO_ID) else {
        return BTreeMap::new();
    };
    match serde_json::from_slice::<Vec<Root>>(&bytes) {
        Ok(roots) => roots.into_iter().map(|r| (r.name.clone(), r)).collect(),
        Err(e) => {
            tracing::warn!("ignoring unreadable roots: {e}");
            BTreeMap::new()
        }
    }
}

impl Engine for LocalEngine {
    fn secret_identity(&self) -> String {
        self.identity.to_string_with(true)
    }

    fn join(&self, network: NetworkId) -> Option<Arc<dyn Device>> {
        let mut devices = self.devices.lock();
        let device = devices.entry(network).or_insert_with(|| {
            let mac = Mac::for_network(self.identity.address(), network);
            let name = format!("ov{:08x}", network.as_u64() & 0xffff_ffff);
            Arc::new(LocalDevice::new(name, mac))
        });
        Some(Arc::clone(device) as Arc<dyn Device>)
    }

    fn leave(&self, network: NetworkId) {
        if let Some(device) = self.devices.lock().remove(&network) {
            device.close();
        }
        self.subscriptions.lock().retain(|(id, _)| *id != network);
        callbacks::state_put(
            self.handle,
            StateObjectKind::NetworkConfig,
            [network.as_u64(), 0],
            None,
        );
    }

    fn peers(&self) -> Vec<Peer> {
        Vec::new()
    }

    fn set_interface_addresses(&self, addresses: &[ExternalAddress]) {
        *self.external.lock() = addresses.to_vec();
    }

    fn start_listen(&self, ip: IpAddr, port: u16) -> bool {
        let addr = SocketAddr::new(ip, port);
        let mut sockets = self.sockets.lock();
        if sockets.contains_key(&addr) {
            return true;
        }
        match UdpSocket::bind(addr) {
            Ok(socket) => {
                if let Err(e) = socket.set_nonblocking(true) {
                    tracing::warn!(%addr, "cannot make socket non-blocking: {e}");
                }
                sockets.insert(addr, socket);
                true
            }
            Err(e) => {
                tracing::debug!(%addr, "bind failed: {e}");
                false
            }
        }
    }

    fn stop_listen(&self, ip: IpAddr, port: u16) {
        self.sockets.lock().remove(&SocketAddr::new(ip, port));
    }

    fn multicast_subscribe(&self, network: NetworkId, group: MulticastGroup) {
        let mut subs = self.subscriptions.lock();
        if !subs.contains(&(network, group)) {
            subs.push((network, group));
        }
    }

    fn multicast_unsubscribe(&self, network: NetworkId, group: MulticastGroup) {
        self.subscriptions
            .lock()
            .retain(|entry| *entry != (network, group));
    }

    fn roots(&self) -> Vec<Root> {
        self.roots.lock().values().cloned().collect()
    }

    fn set_root(&self, root: Root) -> Result<(), EngineError> {
        if root.name.is_empty() {
            return Err(EngineError::Rejected("root name is empty".into()));
        }
        if !root.identity().locally_validate() {
            return Err(EngineError::Rejected(format!(
                "root {} has an invalid identity",
                root.name
            )));
        }
        let mut roots = self.roots.lock();
        roots.insert(root.name.clone(), root);
        self.persist_roots(&roots);
        Ok(())
    }

    fn remove_root(&self, name: &str) -> bool {
        let mut roots = self.roots.lock();
        let removed = roots.remove(name).is_some();
        if removed {
            self.persist_roots(&roots);
        }
        removed
    }

    fn shutdown(&self) {
        self.sockets.lock().clear();
        for (_, device) in self.devices.lock().drain() {
            device.close();
        }
        callbacks::event(self.handle, EngineEvent::Down);
    }
}
