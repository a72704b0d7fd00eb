//! The node controller.
//!
//! A [`Node`] owns the engine, the identity, and the background tasks (the
//! control API listeners and the maintenance loop). The state the engine's
//! callbacks need lives in [`NodeShared`], which is registered in the handle
//! table for exactly as long as the node is running.

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, RwLock};
use rand::SeedableRng;
use rand::rngs::StdRng;

use overlay_core::{
    Address, Identity, MulticastGroup, NetworkId, NetworkLocalSettings, Peer, Root,
};

use crate::api;
use crate::config::{LOCAL_CONFIG_FILE, LocalConfig};
use crate::device::Device;
use crate::engine::{self, Engine, EngineFactory, NodeHandle};
use crate::error::NodeError;
use crate::events::UserMessageHandler;
use crate::maintenance;
use crate::network::Network;
use crate::node_init;
use crate::registry::Registry;
use crate::service_log::{SERVICE_LOG_FILE, ServiceLog};
use crate::shutdown::ShutdownToken;
use crate::storage::{self, StateStore};

const BASE_DIR_MODE: u32 = 0o755;

/// State reachable from engine callbacks through the handle table.
///
/// Three independent locks: the registry (id map and MAC index together),
/// the local config, and the observed interface addresses. None of them is
/// held across a call into the engine.
pub(crate) struct NodeShared {
    pub(crate) handle: NodeHandle,
    pub(crate) base_path: PathBuf,
    pub(crate) registry: RwLock<Registry>,
    pub(crate) local_config: RwLock<LocalConfig>,
    pub(crate) interface_addresses: RwLock<BTreeSet<IpAddr>>,
    pub(crate) state: StateStore,
    pub(crate) online: AtomicBool,
    pub(crate) service_log: ServiceLog,
    pub(crate) rng: Mutex<StdRng>,
    pub(crate) runtime: tokio::runtime::Handle,
    pub(crate) user_messages: Option<Arc<dyn UserMessageHandler>>,
}

impl NodeShared {
    /// An unregistered node over `dir` with default config. Must be called
    /// inside a runtime.
    #[cfg(test)]
    pub(crate) fn for_tests(dir: &Path) -> Self {
        let mut rng = StdRng::seed_from_u64(7);
        Self {
            handle: engine::allocate(),
            base_path: dir.to_path_buf(),
            registry: RwLock::new(Registry::new()),
            local_config: RwLock::new(LocalConfig::with_rng(&mut rng)),
            interface_addresses: RwLock::new(BTreeSet::new()),
            state: StateStore::new(dir),
            online: AtomicBool::new(false),
            service_log: ServiceLog::new(),
            rng: Mutex::new(rng),
            runtime: tokio::runtime::Handle::current(),
            user_messages: None,
        }
    }
}

/// Everything [`Node::new`] needs.
pub struct NodeOptions {
    pub base_path: PathBuf,
    pub engine: Arc<dyn EngineFactory>,
    /// The log sink the tracing subscriber writes through. The node opens
    /// or disables it according to `logSizeMax`.
    pub service_log: ServiceLog,
    /// Seeds port defaults and path hint selection.
    pub rng_seed: Option<u64>,
    pub user_messages: Option<Arc<dyn UserMessageHandler>>,
}

impl NodeOptions {
    pub fn new(base_path: impl Into<PathBuf>, engine: Arc<dyn EngineFactory>) -> Self {
        Self {
            base_path: base_path.into(),
            engine,
            service_log: ServiceLog::new(),
            rng_seed: None,
            user_messages: None,
        }
    }
}

pub struct Node {
    shared: Arc<NodeShared>,
    engine: Arc<dyn Engine>,
    identity: Identity,
    startup_time: i64,
    ports: [u16; 3],
    api_token: String,
    running: AtomicBool,
    api_tasks: ShutdownToken,
    maintenance: ShutdownToken,
}

impl Node {
    /// Bring a node up in `options.base_path`.
    ///
    /// On failure everything acquired so far is released: the engine is shut
    /// down and the handle deregistered before the error is returned.
    pub async fn new(options: NodeOptions) -> Result<Arc<Node>, NodeError> {
        let NodeOptions {
            base_path,
            engine: factory,
            service_log,
            rng_seed,
            user_messages,
        } = options;

        storage::create_dir(&base_path, BASE_DIR_MODE).map_err(|e| {
            NodeError::NodeInitFailed(format!("cannot create {}: {e}", base_path.display()))
        })?;

        let mut rng = match rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let config_path = base_path.join(LOCAL_CONFIG_FILE);
        let mut config = LocalConfig::load_or_create(&config_path, &mut rng)?;
        apply_log_limit(&service_log, &base_path, config.settings.log_size_max);

        let plan = node_init::plan_ports(&config.settings, node_init::port_available)?;
        if plan.differs_from(&config.settings) {
            tracing::info!(
                primary = plan.primary,
                secondary = plan.secondary,
                tertiary = plan.tertiary,
                "ports changed during search, saving"
            );
            config.settings.primary_port = plan.primary;
            config.settings.secondary_port = plan.secondary;
            config.settings.tertiary_port = plan.tertiary;
            config.save(&config_path)?;
        }

        let handle = engine::allocate();
        let shared = Arc::new(NodeShared {
            handle,
            base_path: base_path.clone(),
            registry: RwLock::new(Registry::new()),
            local_config: RwLock::new(config),
            interface_addresses: RwLock::new(BTreeSet::new()),
            state: StateStore::new(&base_path),
            online: AtomicBool::new(false),
            service_log,
            rng: Mutex::new(rng),
            runtime: tokio::runtime::Handle::current(),
            user_messages,
        });
        engine::register(Arc::clone(&shared));

        let engine = match factory.create(handle, &base_path) {
            Ok(engine) => engine,
            Err(e) => {
                engine::deregister(handle);
                return Err(NodeError::NodeInitFailed(e.to_string()));
            }
        };

        let prepared = load_identity(engine.as_ref())
            .and_then(|identity| Ok((identity, api::auth::load_or_create_token(&base_path)?)));
        let (identity, api_token) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                engine.shutdown();
                engine::deregister(handle);
                return Err(e);
            }
        };

        let node = Arc::new(Node {
            shared,
            engine,
            identity,
            startup_time: now_millis(),
            ports: plan.ports(),
            api_token,
            running: AtomicBool::new(true),
            api_tasks: ShutdownToken::new(),
            maintenance: ShutdownToken::new(),
        });

        if let Err(e) = api::start(&node).await {
            node.close().await;
            return Err(e);
        }

        let task = maintenance::spawn(
            Arc::clone(&node.shared),
            Arc::clone(&node.engine),
            node.ports,
            node.maintenance.subscribe(),
        );
        node.maintenance.add_task(task).await;

        tracing::info!(
            address = %node.address(),
            base_path = %base_path.display(),
            ports = ?node.ports,
            "node started"
        );
        Ok(node)
    }

    /// Stop the API listeners and the maintenance loop, then release the
    /// engine. Returns once no background task can touch node state. Later
    /// calls do nothing.
    pub async fn close(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        tracing::info!(address = %self.address(), "shutting down node");

        self.api_tasks.stop_and_join().await;
        self.maintenance.stop_and_join().await;

        let networks: Vec<Arc<Network>> = {
            let mut registry = self.shared.registry.write();
            let networks = registry.networks();
            for network in &networks {
                registry.remove(network.id());
            }
            networks
        };
        for network in networks {
            network.leaving();
        }

        self.engine.shutdown();
        engine::deregister(self.shared.handle);
        tracing::info!("node shutdown complete");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn address(&self) -> Address {
        self.identity.address()
    }

    /// The node identity, including its private key.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn online(&self) -> bool {
        self.shared.online.load(Ordering::SeqCst)
    }

    /// Milliseconds since the Unix epoch at which the node started.
    pub fn startup_time(&self) -> i64 {
        self.startup_time
    }

    pub fn handle(&self) -> NodeHandle {
        self.shared.handle
    }

    pub fn base_path(&self) -> &Path {
        &self.shared.base_path
    }

    /// The UDP ports bound at startup. Zero means disabled.
    pub fn ports(&self) -> [u16; 3] {
        self.ports
    }

    pub fn api_token(&self) -> &str {
        &self.api_token
    }

    pub fn local_config(&self) -> LocalConfig {
        self.shared.local_config.read().clone()
    }

    /// Install a new local config and persist it.
    ///
    /// Per-network settings are pushed to joined networks and the log limit
    /// takes effect immediately. Port changes do not: the return value says
    /// whether a restart is needed to bind the new ports.
    pub fn set_local_config(&self, config: LocalConfig) -> Result<bool, NodeError> {
        let registry = self.shared.registry.read();
        let mut held = self.shared.local_config.write();

        for (id, settings) in &config.network {
            if let Some(network) = registry.get(*id) {
                network.set_local_settings(*settings);
            }
        }

        let restart_required = config.settings.ports() != self.ports;
        apply_log_limit(
            &self.shared.service_log,
            &self.shared.base_path,
            config.settings.log_size_max,
        );
        config.save(&self.shared.base_path.join(LOCAL_CONFIG_FILE))?;
        *held = config;

        if restart_required {
            tracing::info!("port settings changed, restart required to rebind");
        }
        Ok(restart_required)
    }

    /// Join a network, or merge `settings` into it if already joined.
    ///
    /// Without explicit settings a new network takes its entry from the
    /// local config, or defaults. Only the engine's own device is
    /// supported; passing `device` is an error.
    pub fn join(
        &self,
        id: NetworkId,
        settings: Option<NetworkLocalSettings>,
        device: Option<Arc<dyn Device>>,
    ) -> Result<Arc<Network>, NodeError> {
        let existing = self.shared.registry.read().get(id);
        if let Some(network) = existing {
            tracing::info!(network = %id, "join ignored: already a member");
            if let Some(settings) = settings {
                network.set_local_settings(settings);
            }
            return Ok(network);
        }

        if device.is_some() {
            return Err(NodeError::UnsupportedDevice);
        }

        let settings = settings
            .or_else(|| self.shared.local_config.read().network.get(&id).copied())
            .unwrap_or_default();

        let Some(device) = self.engine.join(id) else {
            tracing::warn!(network = %id, "join failed: network device did not initialize");
            return Err(NodeError::TapInitFailed);
        };

        let network = Arc::new(Network::new(id, device, settings));
        let network = self.shared.registry.write().insert(network);
        network.set_local_settings(settings);
        tracing::info!(network = %id, device = %network.device().name(), "joined network");
        Ok(network)
    }

    /// Leave a network. The network is out of the registry before its device
    /// is torn down. Returns the network if it was joined.
    pub fn leave(&self, id: NetworkId) -> Option<Arc<Network>> {
        tracing::info!(network = %id, "leaving network");
        let removed = self.shared.registry.write().remove(id);
        if let Some(network) = &removed {
            network.leaving();
        }
        self.engine.leave(id);
        removed
    }

    pub fn get_network(&self, id: NetworkId) -> Option<Arc<Network>> {
        self.shared.registry.read().get(id)
    }

    /// Joined networks sorted by id.
    pub fn networks(&self) -> Vec<Arc<Network>> {
        self.shared.registry.read().networks()
    }

    /// Peers from the engine with only their live paths, sorted by address.
    pub fn peers(&self) -> Vec<Peer> {
        let clock = now_millis();
        let mut peers = self.engine.peers();
        for peer in &mut peers {
            peer.paths.retain(|path| path.alive);
            peer.clock = clock;
        }
        peers.sort_by_key(|peer| peer.address);
        peers
    }

    /// Last observed physical interface addresses, sorted.
    pub fn interface_addresses(&self) -> Vec<IpAddr> {
        self.shared.interface_addresses.read().iter().copied().collect()
    }

    /// Returns false if the network was already subscribed to `group`.
    pub fn multicast_subscribe(
        &self,
        id: NetworkId,
        group: MulticastGroup,
    ) -> Result<bool, NodeError> {
        let network = self.network_or_not_found(id)?;
        let added = network.multicast_subscribe(group);
        if added {
            self.engine.multicast_subscribe(id, group);
        }
        Ok(added)
    }

    /// Returns false if the network was not subscribed to `group`.
    pub fn multicast_unsubscribe(
        &self,
        id: NetworkId,
        group: MulticastGroup,
    ) -> Result<bool, NodeError> {
        let network = self.network_or_not_found(id)?;
        let removed = network.multicast_unsubscribe(&group);
        if removed {
            self.engine.multicast_unsubscribe(id, group);
        }
        Ok(removed)
    }

    /// Roots sorted by name.
    pub fn roots(&self) -> Vec<Root> {
        let mut roots = self.engine.roots();
        roots.sort_by(|a, b| a.name.cmp(&b.name));
        roots
    }

    pub fn set_root(&self, root: Root) -> Result<(), NodeError> {
        tracing::info!(name = %root.name, identity = %root.identity().address(), "setting root");
        self.engine.set_root(root)?;
        Ok(())
    }

    /// Returns false if no root had that name.
    pub fn remove_root(&self, name: &str) -> bool {
        self.engine.remove_root(name)
    }

    pub(crate) async fn add_api_task(&self, task: tokio::task::JoinHandle<()>) {
        self.api_tasks.add_task(task).await;
    }

    pub(crate) fn api_stop_signal(&self) -> tokio::sync::watch::Receiver<bool> {
        self.api_tasks.subscribe()
    }

    fn network_or_not_found(&self, id: NetworkId) -> Result<Arc<Network>, NodeError> {
        self.get_network(id)
            .ok_or_else(|| NodeError::NotFound(format!("network {id}")))
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        if self.running.swap(false, Ordering::SeqCst) {
            tracing::warn!("node dropped without close");
            self.api_tasks.signal_stop();
            self.maintenance.signal_stop();
            self.engine.shutdown();
            engine::deregister(self.shared.handle);
        }
    }
}

/// The engine's identity must parse, carry a private key, and pass local
/// validation.
fn load_identity(engine: &dyn Engine) -> Result<Identity, NodeError> {
    let identity: Identity = engine.secret_identity().parse()?;
    if !identity.has_private() {
        return Err(NodeError::NodeInitFailed(
            "engine identity has no private key".into(),
        ));
    }
    if !identity.locally_validate() {
        return Err(NodeError::NodeInitFailed(format!(
            "engine identity {} failed validation",
            identity.address()
        )));
    }
    Ok(identity)
}

/// `logSizeMax < 0` disables the service log; otherwise it is opened in
/// the base directory if not already.
fn apply_log_limit(log: &ServiceLog, base_path: &Path, log_size_max: i64) {
    if log_size_max < 0 {
        log.disable();
        return;
    }
    if log.is_enabled() {
        return;
    }
    let path = base_path.join(SERVICE_LOG_FILE);
    if let Err(e) = log.open(&path) {
        tracing::warn!(path = %path.display(), "cannot open service log: {e}");
        log.disable();
    }
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64)
}
