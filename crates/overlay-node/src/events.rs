//! Applying engine notifications to controller state.

use std::sync::atomic::Ordering;

use overlay_core::{Address, NetworkConfig, NetworkId};

use crate::node::NodeShared;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigOperation {
    Up,
    ConfigUpdate,
    Down,
    Destroy,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserMessage {
    pub source: Address,
    pub type_id: u64,
    pub payload: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    Up,
    Offline,
    Online,
    Down,
    Trace(String),
    UserMessage(UserMessage),
}

/// Receives user messages from peers. Nodes have none unless one is passed
/// in [`NodeOptions`](crate::NodeOptions).
pub trait UserMessageHandler: Send + Sync {
    fn on_user_message(&self, message: &UserMessage);
}

/// Flag changes and logging only; never blocks.
pub(crate) fn dispatch(node: &NodeShared, event: EngineEvent) {
    match event {
        EngineEvent::Online => {
            node.online.store(true, Ordering::SeqCst);
            tracing::info!("node is online");
        }
        EngineEvent::Offline => {
            node.online.store(false, Ordering::SeqCst);
            tracing::info!("node is offline");
        }
        EngineEvent::Up | EngineEvent::Down => {
            tracing::debug!(?event, "engine lifecycle event");
        }
        EngineEvent::Trace(message) => {
            tracing::info!(target: "overlay_node::trace", "TRACE: {message}");
        }
        EngineEvent::UserMessage(message) => match &node.user_messages {
            Some(handler) => handler.on_user_message(&message),
            None => tracing::debug!(source = %message.source, type_id = message.type_id, "ignoring user message"),
        },
    }
}

/// Apply a config update to a joined network. Only UP and CONFIG_UPDATE
/// carry configs; stale revisions and unknown networks are dropped.
/// Returns whether the network's config changed.
pub(crate) fn apply_network_config(
    node: &NodeShared,
    id: NetworkId,
    op: ConfigOperation,
    config: NetworkConfig,
) -> bool {
    if !matches!(op, ConfigOperation::Up | ConfigOperation::ConfigUpdate) {
        tracing::debug!(network = %id, ?op, "network config operation ignored");
        return false;
    }
    if config.id != id {
        tracing::warn!(network = %id, payload = %config.id, "network config for the wrong network");
        return false;
    }

    let mut registry = node.registry.write();
    let Some(network) = registry.get(id) else {
        tracing::debug!(network = %id, "config for a network that is not joined");
        return false;
    };
    let old_mac = network.config().mac;
    let revision = config.netconf_revision;
    let new_mac = config.mac;
    if !network.update_config(config) {
        return false;
    }
    registry.reindex_mac(id, old_mac, new_mac);
    tracing::debug!(network = %id, revision, "network config applied");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::LocalDevice;
    use crate::network::Network;
    use overlay_core::{Mac, NetworkLocalSettings, NetworkStatus};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn joined(node: &NodeShared, id: u64) -> Arc<Network> {
        let device = Arc::new(LocalDevice::new("ov", Mac::new(0x32_0000_0000 | id)));
        let nw = Arc::new(Network::new(
            NetworkId::new(id),
            device,
            NetworkLocalSettings::default(),
        ));
        node.registry.write().insert(nw)
    }

    fn update(nw: &Network, revision: u64) -> NetworkConfig {
        NetworkConfig {
            status: NetworkStatus::Ok,
            netconf_revision: revision,
            name: format!("r{revision}"),
            ..nw.config()
        }
    }

    #[tokio::test]
    async fn test_online_offline_flag() {
        let dir = TempDir::new().unwrap();
        let node = NodeShared::for_tests(dir.path());
        dispatch(&node, EngineEvent::Online);
        assert!(node.online.load(Ordering::SeqCst));
        dispatch(&node, EngineEvent::Offline);
        assert!(!node.online.load(Ordering::SeqCst));
        dispatch(&node, EngineEvent::Trace("hello".into()));
    }

    #[tokio::test]
    async fn test_config_applies_only_when_newer() {
        let dir = TempDir::new().unwrap();
        let node = NodeShared::for_tests(dir.path());
        let nw = joined(&node, 7);
        let id = NetworkId::new(7);

        assert!(apply_network_config(&node, id, ConfigOperation::Up, update(&nw, 2)));
        assert!(!apply_network_config(&node, id, ConfigOperation::ConfigUpdate, update(&nw, 2)));
        assert!(!apply_network_config(&node, id, ConfigOperation::ConfigUpdate, update(&nw, 1)));
        assert_eq!(nw.config().netconf_revision, 2);
        assert!(apply_network_config(&node, id, ConfigOperation::ConfigUpdate, update(&nw, 3)));
        assert_eq!(nw.config().name, "r3");
    }

    #[tokio::test]
    async fn test_down_and_destroy_ignored() {
        let dir = TempDir::new().unwrap();
        let node = NodeShared::for_tests(dir.path());
        let nw = joined(&node, 7);
        let id = NetworkId::new(7);
        assert!(!apply_network_config(&node, id, ConfigOperation::Down, update(&nw, 9)));
        assert!(!apply_network_config(&node, id, ConfigOperation::Destroy, update(&nw, 9)));
        assert_eq!(nw.config().netconf_revision, 0);
    }

    #[tokio::test]
    async fn test_unknown_or_mismatched_network_ignored() {
        let dir = TempDir::new().unwrap();
        let node = NodeShared::for_tests(dir.path());
        let nw = joined(&node, 7);
        assert!(!apply_network_config(
            &node,
            NetworkId::new(8),
            ConfigOperation::Up,
            update(&nw, 1)
        ));
        let mut wrong = update(&nw, 1);
        wrong.id = NetworkId::new(8);
        assert!(!apply_network_config(&node, NetworkId::new(7), ConfigOperation::Up, wrong));
    }

    #[tokio::test]
    async fn test_mac_change_reindexes() {
        let dir = TempDir::new().unwrap();
        let node = NodeShared::for_tests(dir.path());
        let nw = joined(&node, 7);
        let mut cfg = update(&nw, 1);
        cfg.mac = Mac::new(0x3212_3456_789a);
        assert!(apply_network_config(&node, NetworkId::new(7), ConfigOperation::Up, cfg));
        assert!(node.registry.read().contains_mac(Mac::new(0x3212_3456_789a)));
    }

    struct Recorder(Mutex<Vec<UserMessage>>);

    impl UserMessageHandler for Recorder {
        fn on_user_message(&self, message: &UserMessage) {
            self.0.lock().push(message.clone());
        }
    }

    #[tokio::test]
    async fn test_user_message_reaches_handler() {
        let dir = TempDir::new().unwrap();
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let mut node = NodeShared::for_tests(dir.path());
        node.user_messages = Some(recorder.clone());
        let msg = UserMessage {
            source: Address::new(0x1234567890),
            type_id: 42,
            payload: b"hi".to_vec(),
        };
        dispatch(&node, EngineEvent::UserMessage(msg.clone()));
        assert_eq!(recorder.0.lock().as_slice(), &[msg]);
    }
}
