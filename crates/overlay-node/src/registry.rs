//! The set of joined networks, indexed by id and by MAC.
//!
//! Both maps live in one struct behind the node's registry lock, so every
//! mutation updates them together and a MAC entry never outlives its
//! network.

use std::collections::HashMap;
use std::sync::Arc;

use overlay_core::{Mac, NetworkId};

use crate::network::Network;

#[derive(Default)]
pub struct Registry {
    by_id: HashMap<NetworkId, Arc<Network>>,
    by_mac: HashMap<Mac, NetworkId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: NetworkId) -> Option<Arc<Network>> {
        self.by_id.get(&id).cloned()
    }

    pub fn by_mac(&self, mac: Mac) -> Option<Arc<Network>> {
        self.by_mac.get(&mac).and_then(|id| self.get(*id))
    }

    pub fn contains_mac(&self, mac: Mac) -> bool {
        self.by_mac.contains_key(&mac)
    }

    /// Every MAC belonging to a joined network.
    pub fn macs(&self) -> Vec<Mac> {
        self.by_mac.keys().copied().collect()
    }

    /// Snapshot sorted by network id.
    pub fn networks(&self) -> Vec<Arc<Network>> {
        let mut all: Vec<_> = self.by_id.values().cloned().collect();
        all.sort_by_key(|nw| nw.id());
        all
    }

    /// Insert a network, indexing its config MAC and its device MAC.
    /// Returns the existing network instead if the id is already present.
    pub fn insert(&mut self, network: Arc<Network>) -> Arc<Network> {
        let id = network.id();
        if let Some(existing) = self.by_id.get(&id) {
            return Arc::clone(existing);
        }
        self.by_mac.insert(network.config().mac, id);
        self.by_mac.insert(network.device().mac(), id);
        self.by_id.insert(id, Arc::clone(&network));
        network
    }

    /// Remove a network and every MAC pointing at it.
    pub fn remove(&mut self, id: NetworkId) -> Option<Arc<Network>> {
        let removed = self.by_id.remove(&id)?;
        self.by_mac.retain(|_, owner| *owner != id);
        Some(removed)
    }

    /// Move the config-MAC entry of `id` after its config changed.
    pub fn reindex_mac(&mut self, id: NetworkId, old: Mac, new: Mac) {
        let Some(network) = self.by_id.get(&id) else {
            return;
        };
        if old == new {
            return;
        }
        if old != network.device().mac() && self.by_mac.get(&old) == Some(&id) {
            self.by_mac.remove(&old);
        }
        self.by_mac.insert(new, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::LocalDevice;
    use overlay_core::{NetworkConfig, NetworkLocalSettings};

    fn network(id: u64, mac: u64) -> Arc<Network> {
        let device = Arc::new(LocalDevice::new(format!("ov{id}"), Mac::new(mac)));
        Arc::new(Network::new(
            NetworkId::new(id),
            device,
            NetworkLocalSettings::default(),
        ))
    }

    #[test]
    fn test_insert_indexes_mac() {
        let mut reg = Registry::new();
        reg.insert(network(1, 0x10));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.by_mac(Mac::new(0x10)).unwrap().id(), NetworkId::new(1));
        assert!(reg.by_mac(Mac::new(0x11)).is_none());
    }

    #[test]
    fn test_insert_duplicate_returns_existing() {
        let mut reg = Registry::new();
        let first = reg.insert(network(1, 0x10));
        let second = reg.insert(network(1, 0x20));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(reg.len(), 1);
        assert!(!reg.contains_mac(Mac::new(0x20)));
    }

    #[test]
    fn test_remove_drops_mac_entries() {
        let mut reg = Registry::new();
        reg.insert(network(1, 0x10));
        reg.insert(network(2, 0x20));
        assert!(reg.remove(NetworkId::new(1)).is_some());
        assert!(!reg.contains_mac(Mac::new(0x10)));
        assert!(reg.contains_mac(Mac::new(0x20)));
        assert!(reg.remove(NetworkId::new(1)).is_none());
    }

    #[test]
    fn test_reindex_after_config_mac_change() {
        let mut reg = Registry::new();
        let nw = reg.insert(network(1, 0x10));
        let update = NetworkConfig {
            mac: Mac::new(0x99),
            netconf_revision: 1,
            ..nw.config()
        };
        nw.update_config(update);
        reg.reindex_mac(nw.id(), Mac::new(0x10), Mac::new(0x99));
        assert!(reg.contains_mac(Mac::new(0x99)));
        // device MAC stays indexed
        assert!(reg.contains_mac(Mac::new(0x10)));

        reg.remove(nw.id());
        assert!(reg.macs().is_empty());
    }

    #[test]
    fn test_networks_sorted() {
        let mut reg = Registry::new();
        reg.insert(network(9, 1));
        reg.insert(network(3, 2));
        reg.insert(network(5, 3));
        let ids: Vec<u64> = reg.networks().iter().map(|n| n.id().as_u64()).collect();
        assert_eq!(ids, vec![3, 5, 9]);
    }
}
