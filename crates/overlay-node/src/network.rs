//! A joined virtual network.
//!
//! Config arrives from the engine asynchronously and out of order; only an
//! update carrying a strictly newer revision replaces the held config. The
//! comparison and the replacement happen under one write lock, so readers see
//! either the old config or the new one.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use overlay_core::{InetNet, MulticastGroup, NetworkConfig, NetworkId, NetworkLocalSettings, NetworkStatus};

use crate::device::Device;

pub struct Network {
    id: NetworkId,
    config: RwLock<NetworkConfig>,
    settings: RwLock<NetworkLocalSettings>,
    multicast_subscriptions: Mutex<BTreeMap<u128, MulticastGroup>>,
    device: Arc<dyn Device>,
}

impl Network {
    pub fn new(id: NetworkId, device: Arc<dyn Device>, settings: NetworkLocalSettings) -> Self {
        let config = NetworkConfig::initial(id, device.mac());
        Self {
            id,
            config: RwLock::new(config),
            settings: RwLock::new(settings),
            multicast_subscriptions: Mutex::new(BTreeMap::new()),
            device,
        }
    }

    pub fn id(&self) -> NetworkId {
        self.id
    }

    pub fn config(&self) -> NetworkConfig {
        self.config.read().clone()
    }

    pub fn local_settings(&self) -> NetworkLocalSettings {
        *self.settings.read()
    }

    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    /// Replace the config if `update` is strictly newer. Returns whether it
    /// was applied.
    pub fn update_config(&self, update: NetworkConfig) -> bool {
        let mut config = self.config.write();
        if update.netconf_revision <= config.netconf_revision {
            tracing::debug!(
                network = %self.id,
                held = config.netconf_revision,
                offered = update.netconf_revision,
                "dropping stale network config"
            );
            return false;
        }
        *config = update;
        self.sync_device(&config, &self.settings.read());
        true
    }

    pub fn set_local_settings(&self, settings: NetworkLocalSettings) {
        *self.settings.write() = settings;
        self.sync_device(&self.config.read(), &settings);
    }

    /// Returns false if already subscribed.
    pub fn multicast_subscribe(&self, group: MulticastGroup) -> bool {
        self.multicast_subscriptions
            .lock()
            .insert(group.key(), group)
            .is_none()
    }

    /// Returns false if not subscribed.
    pub fn multicast_unsubscribe(&self, group: &MulticastGroup) -> bool {
        self.multicast_subscriptions
            .lock()
            .remove(&group.key())
            .is_some()
    }

    /// Subscriptions in (MAC, ADI) order.
    pub fn multicast_subscriptions(&self) -> Vec<MulticastGroup> {
        self.multicast_subscriptions
            .lock()
            .values()
            .copied()
            .collect()
    }

    /// Called after the network has left the registry, before the engine
    /// is told to leave.
    pub(crate) fn leaving(&self) {
        self.device.close();
    }

    fn sync_device(&self, config: &NetworkConfig, settings: &NetworkLocalSettings) {
        self.device.set_mtu(config.mtu);
        self.device
            .set_enabled(config.status == NetworkStatus::Ok || config.netconf_revision == 0);

        let wanted: Vec<InetNet> = config
            .assigned_addresses
            .iter()
            .copied()
            .filter(|net| address_allowed(net.ip(), settings))
            .collect();
        for held in self.device.ips() {
            if !wanted.contains(&held) {
                self.device.remove_ip(held);
            }
        }
        for net in wanted {
            self.device.add_ip(net);
        }
    }
}

fn address_allowed(ip: IpAddr, settings: &NetworkLocalSettings) -> bool {
    if is_global(ip) {
        settings.allow_global_ips
    } else {
        settings.allow_managed_ips
    }
}

/// Publicly routable, as opposed to private, loopback or link-local space.
fn is_global(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xc0) == 64))
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            !(v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::LocalDevice;
    use overlay_core::Mac;

    fn network() -> (Arc<LocalDevice>, Network) {
        let device = Arc::new(LocalDevice::new("ov0", Mac::new(0x32aabbccddee)));
        let nw = Network::new(
            NetworkId::new(0xabc),
            device.clone(),
            NetworkLocalSettings::default(),
        );
        (device, nw)
    }

    fn config(revision: u64, addrs: &[&str]) -> NetworkConfig {
        NetworkConfig {
            name: format!("rev{revision}"),
            status: NetworkStatus::Ok,
            mtu: 1400 + revision as u32,
            netconf_revision: revision,
            assigned_addresses: addrs.iter().map(|a| a.parse().unwrap()).collect(),
            ..NetworkConfig::initial(NetworkId::new(0xabc), Mac::new(0x32aabbccddee))
        }
    }

    #[test]
    fn test_initial_config_uses_device_mac() {
        let (_, nw) = network();
        assert_eq!(nw.config().mac, Mac::new(0x32aabbccddee));
        assert_eq!(nw.config().netconf_revision, 0);
    }

    #[test]
    fn test_newer_revision_applies() {
        let (device, nw) = network();
        assert!(nw.update_config(config(3, &["10.1.0.5/16"])));
        let held = nw.config();
        assert_eq!(held.netconf_revision, 3);
        assert_eq!(held.name, "rev3");
        assert_eq!(device.mtu(), 1403);
        assert_eq!(device.ips(), vec!["10.1.0.5/16".parse().unwrap()]);
    }

    #[test]
    fn test_stale_and_duplicate_revisions_dropped() {
        let (_, nw) = network();
        assert!(nw.update_config(config(5, &[])));
        assert!(!nw.update_config(config(5, &["10.0.0.1/8"])));
        assert!(!nw.update_config(config(2, &[])));
        assert_eq!(nw.config(), config(5, &[]));
    }

    #[test]
    fn test_revision_zero_never_applies() {
        let (_, nw) = network();
        assert!(!nw.update_config(config(0, &[])));
    }

    #[test]
    fn test_global_addresses_need_permission() {
        let (device, nw) = network();
        nw.update_config(config(1, &["10.0.0.2/24", "203.0.113.7/24"]));
        assert_eq!(device.ips(), vec!["10.0.0.2/24".parse().unwrap()]);

        nw.set_local_settings(NetworkLocalSettings {
            allow_global_ips: true,
            ..NetworkLocalSettings::default()
        });
        assert_eq!(device.ips().len(), 2);

        nw.set_local_settings(NetworkLocalSettings {
            allow_managed_ips: false,
            allow_global_ips: true,
            ..NetworkLocalSettings::default()
        });
        assert_eq!(device.ips(), vec!["203.0.113.7/24".parse().unwrap()]);
    }

    #[test]
    fn test_removed_addresses_leave_device() {
        let (device, nw) = network();
        nw.update_config(config(1, &["10.0.0.2/24"]));
        nw.update_config(config(2, &["10.0.0.3/24"]));
        assert_eq!(device.ips(), vec!["10.0.0.3/24".parse().unwrap()]);
    }

    #[test]
    fn test_multicast_subscriptions() {
        let (_, nw) = network();
        let a = MulticastGroup::new(Mac::BROADCAST, 0x0a000001);
        let b = MulticastGroup::new(Mac::new(0x01005e000001), 0);
        assert!(nw.multicast_subscribe(a));
        assert!(!nw.multicast_subscribe(a));
        assert!(nw.multicast_subscribe(b));
        assert_eq!(nw.multicast_subscriptions(), vec![b, a]);
        assert!(nw.multicast_unsubscribe(&a));
        assert!(!nw.multicast_unsubscribe(&a));
    }

    #[test]
    fn test_leaving_closes_device() {
        let (device, nw) = network();
        nw.leaving();
        assert!(device.is_closed());
    }

    #[test]
    fn test_is_global() {
        assert!(!is_global("10.0.0.1".parse().unwrap()));
        assert!(!is_global("100.64.0.1".parse().unwrap()));
        assert!(is_global("8.8.8.8".parse().unwrap()));
        assert!(!is_global("fd00::1".parse().unwrap()));
        assert!(is_global("2001:db8::1".parse().unwrap()));
    }
}
