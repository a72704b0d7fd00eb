//! Pure maintenance decision logic.
//!
//! The maintenance loop gathers inputs (interfaces, settings, the held
//! address set) and applies outputs (engine calls); everything in between is
//! here as stateless functions.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

use overlay_core::{ExternalAddress, InetAddress, Mac};

/// One physical interface as seen by the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub name: String,
    pub mac: Option<Mac>,
    pub addresses: Vec<IpAddr>,
}

/// Case-insensitive prefix match against the interface blacklist.
pub fn is_blacklisted(name: &str, prefixes: &[String]) -> bool {
    let name = name.to_lowercase();
    prefixes
        .iter()
        .filter(|p| !p.is_empty())
        .any(|p| name.starts_with(&p.to_lowercase()))
}

/// Not link-local unicast, not multicast, not unspecified.
pub fn is_usable_address(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => !(v4.is_link_local() || v4.is_multicast() || v4.is_unspecified()),
        IpAddr::V6(v6) => {
            !((v6.segments()[0] & 0xffc0) == 0xfe80 || v6.is_multicast() || v6.is_unspecified())
        }
    }
}

/// Usable addresses on interfaces that are neither blacklisted nor one of
/// this node's own network devices.
pub fn collect_interface_addresses(
    interfaces: &[InterfaceInfo],
    blacklist: &[String],
    own_macs: &[Mac],
) -> BTreeSet<IpAddr> {
    interfaces
        .iter()
        .filter(|iface| !is_blacklisted(&iface.name, blacklist))
        .filter(|iface| iface.mac.is_none_or(|mac| !own_macs.contains(&mac)))
        .flat_map(|iface| iface.addresses.iter().copied())
        .filter(|ip| is_usable_address(*ip))
        .collect()
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AddressDiff {
    pub added: Vec<IpAddr>,
    pub removed: Vec<IpAddr>,
}

impl AddressDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub fn diff_addresses(previous: &BTreeSet<IpAddr>, current: &BTreeSet<IpAddr>) -> AddressDiff {
    AddressDiff {
        added: current.difference(previous).copied().collect(),
        removed: previous.difference(current).copied().collect(),
    }
}

/// Enabled UDP ports, in primary/secondary/tertiary order, without repeats.
pub fn active_ports(ports: [u16; 3]) -> Vec<u16> {
    let mut out = Vec::with_capacity(3);
    for port in ports {
        if port != 0 && !out.contains(&port) {
            out.push(port);
        }
    }
    out
}

/// Interface addresses crossed with ports (ephemeral), plus explicit
/// addresses (permanent), deduplicated by key and sorted by it.
pub fn plan_external_addresses(
    addresses: &BTreeSet<IpAddr>,
    ports: &[u16],
    explicit: &[InetAddress],
) -> Vec<ExternalAddress> {
    let mut by_key = BTreeMap::new();
    for ip in addresses {
        for port in ports {
            let ext = ExternalAddress {
                address: InetAddress::new(*ip, *port),
                permanent: false,
            };
            by_key.insert(ext.key(), ext);
        }
    }
    for addr in explicit {
        let ext = ExternalAddress {
            address: *addr,
            permanent: true,
        };
        by_key.insert(ext.key(), ext);
    }
    by_key.into_values().collect()
}
