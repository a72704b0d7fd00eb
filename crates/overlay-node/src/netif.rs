//! Physical interface enumeration.
//!
//! Wraps `getifaddrs` and folds its one-entry-per-address output into one
//! record per interface, with the hardware address when the OS reports one.

use std::collections::BTreeMap;
use std::net::IpAddr;

use overlay_core::Mac;

use crate::maintenance_ops::InterfaceInfo;

/// Enumerate interfaces with their IP addresses, sorted by name.
pub fn enumerate_interfaces() -> std::io::Result<Vec<InterfaceInfo>> {
    let addrs = nix::ifaddrs::getifaddrs().map_err(std::io::Error::other)?;

    let mut by_name: BTreeMap<String, InterfaceInfo> = BTreeMap::new();
    for ifaddr in addrs {
        let entry = by_name
            .entry(ifaddr.interface_name.clone())
            .or_insert_with(|| InterfaceInfo {
                name: ifaddr.interface_name.clone(),
                mac: None,
                addresses: Vec::new(),
            });

        let Some(addr) = ifaddr.address else {
            continue;
        };
        if let Some(sin) = addr.as_sockaddr_in() {
            entry.addresses.push(IpAddr::V4(sin.ip()));
        } else if let Some(sin6) = addr.as_sockaddr_in6() {
            entry.addresses.push(IpAddr::V6(sin6.ip()));
        } else if let Some(mac) = link_address(&addr) {
            entry.mac = Some(mac);
        }
    }

    Ok(by_name.into_values().collect())
}

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "freebsd"
))]
fn link_address(addr: &nix::sys::socket::SockaddrStorage) -> Option<Mac> {
    addr.as_link_addr()
        .and_then(|link| link.addr())
        .map(Mac::from_bytes)
        .filter(|mac| mac.as_u64() != 0)
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "freebsd"
)))]
fn link_address(_addr: &nix::sys::socket::SockaddrStorage) -> Option<Mac> {
    None
}
