//! Answers to the engine's two recurring path questions, computed from the
//! local configuration.

use std::net::IpAddr;

use rand::Rng;
use rand::seq::SliceRandom;

use overlay_core::{Address, InetAddress};

use crate::config::LocalConfig;

/// Whether a physical address may be used to talk to a peer. Any
/// blacklisted prefix containing `ip` rejects it.
pub fn path_admissible(config: &LocalConfig, ip: IpAddr) -> bool {
    !config
        .physical
        .iter()
        .any(|(net, policy)| policy.blacklist && net.contains(ip))
}

/// One configured hint for `address`, chosen uniformly at random.
pub fn path_hint(config: &LocalConfig, address: Address, rng: &mut impl Rng) -> Option<InetAddress> {
    config
        .virtual_paths
        .get(&address)
        .and_then(|v| v.try_addresses.choose(rng))
        .copied()
}
