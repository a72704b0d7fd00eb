//! Data model for the overlay network node.
//!
//! Addresses, network ids, MACs, physical endpoints, multicast groups,
//! routes, per-network configuration, peers, identities, locators and roots.
//! Nothing here performs I/O.

mod base32;
pub mod error;
pub mod identity;
pub mod inet;
pub mod locator;
pub mod multicast;
pub mod netconf;
pub mod peer;
pub mod root;
pub mod route;
mod serde_text;
pub mod types;

pub use error::{IdentityError, LocatorError, ParseError};
pub use identity::{Identity, IdentityType};
pub use inet::{ExternalAddress, InetAddress, InetNet};
pub use locator::Locator;
pub use multicast::MulticastGroup;
pub use netconf::{NetworkConfig, NetworkLocalSettings, NetworkStatus, NetworkType};
pub use peer::{Path, Peer, PeerRole};
pub use root::Root;
pub use route::Route;
pub use types::{Address, Mac, NetworkId};
