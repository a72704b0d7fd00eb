//! The boundary between the controller and the protocol engine.
//!
//! The controller calls the engine through [`Engine`]. The engine calls back
//! through the free functions in [`callbacks`], naming the node by the
//! opaque [`NodeHandle`] it was created with.

pub mod callbacks;
mod handles;
pub mod local;

use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use overlay_core::{ExternalAddress, MulticastGroup, NetworkId, Peer, Root};

use crate::device::Device;

pub use handles::NodeHandle;
pub(crate) use handles::{allocate, deregister, register, resolve};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine initialization failed: {0}")]
    Init(String),
    #[error("rejected by engine: {0}")]
    Rejected(String),
}

pub trait Engine: Send + Sync {
    /// The node identity in full secret text form.
    fn secret_identity(&self) -> String;
    /// Create the network device for `network`, or `None` on failure.
    fn join(&self, network: NetworkId) -> Option<Arc<dyn Device>>;
    fn leave(&self, network: NetworkId);
    /// Live peers with every known path, alive or not.
    fn peers(&self) -> Vec<Peer>;
    fn set_interface_addresses(&self, addresses: &[ExternalAddress]);
    fn start_listen(&self, ip: IpAddr, port: u16) -> bool;
    fn stop_listen(&self, ip: IpAddr, port: u16);
    fn multicast_subscribe(&self, network: NetworkId, group: MulticastGroup);
    fn multicast_unsubscribe(&self, network: NetworkId, group: MulticastGroup);
    fn roots(&self) -> Vec<Root>;
    fn set_root(&self, root: Root) -> Result<(), EngineError>;
    /// Returns false if no root had that name.
    fn remove_root(&self, name: &str) -> bool;
    /// Release the engine. No calls follow.
    fn shutdown(&self);
}

pub trait EngineFactory: Send + Sync {
    /// Called once per node, after `handle` is registered, so the engine may
    /// use the state callbacks during construction.
    fn create(&self, handle: NodeHandle, base_path: &Path) -> Result<Arc<dyn Engine>, EngineError>;
}
