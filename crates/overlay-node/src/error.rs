//! Error types for the node controller.

use overlay_core::IdentityError;

use crate::config::ConfigError;
use crate::engine::EngineError;
use crate::storage::StorageError;

/// Errors that can occur during node construction and operation.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("node initialization failed: {0}")]
    NodeInitFailed(String),
    #[error("network device initialization failed")]
    TapInitFailed,
    #[error("no usable UDP port: {0}")]
    PortUnavailable(#[from] crate::node_init::PortError),
    #[error("invalid node identity: {0}")]
    InvalidIdentity(#[from] IdentityError),
    #[error("custom network devices are not supported")]
    UnsupportedDevice,
    #[error("{0} not found")]
    NotFound(String),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
