//! Control plane for an overlay network node.
//!
//! The [`Node`] controller owns a protocol engine reached through the
//! [`engine`] boundary, the set of joined networks, the local configuration
//! and the persisted state objects, and serves them over the control [`api`].

pub mod api;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod events;
pub mod logging;
mod maintenance;
pub mod maintenance_ops;
pub mod netif;
pub mod network;
pub mod node;
pub mod node_init;
pub mod path_policy;
pub mod registry;
pub mod service_log;
pub mod shutdown;
pub mod storage;
pub mod testing;

pub use config::{LocalConfig, Settings};
pub use device::{Device, LocalDevice};
pub use engine::local::LocalEngineFactory;
pub use engine::{Engine, EngineError, EngineFactory, NodeHandle};
pub use error::NodeError;
pub use events::{ConfigOperation, EngineEvent, UserMessage, UserMessageHandler};
pub use network::Network;
pub use node::{Node, NodeOptions};
pub use service_log::ServiceLog;
pub use storage::{StateObjectKind, StateStore};
