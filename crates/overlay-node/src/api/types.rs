//! Control API request and response bodies.

use std::net::IpAddr;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use overlay_core::{
    Address, Identity, InetAddress, MulticastGroup, NetworkConfig, NetworkId,
    NetworkLocalSettings,
};

use crate::config::LocalConfig;
use crate::network::Network;
use crate::node::{Node, now_millis};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStatus {
    pub address: Address,
    pub clock: i64,
    pub startup_time: i64,
    pub config: LocalConfig,
    pub online: bool,
    pub peer_count: usize,
    pub path_count: usize,
    pub identity: Identity,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interface_addresses: Vec<IpAddr>,
    /// Public addresses obtained through router port mapping.
    #[serde(default)]
    pub mapped_external_addresses: Vec<InetAddress>,
    pub version: String,
    pub version_major: u32,
    pub version_minor: u32,
    pub version_revision: u32,
    pub version_build: u32,
    pub os: String,
    pub architecture: String,
    pub cpus: usize,
    pub runtime_version: String,
}

impl ApiStatus {
    pub fn from_node(node: &Node) -> Self {
        let peers = node.peers();
        let path_count = peers.iter().map(|p| p.paths.len()).sum();
        Self {
            address: node.address(),
            clock: now_millis(),
            startup_time: node.startup_time(),
            config: node.local_config(),
            online: node.online(),
            peer_count: peers.len(),
            path_count,
            identity: node.identity().public_only(),
            interface_addresses: node.interface_addresses(),
            // no port mapper runs in this node
            mapped_external_addresses: Vec::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            version_major: version_part(env!("CARGO_PKG_VERSION_MAJOR")),
            version_minor: version_part(env!("CARGO_PKG_VERSION_MINOR")),
            version_revision: version_part(env!("CARGO_PKG_VERSION_PATCH")),
            version_build: 0,
            os: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            cpus: std::thread::available_parallelism().map_or(1, |n| n.get()),
            runtime_version: format!("rust {}", env!("CARGO_PKG_RUST_VERSION")),
        }
    }
}

fn version_part(text: &str) -> u32 {
    text.parse().unwrap_or(0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNetwork {
    pub id: NetworkId,
    pub config: NetworkConfig,
    pub settings: NetworkLocalSettings,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub multicast_subscriptions: Vec<MulticastGroup>,
    pub port_type: String,
    pub port_name: String,
    pub port_enabled: bool,
    pub port_error_code: i32,
    pub port_error: String,
}

impl From<&Network> for ApiNetwork {
    fn from(network: &Network) -> Self {
        let device = network.device();
        let (port_error_code, port_error) = device.error().unwrap_or_default();
        Self {
            id: network.id(),
            config: network.config(),
            settings: network.local_settings(),
            multicast_subscriptions: network.multicast_subscriptions(),
            port_type: device.kind().to_string(),
            port_name: device.name(),
            port_enabled: device.enabled(),
            port_error_code,
            port_error,
        }
    }
}

/// Body of POST/PUT `/network/<id>`. Every field is optional; the path
/// names the network.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<NetworkId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<NetworkLocalSettings>,
}

/// Error body, `{"error": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
}

/// A handler failure carrying its status code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}
