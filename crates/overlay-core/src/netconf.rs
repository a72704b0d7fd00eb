//! Per-network configuration as delivered by the protocol engine, plus the
//! node-local overrides applied on top of it.

use serde::{Deserialize, Serialize};

use crate::inet::InetNet;
use crate::route::Route;
use crate::types::{Mac, NetworkId};

pub const DEFAULT_MTU: u32 = 2800;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkStatus {
    #[default]
    RequestingConfiguration,
    Ok,
    AccessDenied,
    NotFound,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkType {
    #[default]
    Private,
    Public,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub id: NetworkId,
    pub mac: Mac,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: NetworkStatus,
    #[serde(default, rename = "type")]
    pub network_type: NetworkType,
    pub mtu: u32,
    #[serde(default)]
    pub bridge: bool,
    #[serde(default)]
    pub broadcast_enabled: bool,
    #[serde(default)]
    pub netconf_revision: u64,
    #[serde(default)]
    pub assigned_addresses: Vec<InetNet>,
    #[serde(default)]
    pub routes: Vec<Route>,
}

impl NetworkConfig {
    /// Placeholder held between join and the first config from the engine.
    pub fn initial(id: NetworkId, mac: Mac) -> Self {
        Self {
            id,
            mac,
            name: String::new(),
            status: NetworkStatus::RequestingConfiguration,
            network_type: NetworkType::Private,
            mtu: DEFAULT_MTU,
            bridge: false,
            broadcast_enabled: false,
            netconf_revision: 0,
            assigned_addresses: Vec::new(),
            routes: Vec::new(),
        }
    }
}

/// Local policy for what a network's controller may configure on this host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkLocalSettings {
    #[serde(rename = "allowManagedIPs")]
    pub allow_managed_ips: bool,
    #[serde(rename = "allowGlobalIPs")]
    pub allow_global_ips: bool,
    #[serde(rename = "allowManagedRoutes")]
    pub allow_managed_routes: bool,
    #[serde(rename = "allowGlobalRoutes")]
    pub allow_global_routes: bool,
    #[serde(rename = "allowDefaultRouteOverride")]
    pub allow_default_route_override: bool,
}

impl Default for NetworkLocalSettings {
    fn default() -> Self {
        Self {
            allow_managed_ips: true,
            allow_global_ips: false,
            allow_managed_routes: true,
            allow_global_routes: false,
            allow_default_route_override: false,
        }
    }
}
