//! Node-wide local configuration, persisted as `local.conf` (indented JSON).
//!
//! A missing file is replaced by generated defaults. Missing fields inside an
//! existing file take their defaults, so older files keep loading.

use std::collections::BTreeMap;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use overlay_core::{Address, InetAddress, InetNet, NetworkId, NetworkLocalSettings};

use crate::storage::atomic_write;

pub const LOCAL_CONFIG_FILE: &str = "local.conf";
pub const DEFAULT_PRIMARY_PORT: u16 = 9993;
pub const DEFAULT_LOG_SIZE_MAX: i64 = 128;

const CONFIG_MODE: u32 = 0o644;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read or write config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Policy for a physical network prefix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhysicalPathConfiguration {
    /// Never use paths whose address falls inside this prefix.
    pub blacklist: bool,
    /// Non-zero marks the prefix as a trusted path with this id.
    pub trusted_path_id: u64,
}

/// Hints for reaching a specific peer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualPathConfiguration {
    #[serde(rename = "try")]
    pub try_addresses: Vec<InetAddress>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub primary_port: u16,
    /// Zero disables the port.
    pub secondary_port: u16,
    /// Zero disables the port.
    pub tertiary_port: u16,
    pub port_search: bool,
    pub port_mapping: bool,
    /// KiB. Zero means unbounded, negative disables the log file.
    pub log_size_max: i64,
    pub multipath_mode: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_tcp_bind_address: Option<InetAddress>,
    pub interface_prefix_blacklist: Vec<String>,
    pub explicit_addresses: Vec<InetAddress>,
}

impl Settings {
    /// Defaults, with secondary and tertiary ports drawn from `rng`.
    pub fn with_rng(rng: &mut impl Rng) -> Self {
        Self {
            primary_port: DEFAULT_PRIMARY_PORT,
            secondary_port: 16384 + rng.gen_range(0..16384),
            tertiary_port: 32768 + rng.gen_range(0..16384),
            port_search: true,
            port_mapping: true,
            log_size_max: DEFAULT_LOG_SIZE_MAX,
            multipath_mode: 0,
            api_tcp_bind_address: None,
            interface_prefix_blacklist: default_interface_blacklist(),
            explicit_addresses: Vec::new(),
        }
    }

    /// The three UDP ports in order; zero entries are disabled.
    pub fn ports(&self) -> [u16; 3] {
        [self.primary_port, self.secondary_port, self.tertiary_port]
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_rng(&mut rand::thread_rng())
    }
}

fn default_interface_blacklist() -> Vec<String> {
    if cfg!(windows) {
        vec!["loopback".to_string()]
    } else {
        vec!["lo".to_string()]
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    pub physical: BTreeMap<InetNet, PhysicalPathConfiguration>,
    #[serde(rename = "virtual")]
    pub virtual_paths: BTreeMap<Address, VirtualPathConfiguration>,
    pub network: BTreeMap<NetworkId, NetworkLocalSettings>,
    pub settings: Settings,
}

impl LocalConfig {
    pub fn with_rng(rng: &mut impl Rng) -> Self {
        Self {
            physical: BTreeMap::new(),
            virtual_paths: BTreeMap::new(),
            network: BTreeMap::new(),
            settings: Settings::with_rng(rng),
        }
    }

    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load `path`, or generate defaults and write them if it is absent.
    pub fn load_or_create(path: &Path, rng: &mut impl Rng) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::with_rng(rng);
                config.save(path)?;
                tracing::info!(path = %path.display(), "wrote default local configuration");
                Ok(config)
            }
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let mut json = serde_json::to_vec_pretty(self)?;
        json.push(b'\n');
        atomic_write(path, &json, CONFIG_MODE)?;
        Ok(())
    }
}
