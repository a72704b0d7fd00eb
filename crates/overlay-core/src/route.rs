use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::inet::InetNet;

/// A managed route pushed by a network's controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub target: InetNet,
    /// Gateway; absent means the target is on-link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via: Option<IpAddr>,
    #[serde(default)]
    pub flags: u16,
    #[serde(default)]
    pub metric: u16,
}

/// Composite route identity used for deduplication.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey {
    pub target: IpAddr,
    pub bits: u8,
    pub via: Option<IpAddr>,
    pub flags_metric: u64,
}

impl Route {
    pub fn key(&self) -> RouteKey {
        RouteKey {
            target: self.target.ip(),
            bits: self.target.bits(),
            via: self.via,
            flags_metric: (u64::from(self.flags) << 32) | u64::from(self.metric),
        }
    }
}
