use serde::{Deserialize, Serialize};

use crate::inet::InetAddress;
use crate::types::Address;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeerRole {
    Leaf,
    Moon,
    Root,
}

/// One physical path to a peer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Path {
    pub address: InetAddress,
    pub last_send: i64,
    pub last_receive: i64,
    pub trusted_path_id: u64,
    pub alive: bool,
}

/// Snapshot of a peer as reported by the engine. Never cached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    pub address: Address,
    pub version: [i32; 3],
    pub latency: i32,
    pub role: PeerRole,
    pub paths: Vec<Path>,
    /// Wall-clock milliseconds at which this snapshot was taken.
    pub clock: i64,
}
