//! Engine-to-controller callbacks.
//!
//! These run on engine threads. Cheap answers are computed inline; anything
//! that touches the disk or the registry is handed to the runtime so the
//! engine never waits on controller work. A handle with no live node gets a
//! neutral answer: reject the path, no hint, no data, no effect.

use std::sync::Arc;

use overlay_core::{Address, Identity, InetAddress, NetworkConfig, NetworkId};

use crate::engine::{NodeHandle, resolve};
use crate::events::{self, ConfigOperation, EngineEvent};
use crate::path_policy;
use crate::storage::StateObjectKind;

/// May the engine use `address` to reach `peer`?
pub fn path_check(handle: NodeHandle, peer: Address, address: InetAddress) -> bool {
    let Some(node) = resolve(handle) else {
        return false;
    };
    let admissible = path_policy::path_admissible(&node.local_config.read(), address.ip());
    if !admissible {
        tracing::debug!(%peer, %address, "path rejected by physical policy");
    }
    admissible
}

/// A configured physical address to try for `identity`, if any.
pub fn path_lookup(handle: NodeHandle, identity: &Identity) -> Option<InetAddress> {
    let node = resolve(handle)?;
    let config = node.local_config.read();
    let mut rng = node.rng.lock();
    path_policy::path_hint(&config, identity.address(), &mut *rng)
}

pub fn state_get(handle: NodeHandle, kind: StateObjectKind, id: [u64; 2]) -> Option<Vec<u8>> {
    let node = resolve(handle)?;
    match node.state.get(kind, id) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!(?kind, "state object read failed: {e}");
            None
        }
    }
}

/// Store an object; `None` deletes it. Returns before the write happens.
pub fn state_put(handle: NodeHandle, kind: StateObjectKind, id: [u64; 2], data: Option<Vec<u8>>) {
    let Some(node) = resolve(handle) else {
        return;
    };
    let store = node.state.clone();
    node.runtime.spawn_blocking(move || {
        if let Err(e) = store.put(kind, id, data.as_deref()) {
            tracing::warn!(?kind, "state object write failed: {e}");
        }
    });
}

/// Deliver a network config. Applied later, guarded by revision.
pub fn network_config(
    handle: NodeHandle,
    network: NetworkId,
    op: ConfigOperation,
    config: NetworkConfig,
) {
    let Some(node) = resolve(handle) else {
        return;
    };
    let target = Arc::clone(&node);
    node.runtime.spawn(async move {
        events::apply_network_config(&target, network, op, config);
    });
}

pub fn event(handle: NodeHandle, event: EngineEvent) {
    if let Some(node) = resolve(handle) {
        events::dispatch(&node, event);
    }
}
