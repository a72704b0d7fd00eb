//! Process-wide table from engine handles to live nodes.
//!
//! An entry is added when a node registers during construction and removed
//! when it closes or its construction unwinds. Engine callbacks that arrive
//! for a handle with no entry are ignored.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::node::NodeShared;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(u64);

impl NodeHandle {
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Whether a node currently owns this handle.
    pub fn is_registered(self) -> bool {
        NODES.read().contains_key(&self)
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeHandle({})", self.0)
    }
}

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

static NODES: LazyLock<RwLock<HashMap<NodeHandle, Arc<NodeShared>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

pub(crate) fn allocate() -> NodeHandle {
    NodeHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
}

pub(crate) fn register(node: Arc<NodeShared>) {
    NODES.write().insert(node.handle, node);
}

/// Returns whether an entry was removed.
pub(crate) fn deregister(handle: NodeHandle) -> bool {
    NODES.write().remove(&handle).is_some()
}

pub(crate) fn resolve(handle: NodeHandle) -> Option<Arc<NodeShared>> {
    NODES.read().get(&handle).cloned()
}
