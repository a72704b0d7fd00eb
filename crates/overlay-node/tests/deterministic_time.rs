//! Maintenance timing under a paused clock.
//!
//! The maintenance task polls every second but only reconciles addresses
//! every 30 seconds, so config changes in between are coalesced into the
//! next reconcile pass.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use overlay_node::testing::{EngineCall, ScriptedEngine, ScriptedEngineFactory};
use overlay_node::{Node, NodeOptions};

fn pushes(engine: &ScriptedEngine) -> Vec<Vec<overlay_core::ExternalAddress>> {
    engine
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            EngineCall::SetInterfaceAddresses(addresses) => Some(addresses),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn explicit_address_change_waits_for_next_reconcile() {
    let dir = TempDir::new().unwrap();
    let factory = Arc::new(ScriptedEngineFactory::new());
    let node = Node::new(NodeOptions::new(dir.path(), factory.clone()))
        .await
        .unwrap();
    let engine = factory.engine().unwrap();

    // First pass runs immediately and always pushes.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(pushes(&engine).len(), 1);

    let explicit: overlay_core::InetAddress = "203.0.113.50/4444".parse().unwrap();
    let mut config = node.local_config();
    config.settings.explicit_addresses = vec![explicit];
    node.set_local_config(config).unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(pushes(&engine).len(), 1, "reconciled before the interval elapsed");

    tokio::time::sleep(Duration::from_secs(25)).await;
    let pushes = pushes(&engine);
    assert_eq!(pushes.len(), 2);
    assert!(
        pushes[1]
            .iter()
            .any(|a| a.address == explicit && a.permanent)
    );
    node.close().await;
}

#[tokio::test(start_paused = true)]
async fn close_stops_maintenance_promptly() {
    let dir = TempDir::new().unwrap();
    let factory = Arc::new(ScriptedEngineFactory::new());
    let node = Node::new(NodeOptions::new(dir.path(), factory.clone()))
        .await
        .unwrap();
    let engine = factory.engine().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    tokio::time::timeout(Duration::from_secs(5), node.close())
        .await
        .expect("close did not finish");
    engine.clear_calls();

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(engine.calls().is_empty());
}
