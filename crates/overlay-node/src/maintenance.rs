//! The maintenance loop.
//!
//! Polls once a second but reconciles at most every thirty seconds:
//! interface addresses and UDP listeners, the external address set pushed
//! to the engine, and the service log size. Every step is best-effort.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use overlay_core::InetAddress;

use crate::engine::Engine;
use crate::maintenance_ops::{self, InterfaceInfo};
use crate::netif;
use crate::node::NodeShared;
use crate::shutdown;

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const RECONCILE_INTERVAL: Duration = Duration::from_secs(30);

/// What the previous pass pushed, so unchanged state is not pushed again.
#[derive(Debug, Default)]
pub(crate) struct MaintenanceState {
    explicit_addresses: Option<Vec<InetAddress>>,
}

pub(crate) fn spawn(
    shared: Arc<NodeShared>,
    engine: Arc<dyn Engine>,
    ports: [u16; 3],
    stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(run(shared, engine, ports, stop))
}

async fn run(
    shared: Arc<NodeShared>,
    engine: Arc<dyn Engine>,
    ports: [u16; 3],
    stop: watch::Receiver<bool>,
) {
    let mut poll = tokio::time::interval(POLL_INTERVAL);
    let mut last_reconcile: Option<Instant> = None;
    let mut state = MaintenanceState::default();

    loop {
        tokio::select! {
            biased;

            _ = shutdown::stopped(stop.clone()) => {
                tracing::debug!("maintenance loop stopping");
                break;
            }

            _ = poll.tick() => {
                let now = Instant::now();
                if last_reconcile.is_some_and(|at| now.duration_since(at) < RECONCILE_INTERVAL) {
                    continue;
                }
                last_reconcile = Some(now);

                match netif::enumerate_interfaces() {
                    Ok(interfaces) => {
                        reconcile(&shared, engine.as_ref(), ports, &interfaces, &mut state);
                    }
                    Err(e) => tracing::warn!("cannot enumerate interfaces: {e}"),
                }
                trim_service_log(&shared);
            }
        }
    }
}

/// One reconciliation pass over a snapshot of the physical interfaces.
pub(crate) fn reconcile(
    shared: &NodeShared,
    engine: &dyn Engine,
    ports: [u16; 3],
    interfaces: &[InterfaceInfo],
    state: &mut MaintenanceState,
) {
    let settings = shared.local_config.read().settings.clone();
    let own_macs = shared.registry.read().macs();

    let current = maintenance_ops::collect_interface_addresses(
        interfaces,
        &settings.interface_prefix_blacklist,
        &own_macs,
    );

    let diff = {
        let mut held = shared.interface_addresses.write();
        let diff = maintenance_ops::diff_addresses(&held, &current);
        if !diff.is_empty() {
            *held = current.clone();
        }
        diff
    };

    let ports = maintenance_ops::active_ports(ports);
    for ip in &diff.added {
        for &port in &ports {
            if engine.start_listen(*ip, port) {
                tracing::debug!(%ip, port, "listening");
            } else {
                tracing::warn!(%ip, port, "cannot listen on interface address");
            }
        }
    }
    for ip in &diff.removed {
        for &port in &ports {
            engine.stop_listen(*ip, port);
            tracing::debug!(%ip, port, "stopped listening");
        }
    }

    let explicit_changed =
        state.explicit_addresses.as_ref() != Some(&settings.explicit_addresses);
    if !diff.is_empty() || explicit_changed {
        let external = maintenance_ops::plan_external_addresses(
            &current,
            &ports,
            &settings.explicit_addresses,
        );
        tracing::debug!(count = external.len(), "pushing external addresses");
        engine.set_interface_addresses(&external);
        state.explicit_addresses = Some(settings.explicit_addresses);
    }
}

/// `logSizeMax` is in KiB; zero or less means no trimming.
fn trim_service_log(shared: &NodeShared) {
    let max_kib = shared.local_config.read().settings.log_size_max;
    if max_kib <= 0 {
        return;
    }
    match shared.service_log.trim(max_kib as u64 * 1024) {
        Ok(true) => tracing::debug!("service log trimmed"),
        Ok(false) => {}
        Err(e) => tracing::warn!("cannot trim service log: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::LocalDevice;
    use crate::network::Network;
    use crate::testing::{EngineCall, ScriptedEngine};
    use overlay_core::{Identity, IdentityType, Mac, NetworkId, NetworkLocalSettings};
    use std::net::IpAddr;
    use tempfile::TempDir;

    fn engine(shared: &NodeShared) -> ScriptedEngine {
        let identity = Identity::generate(IdentityType::C25519).unwrap();
        ScriptedEngine::new(shared.handle, identity)
    }

    fn iface(name: &str, mac: u64, addrs: &[&str]) -> InterfaceInfo {
        InterfaceInfo {
            name: name.into(),
            mac: Some(Mac::new(mac)),
            addresses: addrs.iter().map(|a| a.parse().unwrap()).collect(),
        }
    }

    fn listens(calls: &[EngineCall]) -> Vec<(IpAddr, u16)> {
        calls
            .iter()
            .filter_map(|c| match c {
                EngineCall::StartListen(ip, port) => Some((*ip, *port)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_new_addresses_start_listeners() {
        let dir = TempDir::new().unwrap();
        let shared = NodeShared::for_tests(dir.path());
        let engine = engine(&shared);
        let mut state = MaintenanceState::default();

        let ifaces = vec![iface("eth0", 1, &["192.168.1.10"])];
        reconcile(&shared, &engine, [9993, 0, 40000], &ifaces, &mut state);

        let ip: IpAddr = "192.168.1.10".parse().unwrap();
        assert_eq!(listens(&engine.calls()), vec![(ip, 9993), (ip, 40000)]);
        assert!(shared.interface_addresses.read().contains(&ip));
        assert!(
            engine
                .calls()
                .iter()
                .any(|c| matches!(c, EngineCall::SetInterfaceAddresses(a) if a.len() == 2))
        );
    }

    #[tokio::test]
    async fn test_removed_addresses_stop_listeners() {
        let dir = TempDir::new().unwrap();
        let shared = NodeShared::for_tests(dir.path());
        let engine = engine(&shared);
        let mut state = MaintenanceState::default();

        reconcile(
            &shared,
            &engine,
            [9993, 0, 0],
            &[iface("eth0", 1, &["192.168.1.10", "192.168.1.11"])],
            &mut state,
        );
        engine.clear_calls();
        reconcile(
            &shared,
            &engine,
            [9993, 0, 0],
            &[iface("eth0", 1, &["192.168.1.11"])],
            &mut state,
        );

        let calls = engine.calls();
        assert!(calls.contains(&EngineCall::StopListen("192.168.1.10".parse().unwrap(), 9993)));
        assert!(listens(&calls).is_empty());
    }

    #[tokio::test]
    async fn test_unchanged_state_pushes_nothing() {
        let dir = TempDir::new().unwrap();
        let shared = NodeShared::for_tests(dir.path());
        let engine = engine(&shared);
        let mut state = MaintenanceState::default();
        let ifaces = vec![iface("eth0", 1, &["192.168.1.10"])];

        reconcile(&shared, &engine, [9993, 0, 0], &ifaces, &mut state);
        engine.clear_calls();
        reconcile(&shared, &engine, [9993, 0, 0], &ifaces, &mut state);
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_explicit_address_change_is_pushed() {
        let dir = TempDir::new().unwrap();
        let shared = NodeShared::for_tests(dir.path());
        let engine = engine(&shared);
        let mut state = MaintenanceState::default();
        let ifaces = vec![iface("eth0", 1, &["192.168.1.10"])];

        reconcile(&shared, &engine, [9993, 0, 0], &ifaces, &mut state);
        engine.clear_calls();
        shared
            .local_config
            .write()
            .settings
            .explicit_addresses
            .push("203.0.113.9/9993".parse().unwrap());
        reconcile(&shared, &engine, [9993, 0, 0], &ifaces, &mut state);

        let pushed = engine.calls().into_iter().find_map(|c| match c {
            EngineCall::SetInterfaceAddresses(a) => Some(a),
            _ => None,
        });
        let pushed = pushed.expect("external addresses pushed");
        assert_eq!(pushed.iter().filter(|a| a.permanent).count(), 1);
    }

    #[tokio::test]
    async fn test_own_network_devices_and_blacklist_skipped() {
        let dir = TempDir::new().unwrap();
        let shared = NodeShared::for_tests(dir.path());
        let engine = engine(&shared);
        let mut state = MaintenanceState::default();

        let device = Arc::new(LocalDevice::new("ov01", Mac::new(0x32aa)));
        shared.registry.write().insert(Arc::new(Network::new(
            NetworkId::new(1),
            device,
            NetworkLocalSettings::default(),
        )));

        let ifaces = vec![
            iface("lo", 0, &["127.0.0.1"]),
            iface("ov01", 0x32aa, &["10.147.17.5"]),
            iface("eth0", 1, &["192.168.1.10"]),
        ];
        reconcile(&shared, &engine, [9993, 0, 0], &ifaces, &mut state);

        let ip: IpAddr = "192.168.1.10".parse().unwrap();
        assert_eq!(listens(&engine.calls()), vec![(ip, 9993)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_exits_on_stop() {
        let dir = TempDir::new().unwrap();
        let shared = Arc::new(NodeShared::for_tests(dir.path()));
        let engine = Arc::new(engine(&shared));
        let (tx, rx) = watch::channel(false);

        let task = spawn(Arc::clone(&shared), engine.clone(), [9993, 0, 0], rx);
        tokio::time::sleep(Duration::from_secs(5)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("loop exits promptly")
            .unwrap();
    }
}
