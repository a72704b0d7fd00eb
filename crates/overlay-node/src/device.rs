//! Virtual network device abstraction.
//!
//! The engine creates a device when a network is joined; the controller only
//! drives it through [`Device`]. [`LocalDevice`] is an in-process device that
//! records its state, used by the standalone engine and in tests.

use std::collections::BTreeSet;

use parking_lot::Mutex;

use overlay_core::{InetNet, Mac};

pub trait Device: Send + Sync {
    /// Device type, such as `"local"` or a platform driver name.
    fn kind(&self) -> &str;
    fn name(&self) -> String;
    fn mac(&self) -> Mac;
    fn enabled(&self) -> bool;
    fn set_enabled(&self, enabled: bool);
    fn set_mtu(&self, mtu: u32);
    fn mtu(&self) -> u32;
    fn ips(&self) -> Vec<InetNet>;
    /// Returns false if the address was already present.
    fn add_ip(&self, ip: InetNet) -> bool;
    /// Returns false if the address was not present.
    fn remove_ip(&self, ip: InetNet) -> bool;
    /// Last device error as (code, message), if any.
    fn error(&self) -> Option<(i32, String)>;
    /// Release the device. Called once, on leave.
    fn close(&self);
}

#[derive(Debug)]
struct LocalDeviceState {
    enabled: bool,
    mtu: u32,
    ips: BTreeSet<InetNet>,
    closed: bool,
}

#[derive(Debug)]
pub struct LocalDevice {
    name: String,
    mac: Mac,
    state: Mutex<LocalDeviceState>,
}

impl LocalDevice {
    pub fn new(name: impl Into<String>, mac: Mac) -> Self {
        Self {
            name: name.into(),
            mac,
            state: Mutex::new(LocalDeviceState {
                enabled: true,
                mtu: overlay_core::netconf::DEFAULT_MTU,
                ips: BTreeSet::new(),
                closed: false,
            }),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl Device for LocalDevice {
    fn kind(&self) -> &str {
        "local"
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn mac(&self) -> Mac {
        self.mac
    }

    fn enabled(&self) -> bool {
        self.state.lock().enabled
    }

    fn set_enabled(&self, enabled: bool) {
        self.state.lock().enabled = enabled;
    }

    fn set_mtu(&self, mtu: u32) {
        self.state.lock().mtu = mtu;
    }

    fn mtu(&self) -> u32 {
        self.state.lock().mtu
    }

    fn ips(&self) -> Vec<InetNet> {
        self.state.lock().ips.iter().copied().collect()
    }

    fn add_ip(&self, ip: InetNet) -> bool {
        self.state.lock().ips.insert(ip)
    }

    fn remove_ip(&self, ip: InetNet) -> bool {
        self.state.lock().ips.remove(&ip)
    }

    fn error(&self) -> Option<(i32, String)> {
        None
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.enabled = false;
        state.ips.clear();
        state.closed = true;
    }
}
