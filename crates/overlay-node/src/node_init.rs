//! Port acquisition at node startup.
//!
//! The decision logic is pure over an availability predicate so it can be
//! tested without binding sockets; [`port_available`] is the real predicate.

use std::net::{Ipv4Addr, SocketAddrV4, TcpListener, UdpSocket};

use crate::config::Settings;

/// Ports probed before giving up, starting at the configured one.
pub const PORT_SEARCH_ATTEMPTS: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("primary port {0} is in use and port search is disabled")]
    Unavailable(u16),
    #[error("no free port in {PORT_SEARCH_ATTEMPTS} attempts starting at {0}")]
    Exhausted(u16),
}

/// The ports the node will run with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPlan {
    pub primary: u16,
    /// Zero when disabled or exhausted.
    pub secondary: u16,
    /// Zero when disabled or exhausted.
    pub tertiary: u16,
}

impl PortPlan {
    pub fn ports(&self) -> [u16; 3] {
        [self.primary, self.secondary, self.tertiary]
    }

    /// Whether the plan differs from what `settings` asked for.
    pub fn differs_from(&self, settings: &Settings) -> bool {
        self.ports() != settings.ports()
    }
}

/// Probe consecutive ports from `start`, wrapping at 65536 and skipping 0.
pub fn search_port(start: u16, mut available: impl FnMut(u16) -> bool) -> Option<u16> {
    let mut port = start;
    for _ in 0..PORT_SEARCH_ATTEMPTS {
        if port != 0 && available(port) {
            return Some(port);
        }
        port = port.wrapping_add(1);
    }
    None
}

/// Decide the primary, secondary and tertiary ports.
///
/// The primary port is searched only when `port_search` is set, and failure
/// is fatal. Secondary and tertiary ports are searched the same way when
/// non-zero; without `port_search` they are kept only if free. Either way
/// they fall back to zero rather than failing. A port already chosen for an
/// earlier slot is never reused.
pub fn plan_ports(
    settings: &Settings,
    mut available: impl FnMut(u16) -> bool,
) -> Result<PortPlan, PortError> {
    let start = settings.primary_port;
    let primary = if settings.port_search {
        search_port(start, &mut available).ok_or(PortError::Exhausted(start))?
    } else if start != 0 && available(start) {
        start
    } else {
        return Err(PortError::Unavailable(start));
    };

    let search = settings.port_search;
    let mut pick = |start: u16, taken: &[u16]| -> u16 {
        let mut free = |p: u16| !taken.contains(&p) && available(p);
        if start == 0 {
            0
        } else if search {
            search_port(start, free).unwrap_or(0)
        } else if free(start) {
            start
        } else {
            0
        }
    };
    let secondary = pick(settings.secondary_port, &[primary]);
    let tertiary = pick(settings.tertiary_port, &[primary, secondary]);

    Ok(PortPlan {
        primary,
        secondary,
        tertiary,
    })
}

/// Whether both UDP and TCP can bind `port` on all IPv4 interfaces. The
/// probe sockets are closed before returning.
pub fn port_available(port: u16) -> bool {
    let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
    UdpSocket::bind(addr).is_ok() && TcpListener::bind(addr).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn settings(primary: u16, secondary: u16, tertiary: u16, search: bool) -> Settings {
        Settings {
            primary_port: primary,
            secondary_port: secondary,
            tertiary_port: tertiary,
            port_search: search,
            ..Settings::with_rng(&mut StdRng::seed_from_u64(0))
        }
    }

    // -- search_port ----------------------------------------------------------

    #[test]
    fn search_returns_start_when_free() {
        assert_eq!(search_port(9993, |_| true), Some(9993));
    }

    #[test]
    fn search_skips_busy_ports() {
        assert_eq!(search_port(9993, |p| p >= 9996), Some(9996));
    }

    #[test]
    fn search_wraps_and_skips_zero() {
        let mut probed = Vec::new();
        let found = search_port(65534, |p| {
            probed.push(p);
            p == 1
        });
        assert_eq!(found, Some(1));
        assert_eq!(probed, vec![65534, 65535, 1]);
    }

    #[test]
    fn search_gives_up_after_limit() {
        let mut count = 0;
        assert_eq!(
            search_port(1000, |_| {
                count += 1;
                false
            }),
            None
        );
        assert_eq!(count, PORT_SEARCH_ATTEMPTS);
    }

    // -- plan_ports -----------------------------------------------------------

    #[test]
    fn plan_keeps_free_ports() {
        let s = settings(9993, 20000, 40000, true);
        let plan = plan_ports(&s, |_| true).unwrap();
        assert_eq!(plan.ports(), [9993, 20000, 40000]);
        assert!(!plan.differs_from(&s));
    }

    #[test]
    fn plan_moves_busy_primary_when_searching() {
        let s = settings(9993, 0, 0, true);
        let plan = plan_ports(&s, |p| p != 9993).unwrap();
        assert_eq!(plan.primary, 9994);
        assert!(plan.differs_from(&s));
    }

    #[test]
    fn plan_fails_busy_primary_without_search() {
        let s = settings(9993, 0, 0, false);
        assert_eq!(
            plan_ports(&s, |p| p != 9993),
            Err(PortError::Unavailable(9993))
        );
    }

    #[test]
    fn plan_fails_when_primary_exhausted() {
        let s = settings(9993, 0, 0, true);
        assert_eq!(plan_ports(&s, |_| false), Err(PortError::Exhausted(9993)));
    }

    #[test]
    fn plan_disables_exhausted_secondary() {
        let s = settings(9993, 20000, 40000, true);
        let plan = plan_ports(&s, |p| p == 9993 || p >= 40000).unwrap();
        assert_eq!(plan.ports(), [9993, 0, 40000]);
    }

    #[test]
    fn plan_without_search_keeps_or_drops_secondary_ports() {
        let s = settings(9993, 20000, 40000, false);
        let plan = plan_ports(&s, |p| p != 20000).unwrap();
        assert_eq!(plan.ports(), [9993, 0, 40000]);

        let s = settings(9993, 9993, 40000, false);
        let plan = plan_ports(&s, |_| true).unwrap();
        assert_eq!(plan.ports(), [9993, 0, 40000]);
    }

    #[test]
    fn plan_searches_busy_secondary_ports() {
        let s = settings(9993, 20000, 40000, true);
        let plan = plan_ports(&s, |p| p != 20000 && p != 40000).unwrap();
        assert_eq!(plan.ports(), [9993, 20001, 40001]);
    }

    #[test]
    fn plan_never_reuses_primary() {
        let s = settings(9993, 9993, 0, true);
        let plan = plan_ports(&s, |_| true).unwrap();
        assert_eq!(plan.primary, 9993);
        assert_eq!(plan.secondary, 9994);
    }

    #[test]
    fn plan_leaves_disabled_ports_disabled() {
        let s = settings(9993, 0, 0, true);
        assert_eq!(plan_ports(&s, |_| true).unwrap().ports(), [9993, 0, 0]);
    }

    // -- port_available -------------------------------------------------------

    #[test]
    fn bound_port_is_unavailable() {
        let held = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).unwrap();
        let port = held.local_addr().unwrap().port();
        assert!(!port_available(port));
    }
}
