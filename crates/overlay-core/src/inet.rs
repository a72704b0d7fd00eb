//! Physical addressing: `ip/port` endpoints, `ip/bits` prefixes and
//! advertised external addresses.

use core::fmt;
use core::str::FromStr;
use std::net::{IpAddr, SocketAddr};

use crate::error::ParseError;
use crate::serde_text::serde_as_text;

/// An IP address and port, written `ip/port`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InetAddress(SocketAddr);

impl InetAddress {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self(SocketAddr::new(ip, port))
    }

    pub fn ip(&self) -> IpAddr {
        self.0.ip()
    }

    pub fn port(&self) -> u16 {
        self.0.port()
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.0
    }

    /// Family byte plus raw address plus big-endian port.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self.0.ip() {
            IpAddr::V4(v4) => {
                out.push(4);
                out.extend_from_slice(&v4.octets());
            }
            IpAddr::V6(v6) => {
                out.push(6);
                out.extend_from_slice(&v6.octets());
            }
        }
        out.extend_from_slice(&self.0.port().to_be_bytes());
    }

    /// Inverse of [`write_to`](Self::write_to); returns the address and the
    /// number of bytes consumed.
    pub fn read_from(data: &[u8]) -> Option<(Self, usize)> {
        let (ip, len) = match *data.first()? {
            4 => {
                let b: [u8; 4] = data.get(1..5)?.try_into().ok()?;
                (IpAddr::from(b), 5)
            }
            6 => {
                let b: [u8; 16] = data.get(1..17)?.try_into().ok()?;
                (IpAddr::from(b), 17)
            }
            _ => return None,
        };
        let port = u16::from_be_bytes(data.get(len..len + 2)?.try_into().ok()?);
        Some((Self::new(ip, port), len + 2))
    }
}

impl From<SocketAddr> for InetAddress {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl fmt::Display for InetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0.ip(), self.0.port())
    }
}

impl fmt::Debug for InetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InetAddress({self})")
    }
}

impl FromStr for InetAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseError::InetAddress(s.to_owned());
        let (ip, port) = s.trim().rsplit_once('/').ok_or_else(err)?;
        let ip: IpAddr = ip.parse().map_err(|_| err())?;
        let port: u16 = port.parse().map_err(|_| err())?;
        Ok(Self::new(ip, port))
    }
}

serde_as_text!(InetAddress);

/// An IP prefix, written `ip/bits`. The address part keeps host bits so an
/// assigned address and its netmask travel together.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InetNet {
    ip: IpAddr,
    bits: u8,
}

impl InetNet {
    pub fn new(ip: IpAddr, bits: u8) -> Option<Self> {
        let max = match ip {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        (bits <= max).then_some(Self { ip, bits })
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }

    /// Whether `candidate` falls inside this prefix. Addresses of a
    /// different family never match.
    pub fn contains(&self, candidate: IpAddr) -> bool {
        match (self.ip, candidate) {
            (IpAddr::V4(net), IpAddr::V4(c)) => {
                prefix_eq(&net.octets(), &c.octets(), self.bits)
            }
            (IpAddr::V6(net), IpAddr::V6(c)) => {
                prefix_eq(&net.octets(), &c.octets(), self.bits)
            }
            _ => false,
        }
    }
}

fn prefix_eq(a: &[u8], b: &[u8], bits: u8) -> bool {
    let full = usize::from(bits / 8);
    if a[..full] != b[..full] {
        return false;
    }
    let rem = bits % 8;
    if rem == 0 {
        return true;
    }
    let mask = 0xffu8 << (8 - rem);
    (a[full] & mask) == (b[full] & mask)
}

impl fmt::Display for InetNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ip, self.bits)
    }
}

impl fmt::Debug for InetNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InetNet({self})")
    }
}

impl FromStr for InetNet {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseError::InetNet(s.to_owned());
        let (ip, bits) = s.trim().split_once('/').ok_or_else(err)?;
        let ip: IpAddr = ip.parse().map_err(|_| err())?;
        let bits: u8 = bits.parse().map_err(|_| err())?;
        Self::new(ip, bits).ok_or_else(err)
    }
}

serde_as_text!(InetNet);

/// An address advertised to peers as a way to reach this node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ExternalAddress {
    pub address: InetAddress,
    /// Explicitly configured rather than discovered from an interface.
    pub permanent: bool,
}

impl ExternalAddress {
    /// Dedup key: ip, port, permanence class.
    pub fn key(&self) -> (IpAddr, u16, bool) {
        (self.address.ip(), self.address.port(), self.permanent)
    }
}
