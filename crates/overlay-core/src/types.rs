//! Fixed-width identifiers: node addresses, network ids and MACs.

use core::fmt;
use core::str::FromStr;

use crate::error::ParseError;
use crate::serde_text::serde_as_text;

/// A 40-bit node address, shown as 10 lowercase hex digits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u64);

impl Address {
    pub const LENGTH: usize = 5;
    const MASK: u64 = 0xff_ffff_ffff;

    pub const fn new(value: u64) -> Self {
        Self(value & Self::MASK)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Reserved addresses: zero and anything in the 0xff prefix range.
    pub const fn is_reserved(self) -> bool {
        self.0 == 0 || (self.0 >> 32) == 0xff
    }

    pub fn from_bytes(bytes: &[u8; 5]) -> Self {
        Self(
            bytes
                .iter()
                .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)),
        )
    }

    pub fn to_bytes(self) -> [u8; 5] {
        let b = self.0.to_be_bytes();
        [b[3], b[4], b[5], b[6], b[7]]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:010x}", self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.len() > 10 {
            return Err(ParseError::Address(s.to_owned()));
        }
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| ParseError::Address(s.to_owned()))
    }
}

serde_as_text!(Address);

/// A 64-bit virtual network identifier, shown as 16 lowercase hex digits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NetworkId(u64);

impl NetworkId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetworkId({self})")
    }
}

impl FromStr for NetworkId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.len() > 16 {
            return Err(ParseError::NetworkId(s.to_owned()));
        }
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| ParseError::NetworkId(s.to_owned()))
    }
}

serde_as_text!(NetworkId);

/// A 48-bit Ethernet MAC address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Mac(u64);

impl Mac {
    const MASK: u64 = 0xffff_ffff_ffff;

    pub const BROADCAST: Mac = Mac(Self::MASK);

    pub const fn new(value: u64) -> Self {
        Self(value & Self::MASK)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub fn from_bytes(bytes: [u8; 6]) -> Self {
        Self(
            bytes
                .iter()
                .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)),
        )
    }

    pub fn to_bytes(self) -> [u8; 6] {
        let b = self.0.to_be_bytes();
        [b[2], b[3], b[4], b[5], b[6], b[7]]
    }

    /// Device MAC for a node on a network, as a locally administered
    /// unicast address derived from the node address and network id.
    pub fn for_network(address: Address, network: NetworkId) -> Self {
        let mut first = (network.as_u64() & 0xfe) as u8 | 0x02;
        if first == 0x52 {
            first = 0x32;
        }
        let mut m = u64::from(first) << 40;
        m |= address.as_u64();
        m ^= ((network.as_u64() >> 8) & 0xff) << 32;
        m ^= ((network.as_u64() >> 16) & 0xff) << 24;
        m ^= ((network.as_u64() >> 24) & 0xff) << 16;
        m ^= ((network.as_u64() >> 32) & 0xff) << 8;
        m ^= (network.as_u64() >> 40) & 0xff;
        Self::new(m)
    }
}

impl fmt::Display for Mac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.to_bytes();
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl fmt::Debug for Mac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mac({self})")
    }
}

impl FromStr for Mac {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseError::Mac(s.to_owned());
        let mut bytes = [0u8; 6];
        let mut parts = s.trim().split(':');
        for slot in bytes.iter_mut() {
            let part = parts.next().ok_or_else(err)?;
            if part.is_empty() || part.len() > 2 {
                return Err(err());
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| err())?;
        }
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(Self::from_bytes(bytes))
    }
}

serde_as_text!(Mac);
