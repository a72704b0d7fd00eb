use serde::{Deserialize, Serialize};

use crate::types::Mac;

/// An Ethernet multicast group: a MAC plus 32 bits of additional
/// distinguishing information (used, for example, to scope ARP broadcasts
/// to a single IPv4 address).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MulticastGroup {
    pub mac: Mac,
    pub adi: u32,
}

impl MulticastGroup {
    pub const fn new(mac: Mac, adi: u32) -> Self {
        Self { mac, adi }
    }

    /// Packed `(mac << 32) | adi`, ordered the same way as the struct.
    pub fn key(&self) -> u128 {
        (u128::from(self.mac.as_u64()) << 32) | u128::from(self.adi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_is_mac_then_adi() {
        let a = MulticastGroup::new(Mac::new(1), 900);
        let b = MulticastGroup::new(Mac::new(2), 0);
        let c = MulticastGroup::new(Mac::new(2), 1);
        assert!(a < b);
        assert!(b < c);
        assert!(a.key() < b.key());
        assert!(b.key() < c.key());
    }

    #[test]
    fn test_key_packs_both_fields() {
        let g = MulticastGroup::new(Mac::BROADCAST, 0x0a000001);
        assert_eq!(g.key(), (0xffff_ffff_ffffu128 << 32) | 0x0a000001);
    }
}
