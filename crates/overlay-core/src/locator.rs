//! Signed reachability descriptors.
//!
//! The serialized byte form is authoritative. Structured fields are decoded
//! from it, and re-encoding a decoded locator reproduces the same bytes.
//!
//! Layout:
//! ```text
//! version(1)=0 | timestamp(u64 BE) | identity | signer count(1)=0
//! | physical count(1) | InetAddress* | virtual count(1) | identity*
//! | sig len(u16 BE) | sig | extension len(u16 BE)=0
//! ```
//! The signature covers everything but the signature field, framed by
//! eight `0x7f` bytes on each side.

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::LocatorError;
use crate::identity::Identity;
use crate::inet::InetAddress;

const VERSION: u8 = 0;
const SIGNING_MARKER: [u8; 8] = [0x7f; 8];
pub const MAX_ENTRIES: usize = 255;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Locator {
    identity: Identity,
    physical: Vec<InetAddress>,
    virtual_nodes: Vec<Identity>,
    timestamp: i64,
    bytes: Vec<u8>,
}

impl Locator {
    /// Build and sign a locator. `identity` must carry a private key.
    pub fn create(
        identity: &Identity,
        physical: Vec<InetAddress>,
        virtual_nodes: Vec<Identity>,
        timestamp: i64,
    ) -> Result<Self, LocatorError> {
        if physical.len() > MAX_ENTRIES || virtual_nodes.len() > MAX_ENTRIES {
            return Err(LocatorError::Malformed("too many entries"));
        }
        let public = identity.public_only();
        let virtual_nodes: Vec<Identity> = virtual_nodes.iter().map(Identity::public_only).collect();
        let body = encode_body(&public, &physical, &virtual_nodes, timestamp);
        let signature = identity.sign(&signing_input(&body))?;

        let mut bytes = body;
        bytes.extend_from_slice(&(signature.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&signature);
        bytes.extend_from_slice(&0u16.to_be_bytes());

        Ok(Self {
            identity: public,
            physical,
            virtual_nodes,
            timestamp,
            bytes,
        })
    }

    /// Parse and verify a serialized locator.
    pub fn decode(bytes: &[u8]) -> Result<Self, LocatorError> {
        let mut r = Reader { data: bytes, pos: 0 };
        if r.u8()? != VERSION {
            return Err(LocatorError::Malformed("unsupported version"));
        }
        let timestamp = i64::from_be_bytes(r.take(8)?.try_into().map_err(|_| truncated())?);
        let identity = r.identity()?;
        if r.u8()? != 0 {
            return Err(LocatorError::Malformed("delegated signers are not supported"));
        }
        let physical_count = r.u8()?;
        let mut physical = Vec::with_capacity(usize::from(physical_count));
        for _ in 0..physical_count {
            let (addr, used) = InetAddress::read_from(r.rest())
                .ok_or(LocatorError::Malformed("bad physical address"))?;
            r.pos += used;
            physical.push(addr);
        }
        let virtual_count = r.u8()?;
        let mut virtual_nodes = Vec::with_capacity(usize::from(virtual_count));
        for _ in 0..virtual_count {
            virtual_nodes.push(r.identity()?);
        }
        let body_end = r.pos;
        let sig_len = usize::from(r.u16()?);
        let signature = r.take(sig_len)?;
        let ext_len = usize::from(r.u16()?);
        r.take(ext_len)?;
        if r.pos != bytes.len() {
            return Err(LocatorError::Malformed("trailing data"));
        }

        if !identity.verify(&signing_input(&bytes[..body_end]), signature) {
            return Err(LocatorError::InvalidSignature);
        }

        Ok(Self {
            identity,
            physical,
            virtual_nodes,
            timestamp,
            bytes: bytes.to_vec(),
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn physical(&self) -> &[InetAddress] {
        &self.physical
    }

    pub fn virtual_nodes(&self) -> &[Identity] {
        &self.virtual_nodes
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

fn encode_body(
    identity: &Identity,
    physical: &[InetAddress],
    virtual_nodes: &[Identity],
    timestamp: i64,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(256);
    out.push(VERSION);
    out.extend_from_slice(&timestamp.to_be_bytes());
    identity.write_to(&mut out, false);
    out.push(0);
    out.push(physical.len() as u8);
    for addr in physical {
        addr.write_to(&mut out);
    }
    out.push(virtual_nodes.len() as u8);
    for id in virtual_nodes {
        id.write_to(&mut out, false);
    }
    out
}

fn signing_input(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 16);
    out.extend_from_slice(&SIGNING_MARKER);
    out.extend_from_slice(body);
    out.extend_from_slice(&SIGNING_MARKER);
    out
}

fn truncated() -> LocatorError {
    LocatorError::Malformed("truncated")
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], LocatorError> {
        let slice = self
            .data
            .get(self.pos..self.pos + n)
            .ok_or_else(truncated)?;
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, LocatorError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, LocatorError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn rest(&self) -> &'a [u8] {
        self.data.get(self.pos..).unwrap_or_default()
    }

    fn identity(&mut self) -> Result<Identity, LocatorError> {
        let (id, used) =
            Identity::read_from(self.rest()).map_err(|_| LocatorError::Malformed("bad identity"))?;
        self.pos += used;
        Ok(id)
    }
}

#[derive(Serialize, Deserialize)]
struct LocatorJson {
    #[serde(default, skip_deserializing)]
    identity: Option<Identity>,
    #[serde(default, skip_deserializing)]
    physical: Vec<InetAddress>,
    #[serde(default, skip_deserializing, rename = "virtual")]
    virtual_nodes: Vec<Identity>,
    #[serde(default, skip_deserializing)]
    timestamp: i64,
    bytes: String,
}

impl Serialize for Locator {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        LocatorJson {
            identity: Some(self.identity.clone()),
            physical: self.physical.clone(),
            virtual_nodes: self.virtual_nodes.clone(),
            timestamp: self.timestamp,
            bytes: base64::engine::general_purpose::STANDARD.encode(&self.bytes),
        }
        .serialize(s)
    }
}

/// Only `bytes` is read; everything else is rebuilt from it.
impl<'de> Deserialize<'de> for Locator {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let json = LocatorJson::deserialize(d)?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(json.bytes.as_bytes())
            .map_err(serde::de::Error::custom)?;
        Locator::decode(&bytes).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityType;

    fn sample() -> (Identity, Locator) {
        let id = Identity::generate(IdentityType::C25519).unwrap();
        let relay = Identity::generate(IdentityType::C25519).unwrap();
        let loc = Locator::create(
            &id,
            vec!["10.0.0.1/9993".parse().unwrap(), "2001:db8::1/9993".parse().unwrap()],
            vec![relay],
            1_700_000_000_000,
        )
        .unwrap();
        (id, loc)
    }

    #[test]
    fn test_decode_reproduces_bytes() {
        let (id, loc) = sample();
        let back = Locator::decode(loc.bytes()).unwrap();
        assert_eq!(back.bytes(), loc.bytes());
        assert_eq!(back.identity(), &id.public_only());
        assert_eq!(back.physical().len(), 2);
        assert_eq!(back.virtual_nodes().len(), 1);
        assert_eq!(back.timestamp(), 1_700_000_000_000);
    }

    #[test]
    fn test_empty_locator() {
        let id = Identity::generate(IdentityType::C25519).unwrap();
        let loc = Locator::create(&id, Vec::new(), Vec::new(), 0).unwrap();
        assert_eq!(Locator::decode(loc.bytes()).unwrap(), loc);
    }

    #[test]
    fn test_truncated_is_malformed() {
        let (_, loc) = sample();
        for cut in [0, 1, 9, 40, loc.bytes().len() - 1] {
            let err = Locator::decode(&loc.bytes()[..cut]).unwrap_err();
            assert!(
                matches!(err, LocatorError::Malformed(_)),
                "cut at {cut} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_corrupted_signature_is_signature_error() {
        let (_, loc) = sample();
        let mut bytes = loc.bytes().to_vec();
        let sig_byte = bytes.len() - 2 - 10;
        bytes[sig_byte] ^= 0x01;
        assert_eq!(
            Locator::decode(&bytes).unwrap_err(),
            LocatorError::InvalidSignature
        );
    }

    #[test]
    fn test_tampered_body_is_signature_error() {
        let (_, loc) = sample();
        let mut bytes = loc.bytes().to_vec();
        // last byte of the timestamp
        bytes[8] ^= 0xff;
        assert_eq!(
            Locator::decode(&bytes).unwrap_err(),
            LocatorError::InvalidSignature
        );
    }

    #[test]
    fn test_create_requires_private_key() {
        let id = Identity::generate(IdentityType::C25519).unwrap();
        let err = Locator::create(&id.public_only(), Vec::new(), Vec::new(), 0).unwrap_err();
        assert!(matches!(err, LocatorError::Identity(_)));
    }

    #[test]
    fn test_json_roundtrip_uses_bytes() {
        let (_, loc) = sample();
        let json = serde_json::to_value(&loc).unwrap();
        assert!(json["identity"].is_string());
        assert_eq!(json["physical"][0], "10.0.0.1/9993");

        let only_bytes = serde_json::json!({ "bytes": json["bytes"] });
        let back: Locator = serde_json::from_value(only_bytes).unwrap();
        assert_eq!(back, loc);
    }
}
