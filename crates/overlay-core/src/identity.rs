//! Node identities and their text and binary forms.
//!
//! An identity is an address, a key scheme tag, a public key and an optional
//! private key. The address is the first five bytes of SHA-512 over the
//! public key. Text form is `address:type:public[:private]`, with hex key
//! fields for type 0 and lowercase base32 for type 1.
//!
//! Key operations for type 0 go through `overlay-crypto`. Type 1 identities
//! can be parsed, serialized and structurally checked, but not generated or
//! used for signing here.

use core::fmt;
use core::str::FromStr;

use overlay_crypto::c25519::{self, C25519KeyPair};
use overlay_crypto::sha::sha512;

use crate::base32;
use crate::error::IdentityError;
use crate::types::Address;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdentityType {
    /// X25519 + Ed25519.
    C25519 = 0,
    /// NIST P-384 hybrid.
    P384 = 1,
}

impl IdentityType {
    pub const fn public_key_len(self) -> usize {
        match self {
            IdentityType::C25519 => c25519::PUBLIC_KEY_LEN,
            IdentityType::P384 => 209,
        }
    }

    pub const fn private_key_len(self) -> usize {
        match self {
            IdentityType::C25519 => c25519::PRIVATE_KEY_LEN,
            IdentityType::P384 => 112,
        }
    }

    fn encode_key(self, key: &[u8]) -> String {
        match self {
            IdentityType::C25519 => hex::encode(key),
            IdentityType::P384 => base32::encode(key),
        }
    }

    fn decode_key(self, text: &str) -> Option<Vec<u8>> {
        match self {
            IdentityType::C25519 => hex::decode(text).ok(),
            IdentityType::P384 => base32::decode(text),
        }
    }
}

impl TryFrom<u8> for IdentityType {
    type Error = IdentityError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(IdentityType::C25519),
            1 => Ok(IdentityType::P384),
            other => Err(IdentityError::UnrecognizedType(other)),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    address: Address,
    id_type: IdentityType,
    public_key: Vec<u8>,
    private_key: Option<Vec<u8>>,
}

impl Identity {
    /// Assemble an identity from parts, checking only key lengths.
    pub fn from_parts(
        address: Address,
        id_type: IdentityType,
        public_key: Vec<u8>,
        private_key: Option<Vec<u8>>,
    ) -> Result<Self, IdentityError> {
        if public_key.len() != id_type.public_key_len() {
            return Err(IdentityError::InvalidKey);
        }
        if let Some(private) = &private_key
            && private.len() != id_type.private_key_len()
        {
            return Err(IdentityError::InvalidKey);
        }
        Ok(Self {
            address,
            id_type,
            public_key,
            private_key,
        })
    }

    /// Generate a fresh identity, retrying until the derived address is not
    /// reserved.
    pub fn generate(id_type: IdentityType) -> Result<Self, IdentityError> {
        match id_type {
            IdentityType::C25519 => loop {
                let pair = C25519KeyPair::generate();
                let public = pair.public_bytes();
                let address = derive_address(&public);
                if address.is_reserved() {
                    continue;
                }
                return Ok(Self {
                    address,
                    id_type,
                    public_key: public.to_vec(),
                    private_key: Some(pair.private_bytes().to_vec()),
                });
            },
            IdentityType::P384 => Err(IdentityError::UnsupportedOperation),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn id_type(&self) -> IdentityType {
        self.id_type
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn private_key(&self) -> Option<&[u8]> {
        self.private_key.as_deref()
    }

    pub fn has_private(&self) -> bool {
        self.private_key.is_some()
    }

    /// Copy without the private key.
    pub fn public_only(&self) -> Self {
        Self {
            private_key: None,
            ..self.clone()
        }
    }

    /// Structural and key-consistency check: lengths, address derivation,
    /// and (for type 0) that the private key matches the public key.
    pub fn locally_validate(&self) -> bool {
        if self.public_key.len() != self.id_type.public_key_len() {
            return false;
        }
        if self.address.is_reserved() || derive_address(&self.public_key) != self.address {
            return false;
        }
        match (&self.private_key, self.id_type) {
            (None, _) => true,
            (Some(private), IdentityType::C25519) => c25519::keys_match(&self.public_key, private),
            (Some(private), IdentityType::P384) => private.len() == self.id_type.private_key_len(),
        }
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, IdentityError> {
        let private = self.private_key.as_ref().ok_or(IdentityError::NoPrivateKey)?;
        match self.id_type {
            IdentityType::C25519 => {
                let pair = C25519KeyPair::from_private_bytes(private)?;
                Ok(pair.sign(message).to_vec())
            }
            IdentityType::P384 => Err(IdentityError::UnsupportedOperation),
        }
    }

    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        match self.id_type {
            IdentityType::C25519 => c25519::verify(&self.public_key, message, signature).is_ok(),
            IdentityType::P384 => false,
        }
    }

    /// Text form, with the private key only when `include_private` is set
    /// and one is present.
    pub fn to_string_with(&self, include_private: bool) -> String {
        let mut out = format!(
            "{}:{}:{}",
            self.address,
            self.id_type as u8,
            self.id_type.encode_key(&self.public_key)
        );
        if include_private && let Some(private) = &self.private_key {
            out.push(':');
            out.push_str(&self.id_type.encode_key(private));
        }
        out
    }

    /// Binary form: address, type, public key, private length, private key.
    pub fn write_to(&self, out: &mut Vec<u8>, include_private: bool) {
        out.extend_from_slice(&self.address.to_bytes());
        out.push(self.id_type as u8);
        out.extend_from_slice(&self.public_key);
        match (&self.private_key, include_private) {
            (Some(private), true) => {
                out.push(private.len() as u8);
                out.extend_from_slice(private);
            }
            _ => out.push(0),
        }
    }

    /// Inverse of [`write_to`](Self::write_to); returns the identity and the
    /// number of bytes consumed.
    pub fn read_from(data: &[u8]) -> Result<(Self, usize), IdentityError> {
        let addr: [u8; 5] = data
            .get(..5)
            .and_then(|b| b.try_into().ok())
            .ok_or(IdentityError::InvalidParameter)?;
        let id_type = IdentityType::try_from(*data.get(5).ok_or(IdentityError::InvalidParameter)?)?;
        let mut pos = 6;
        let pub_len = id_type.public_key_len();
        let public_key = data
            .get(pos..pos + pub_len)
            .ok_or(IdentityError::InvalidParameter)?
            .to_vec();
        pos += pub_len;
        let priv_len = usize::from(*data.get(pos).ok_or(IdentityError::InvalidParameter)?);
        pos += 1;
        let private_key = if priv_len == 0 {
            None
        } else {
            let key = data
                .get(pos..pos + priv_len)
                .ok_or(IdentityError::InvalidParameter)?
                .to_vec();
            pos += priv_len;
            Some(key)
        };
        let identity = Self::from_parts(Address::from_bytes(&addr), id_type, public_key, private_key)?;
        Ok((identity, pos))
    }
}

/// First five bytes of SHA-512 over the public key.
pub fn derive_address(public_key: &[u8]) -> Address {
    let digest = sha512(public_key);
    let mut bytes = [0u8; 5];
    bytes.copy_from_slice(&digest[..5]);
    Address::from_bytes(&bytes)
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_with(false))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("address", &self.address)
            .field("type", &self.id_type)
            .field("has_private", &self.private_key.is_some())
            .finish()
    }
}

impl FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.trim().split(':').collect();
        if fields.len() != 3 && fields.len() != 4 {
            return Err(IdentityError::InvalidParameter);
        }
        if fields[0].len() != 10 {
            return Err(IdentityError::InvalidParameter);
        }
        let address: Address = fields[0]
            .parse()
            .map_err(|_| IdentityError::InvalidParameter)?;
        let type_num: u8 = fields[1]
            .parse()
            .map_err(|_| IdentityError::InvalidParameter)?;
        let id_type = IdentityType::try_from(type_num)?;
        let public_key = id_type
            .decode_key(fields[2])
            .ok_or(IdentityError::InvalidKey)?;
        let private_key = match fields.get(3) {
            Some(text) => Some(id_type.decode_key(text).ok_or(IdentityError::InvalidKey)?),
            None => None,
        };
        Self::from_parts(address, id_type, public_key, private_key)
    }
}

impl serde::Serialize for Identity {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Identity {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let text = <String as serde::Deserialize>::deserialize(d)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_generate_is_valid() {
        let id = Identity::generate(IdentityType::C25519).unwrap();
        assert!(id.has_private());
        assert!(id.locally_validate());
        assert!(!id.address().is_reserved());
    }

    #[test]
    fn test_generate_p384_unsupported() {
        assert_eq!(
            Identity::generate(IdentityType::P384).unwrap_err(),
            IdentityError::UnsupportedOperation
        );
    }

    #[test]
    fn test_text_roundtrip_secret_and_public() {
        let id = Identity::generate(IdentityType::C25519).unwrap();
        let secret = id.to_string_with(true);
        assert_eq!(secret.split(':').count(), 4);
        assert_eq!(secret.parse::<Identity>().unwrap(), id);

        let public = id.to_string();
        assert_eq!(public.split(':').count(), 3);
        assert_eq!(public.parse::<Identity>().unwrap(), id.public_only());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "abc".parse::<Identity>().unwrap_err(),
            IdentityError::InvalidParameter
        );
        assert_eq!(
            "0123456789:7:00".parse::<Identity>().unwrap_err(),
            IdentityError::UnrecognizedType(7)
        );
        assert_eq!(
            "0123456789:0:0011".parse::<Identity>().unwrap_err(),
            IdentityError::InvalidKey
        );
        assert_eq!(
            "0123456789:0:zz".parse::<Identity>().unwrap_err(),
            IdentityError::InvalidKey
        );
    }

    #[test]
    fn test_validate_rejects_wrong_address() {
        let id = Identity::generate(IdentityType::C25519).unwrap();
        let forged = Identity::from_parts(
            Address::new(id.address().as_u64() ^ 1),
            IdentityType::C25519,
            id.public_key().to_vec(),
            None,
        )
        .unwrap();
        assert!(!forged.locally_validate());
    }

    #[test]
    fn test_validate_rejects_mismatched_private() {
        let a = Identity::generate(IdentityType::C25519).unwrap();
        let b = Identity::generate(IdentityType::C25519).unwrap();
        let mixed = Identity::from_parts(
            a.address(),
            IdentityType::C25519,
            a.public_key().to_vec(),
            b.private_key().map(<[u8]>::to_vec),
        )
        .unwrap();
        assert!(!mixed.locally_validate());
    }

    #[test]
    fn test_sign_verify() {
        let id = Identity::generate(IdentityType::C25519).unwrap();
        let sig = id.sign(b"payload").unwrap();
        assert!(id.public_only().verify(b"payload", &sig));
        assert!(!id.verify(b"payload2", &sig));
        assert_eq!(
            id.public_only().sign(b"x").unwrap_err(),
            IdentityError::NoPrivateKey
        );
    }

    #[test]
    fn test_binary_roundtrip() {
        let id = Identity::generate(IdentityType::C25519).unwrap();
        let mut buf = Vec::new();
        id.write_to(&mut buf, false);
        let (back, used) = Identity::read_from(&buf).unwrap();
        assert_eq!(used, buf.len());
        assert_eq!(back, id.public_only());

        buf.clear();
        id.write_to(&mut buf, true);
        assert_eq!(Identity::read_from(&buf).unwrap().0, id);
        assert!(Identity::read_from(&buf[..20]).is_err());
    }

    #[test]
    fn test_serde_is_public_text() {
        let id = Identity::generate(IdentityType::C25519).unwrap();
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.to_string()));
    }

    fn arb_identity() -> impl Strategy<Value = Identity> {
        (any::<u64>(), any::<bool>(), any::<bool>()).prop_flat_map(|(addr, p384, with_private)| {
            let id_type = if p384 {
                IdentityType::P384
            } else {
                IdentityType::C25519
            };
            let public = proptest::collection::vec(any::<u8>(), id_type.public_key_len());
            let private = proptest::collection::vec(any::<u8>(), id_type.private_key_len());
            (public, private).prop_map(move |(public, private)| {
                Identity::from_parts(
                    Address::new(addr),
                    id_type,
                    public,
                    with_private.then_some(private),
                )
                .unwrap()
            })
        })
    }

    proptest! {
        #[test]
        fn prop_text_roundtrip(id in arb_identity()) {
            let text = id.to_string_with(true);
            prop_assert_eq!(text.parse::<Identity>().unwrap(), id);
        }
    }
}
