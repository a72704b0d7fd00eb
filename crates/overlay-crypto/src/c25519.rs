//! The combined C25519 key pair.
//!
//! Public key layout: X25519 public (32) || Ed25519 public (32).
//! Private key layout: X25519 secret (32) || Ed25519 seed (32).

use crate::CryptoError;
use crate::ed25519::{Ed25519PrivateKey, Ed25519PublicKey};
use crate::x25519::X25519PrivateKey;

pub const PUBLIC_KEY_LEN: usize = 64;
pub const PRIVATE_KEY_LEN: usize = 64;
pub const SIGNATURE_LEN: usize = 64;

#[derive(Debug)]
pub struct C25519KeyPair {
    agreement: X25519PrivateKey,
    signing: Ed25519PrivateKey,
}

impl C25519KeyPair {
    pub fn generate() -> Self {
        Self {
            agreement: X25519PrivateKey::generate(),
            signing: Ed25519PrivateKey::generate(),
        }
    }

    pub fn from_private_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != PRIVATE_KEY_LEN {
            return Err(CryptoError::InvalidKeyLength {
                expected: PRIVATE_KEY_LEN,
                actual: bytes.len(),
            });
        }
        let mut agreement = [0u8; 32];
        let mut seed = [0u8; 32];
        agreement.copy_from_slice(&bytes[..32]);
        seed.copy_from_slice(&bytes[32..]);
        Ok(Self {
            agreement: X25519PrivateKey::from_bytes(agreement),
            signing: Ed25519PrivateKey::from_bytes(seed),
        })
    }

    pub fn public_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        let mut out = [0u8; PUBLIC_KEY_LEN];
        out[..32].copy_from_slice(&self.agreement.public_key());
        out[32..].copy_from_slice(&self.signing.public_key().to_bytes());
        out
    }

    pub fn private_bytes(&self) -> [u8; PRIVATE_KEY_LEN] {
        let mut out = [0u8; PRIVATE_KEY_LEN];
        out[..32].copy_from_slice(&self.agreement.to_bytes());
        out[32..].copy_from_slice(&self.signing.to_bytes());
        out
    }

    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LEN] {
        self.signing.sign(message)
    }
}

/// Verify a signature against a combined public key.
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
    if public_key.len() != PUBLIC_KEY_LEN {
        return Err(CryptoError::InvalidKeyLength {
            expected: PUBLIC_KEY_LEN,
            actual: public_key.len(),
        });
    }
    let mut ed = [0u8; 32];
    ed.copy_from_slice(&public_key[32..]);
    Ed25519PublicKey::from_bytes(ed)?.verify(message, signature)
}

/// Check that a private key derives exactly the given public key.
pub fn keys_match(public_key: &[u8], private_key: &[u8]) -> bool {
    match C25519KeyPair::from_private_bytes(private_key) {
        Ok(pair) => pair.public_bytes().as_slice() == public_key,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_roundtrip_preserves_public() {
        let pair = C25519KeyPair::generate();
        let restored = C25519KeyPair::from_private_bytes(&pair.private_bytes()).unwrap();
        assert_eq!(pair.public_bytes(), restored.public_bytes());
    }

    #[test]
    fn test_sign_and_verify() {
        let pair = C25519KeyPair::generate();
        let sig = pair.sign(b"locator");
        verify(&pair.public_bytes(), b"locator", &sig).unwrap();
        assert!(verify(&pair.public_bytes(), b"other", &sig).is_err());
    }

    #[test]
    fn test_keys_match() {
        let a = C25519KeyPair::generate();
        let b = C25519KeyPair::generate();
        assert!(keys_match(&a.public_bytes(), &a.private_bytes()));
        assert!(!keys_match(&a.public_bytes(), &b.private_bytes()));
        assert!(!keys_match(&a.public_bytes(), &[0u8; 5]));
    }

    #[test]
    fn test_from_private_rejects_bad_length() {
        assert_eq!(
            C25519KeyPair::from_private_bytes(&[1u8; 10]).unwrap_err(),
            CryptoError::InvalidKeyLength {
                expected: 64,
                actual: 10
            }
        );
    }
}
