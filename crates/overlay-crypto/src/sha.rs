//! SHA-512 hashing, used for address derivation and signature digests.

use sha2::{Digest, Sha512};

/// Compute the SHA-512 hash of the given data.
#[must_use]
pub fn sha512(data: &[u8]) -> [u8; 64] {
    let mut hasher = Sha512::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha512_empty() {
        let digest = sha512(b"");
        assert_eq!(
            hex::encode(&digest[..8]),
            "cf83e1357eefb8bd",
            "SHA-512 of the empty string has a well-known prefix"
        );
    }

    #[test]
    fn test_sha512_abc() {
        let digest = sha512(b"abc");
        assert_eq!(hex::encode(&digest[..8]), "ddaf35a193617aba");
    }
}
