//! Key primitives backing node identities.
//!
//! The controller treats identity cryptography as an opaque capability:
//! generate, validate, sign and verify. This crate is the default provider
//! for the C25519 scheme, a combined X25519 agreement key and Ed25519
//! signing key carried side by side.

pub mod c25519;
pub mod ed25519;
pub mod error;
pub mod sha;
pub mod x25519;

pub use error::CryptoError;
