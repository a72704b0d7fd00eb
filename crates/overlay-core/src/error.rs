//! Error types for the overlay-core crate.

use core::fmt;

use overlay_crypto::CryptoError;

/// Failure to parse one of the textual identifier forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Address(String),
    NetworkId(String),
    Mac(String),
    InetAddress(String),
    InetNet(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Address(s) => write!(f, "invalid address: {s:?}"),
            ParseError::NetworkId(s) => write!(f, "invalid network id: {s:?}"),
            ParseError::Mac(s) => write!(f, "invalid MAC address: {s:?}"),
            ParseError::InetAddress(s) => write!(f, "invalid ip/port: {s:?}"),
            ParseError::InetNet(s) => write!(f, "invalid ip/bits: {s:?}"),
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    InvalidParameter,
    UnrecognizedType(u8),
    InvalidKey,
    UnsupportedOperation,
    NoPrivateKey,
    Crypto(CryptoError),
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityError::InvalidParameter => write!(f, "invalid parameter"),
            IdentityError::UnrecognizedType(t) => write!(f, "unrecognized identity type: {t}"),
            IdentityError::InvalidKey => write!(f, "invalid key data"),
            IdentityError::UnsupportedOperation => {
                write!(f, "operation not supported for this identity type")
            }
            IdentityError::NoPrivateKey => write!(f, "identity has no private key"),
            IdentityError::Crypto(e) => write!(f, "crypto error: {e}"),
        }
    }
}

impl std::error::Error for IdentityError {}

impl From<CryptoError> for IdentityError {
    fn from(e: CryptoError) -> Self {
        IdentityError::Crypto(e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorError {
    /// Truncated or structurally invalid byte form.
    Malformed(&'static str),
    /// The byte form parsed but its signature does not verify.
    InvalidSignature,
    Identity(IdentityError),
}

impl fmt::Display for LocatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocatorError::Malformed(reason) => write!(f, "malformed locator: {reason}"),
            LocatorError::InvalidSignature => write!(f, "locator signature is invalid"),
            LocatorError::Identity(e) => write!(f, "locator identity: {e}"),
        }
    }
}

impl std::error::Error for LocatorError {}

impl From<IdentityError> for LocatorError {
    fn from(e: IdentityError) -> Self {
        LocatorError::Identity(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_all_variants() {
        let messages = [
            ParseError::Address("zz".into()).to_string(),
            ParseError::InetNet("1.2.3.4".into()).to_string(),
            IdentityError::UnrecognizedType(9).to_string(),
            IdentityError::Crypto(CryptoError::InvalidSignature).to_string(),
            LocatorError::Malformed("truncated").to_string(),
            LocatorError::InvalidSignature.to_string(),
        ];
        for msg in &messages {
            assert!(!msg.is_empty());
        }
        assert_eq!(
            IdentityError::UnrecognizedType(9).to_string(),
            "unrecognized identity type: 9"
        );
    }
}
