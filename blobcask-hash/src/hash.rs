use serde::{Deserialize, Serialize};
use std::fmt;

/// Locally computed digest of a byte payload, used as the dedup key.
///
/// A fingerprint is the lowercase hex form of the blake3 digest (64
/// characters). It lives in a different namespace than [`ContentHash`]:
/// the remote store addresses blobs by its own identifiers, and the two
/// are only ever associated through a verified store exchange.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Parse from a hex string, validating digest length.
    pub fn from_hex(hex_str: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(hex_str)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        Ok(Self(hex_str.to_ascii_lowercase()))
    }

    /// Get as string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({}...)", &self.0[..8.min(self.0.len())])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the fingerprint of a byte payload.
///
/// Pure and deterministic; the empty payload is valid and yields the
/// digest of the empty string.
pub fn fingerprint(payload: &[u8]) -> Fingerprint {
    Fingerprint(blake3::hash(payload).to_hex().to_string())
}

/// Identifier the remote store uses to address a stored blob.
///
/// Opaque to this crate; never assumed to share the fingerprint's
/// format or namespace.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Wrap an identifier received from the remote store.
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Get as string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unwrap into the inner string
    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for ContentHash {
    fn from(hash: &str) -> Self {
        Self::new(hash)
    }
}

impl From<String> for ContentHash {
    fn from(hash: String) -> Self {
        Self(hash)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
