//! Content fingerprints for convergence checks.
//!
//! Two replicas can confirm they hold the same document by comparing
//! fingerprints instead of shipping the whole value.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::canonical_value_bytes;
use crate::error::CodecError;

/// A 32-byte Blake3 digest of a value's canonical CBOR encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    /// Fingerprint a JSON value.
    ///
    /// Object key order does not affect the result.
    pub fn of(value: &serde_json::Value) -> Result<Self, CodecError> {
        let bytes = canonical_value_bytes(value)?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"shadowsync-fingerprint-v0:");
        hasher.update(&bytes);
        Ok(Self(*hasher.finalize().as_bytes()))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fingerprint_deterministic() {
        let v = json!({ "foo": 123, "bar": [1, 2.5, "x"] });
        assert_eq!(Fingerprint::of(&v).unwrap(), Fingerprint::of(&v.clone()).unwrap());
    }

    #[test]
    fn test_fingerprint_distinguishes_values() {
        let a = Fingerprint::of(&json!({ "foo": 123 })).unwrap();
        let b = Fingerprint::of(&json!({ "foo": 124 })).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_distinguishes_int_and_float() {
        let a = Fingerprint::of(&json!(1)).unwrap();
        let b = Fingerprint::of(&json!(1.0)).unwrap();
        assert_ne!(a, b);
    }
}
