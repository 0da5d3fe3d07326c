//! Sync protocol message types.
//!
//! A single message kind travels between replicas: a batch of edits for
//! one document. Pure acknowledgments are edits without a delta.
//!
//! ## Wire format
//!
//! Frames are canonical CBOR maps with integer keys:
//!
//! ```text
//! { 0: protocol_version, 1: bytes(doc_id), 2: [edit, ...] }
//! ```
//!
//! Each edit uses the encoding from [`shadowsync_core::canonical`].

use bytes::Bytes;
use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use shadowsync_core::canonical::{cbor_to_u64, edit_from_cbor, edit_to_cbor, encode_canonical};
use shadowsync_core::{CodecError, Delta, DocId, Edit};

use crate::error::{Result, SyncError};

/// Unique identifier for a node in the sync network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub [u8; 32]);

impl NodeId {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate a random node ID.
    pub fn random() -> Self {
        use rand::Rng;
        Self(rand::thread_rng().gen())
    }

    /// Short hex form for logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.short())
    }
}

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 0;

/// Message size limits.
pub mod limits {
    /// Max edits in one SyncMessage.
    pub const MAX_EDITS_PER_MESSAGE: usize = 64;
    /// Max encoded frame size in bytes.
    pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;
}

mod keys {
    pub const PROTOCOL_VERSION: u64 = 0;
    pub const DOC_ID: u64 = 1;
    pub const EDITS: u64 = 2;
}

/// A batch of edits for one document, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncMessage {
    pub doc_id: DocId,
    pub edits: Vec<Edit<Delta>>,
}

impl SyncMessage {
    pub fn new(doc_id: DocId, edits: Vec<Edit<Delta>>) -> Self {
        Self { doc_id, edits }
    }

    /// A message carrying a single pure acknowledgment.
    pub fn ack(doc_id: DocId, version: u64, other_version: u64) -> Self {
        Self::new(doc_id, vec![Edit::ack(version, other_version)])
    }

    /// Whether every edit in the message is a pure acknowledgment.
    pub fn is_ack_only(&self) -> bool {
        self.edits.iter().all(Edit::is_ack)
    }

    /// Check if this message respects size limits.
    pub fn validate_limits(&self) -> std::result::Result<(), &'static str> {
        if self.edits.is_empty() {
            return Err("message carries no edits");
        }
        if self.edits.len() > limits::MAX_EDITS_PER_MESSAGE {
            return Err("too many edits");
        }
        Ok(())
    }

    /// Encode to a canonical CBOR frame.
    pub fn encode(&self) -> std::result::Result<Bytes, CodecError> {
        let edits = self
            .edits
            .iter()
            .map(edit_to_cbor)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let frame = Value::Map(vec![
            (
                Value::Integer(keys::PROTOCOL_VERSION.into()),
                Value::Integer(PROTOCOL_VERSION.into()),
            ),
            (
                Value::Integer(keys::DOC_ID.into()),
                Value::Bytes(self.doc_id.as_bytes().to_vec()),
            ),
            (Value::Integer(keys::EDITS.into()), Value::Array(edits)),
        ]);

        Ok(Bytes::from(encode_canonical(&frame)?))
    }

    /// Decode and validate a frame.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > limits::MAX_FRAME_BYTES {
            return Err(SyncError::InvalidMessage("frame too large".into()));
        }

        let value: Value = ciborium::de::from_reader(bytes)
            .map_err(|e| CodecError::Decoding(e.to_string()))?;
        let entries = match value {
            Value::Map(entries) => entries,
            _ => return Err(SyncError::InvalidMessage("expected map".into())),
        };

        let mut protocol_version = None;
        let mut doc_id = None;
        let mut edits = None;

        for (key, field) in &entries {
            match cbor_to_u64(key, "key") {
                Ok(keys::PROTOCOL_VERSION) if protocol_version.is_none() => {
                    protocol_version = Some(cbor_to_u64(field, "protocol_version")?);
                }
                Ok(keys::DOC_ID) if doc_id.is_none() => {
                    doc_id = Some(match field {
                        Value::Bytes(b) => DocId::try_from(b.as_slice())
                            .map_err(|_| SyncError::InvalidMessage("doc_id must be 32 bytes".into()))?,
                        _ => return Err(SyncError::InvalidMessage("doc_id is not bytes".into())),
                    });
                }
                Ok(keys::EDITS) if edits.is_none() => {
                    let items = match field {
                        Value::Array(items) => items,
                        _ => return Err(SyncError::InvalidMessage("edits is not an array".into())),
                    };
                    edits = Some(
                        items
                            .iter()
                            .map(edit_from_cbor)
                            .collect::<std::result::Result<Vec<Edit<Delta>>, _>>()?,
                    );
                }
                _ => return Err(SyncError::InvalidMessage("unexpected or duplicate key".into())),
            }
        }

        let peer = protocol_version
            .ok_or_else(|| SyncError::InvalidMessage("missing protocol_version".into()))?;
        if peer != u64::from(PROTOCOL_VERSION) {
            return Err(SyncError::VersionMismatch {
                local: PROTOCOL_VERSION,
                peer: u8::try_from(peer).unwrap_or(u8::MAX),
            });
        }

        let message = Self {
            doc_id: doc_id.ok_or_else(|| SyncError::InvalidMessage("missing doc_id".into()))?,
            edits: edits.ok_or_else(|| SyncError::InvalidMessage("missing edits".into()))?,
        };
        message
            .validate_limits()
            .map_err(|reason| SyncError::InvalidMessage(reason.into()))?;
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shadowsync_core::{DeltaEngine, JsonDiff};

    fn sample() -> SyncMessage {
        let delta = JsonDiff
            .diff(&json!({ "foo": 123 }), &json!({ "foo": 5, "bar": [1.5] }))
            .unwrap();
        SyncMessage::new(
            DocId::derive("notes"),
            vec![Edit::new(3, 1, delta), Edit::ack(4, 1)],
        )
    }

    #[test]
    fn test_frame_roundtrip() {
        let msg = sample();
        let bytes = msg.encode().unwrap();
        assert_eq!(SyncMessage::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_frame_encoding_deterministic() {
        assert_eq!(sample().encode().unwrap(), sample().encode().unwrap());
    }

    #[test]
    fn test_ack_only() {
        let msg = SyncMessage::ack(DocId::ZERO, 2, 7);
        assert!(msg.is_ack_only());
        assert!(!sample().is_ack_only());
    }

    #[test]
    fn test_message_limits_valid() {
        assert!(sample().validate_limits().is_ok());
    }

    #[test]
    fn test_message_limits_exceeded() {
        let edits = (0..=limits::MAX_EDITS_PER_MESSAGE as u64)
            .map(|v| Edit::ack(v, 0))
            .collect();
        let msg = SyncMessage::new(DocId::ZERO, edits);
        assert!(msg.validate_limits().is_err());

        let bytes = msg.encode().unwrap();
        assert!(matches!(
            SyncMessage::decode(&bytes),
            Err(SyncError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_empty_message_rejected() {
        let msg = SyncMessage::new(DocId::ZERO, vec![]);
        assert!(msg.validate_limits().is_err());
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let frame = Value::Map(vec![
            (Value::Integer(0u64.into()), Value::Integer(9u64.into())),
            (Value::Integer(1u64.into()), Value::Bytes(vec![0u8; 32])),
            (Value::Integer(2u64.into()), Value::Array(vec![])),
        ]);
        let bytes = encode_canonical(&frame).unwrap();
        assert!(matches!(
            SyncMessage::decode(&bytes),
            Err(SyncError::VersionMismatch { local: 0, peer: 9 })
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(SyncMessage::decode(&[0xff, 0x00, 0x13]).is_err());
        let not_a_map = encode_canonical(&Value::Integer(1u64.into())).unwrap();
        assert!(matches!(
            SyncMessage::decode(&not_a_map),
            Err(SyncError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_short_doc_id_rejected() {
        let frame = Value::Map(vec![
            (Value::Integer(0u64.into()), Value::Integer(0u64.into())),
            (Value::Integer(1u64.into()), Value::Bytes(vec![0u8; 4])),
            (Value::Integer(2u64.into()), Value::Array(vec![])),
        ]);
        let bytes = encode_canonical(&frame).unwrap();
        assert!(matches!(
            SyncMessage::decode(&bytes),
            Err(SyncError::InvalidMessage(_))
        ));
    }
}
