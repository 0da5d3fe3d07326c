//! Edit: the unit exchanged between peers.
//!
//! An edit is a delta plus the version bookkeeping the receiver needs to
//! decide whether it can be applied, is a duplicate, or reveals lost
//! messages. An edit without a delta is a pure acknowledgment.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// A versioned delta.
///
/// The JSON form is `{"version": .., "other_version": .., "delta": ..}`
/// with `delta` omitted for acknowledgments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edit<D> {
    /// The sender's shadow version when the delta was computed.
    pub version: u64,
    /// The sender's count of incorporated receiver edits at that time.
    pub other_version: u64,
    /// The change itself; `None` for a pure acknowledgment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<D>,
}

impl<D> Edit<D> {
    /// Create an edit carrying a delta.
    pub fn new(version: u64, other_version: u64, delta: D) -> Self {
        Self {
            version,
            other_version,
            delta: Some(delta),
        }
    }

    /// Create a pure acknowledgment.
    ///
    /// The receiver drops every queued edit with `version <= other_version`.
    pub fn ack(version: u64, other_version: u64) -> Self {
        Self {
            version,
            other_version,
            delta: None,
        }
    }

    /// Whether this edit only acknowledges and carries no change.
    pub fn is_ack(&self) -> bool {
        self.delta.is_none()
    }
}

impl<D: Serialize> Edit<D> {
    /// Serialize to the JSON wire form.
    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<D: DeserializeOwned> Edit<D> {
    /// Parse the JSON wire form.
    pub fn from_json(s: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(s)?)
    }
}
