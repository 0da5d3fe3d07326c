//! Error types for the shadowsync core.

use thiserror::Error;

/// A delta could not be applied to a value.
///
/// This is the only error the synchronization state machine cares about:
/// it signals that a canonical value has drifted structurally away from
/// the shadow the delta was computed against.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("type mismatch at {path:?}: expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("key already present at {0:?}")]
    AlreadyPresent(String),

    #[error("missing value at {0:?}")]
    Missing(String),

    #[error("array length mismatch at {path:?}: expected {expected}, found {found}")]
    LengthMismatch {
        path: String,
        expected: usize,
        found: usize,
    },

    #[error("malformed delta at {path:?}: {reason}")]
    Malformed { path: String, reason: &'static str },
}

/// Wire encoding and decoding errors.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("decoding error: {0}")]
    Decoding(String),

    #[error("malformed edit: {0}")]
    MalformedEdit(String),

    #[error("unsupported CBOR value: {0}")]
    Unsupported(&'static str),
}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_data() || e.is_syntax() || e.is_eof() {
            CodecError::Decoding(e.to_string())
        } else {
            CodecError::Encoding(e.to_string())
        }
    }
}
