//! Error types for the sync module.
//!
//! The document state machine itself never fails; these errors come from
//! the wire, the transport, and the actor plumbing around it.

use thiserror::Error;

use shadowsync_core::{CodecError, DocId};

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Protocol version mismatch with peer.
    #[error("protocol version mismatch: local={local}, peer={peer}")]
    VersionMismatch { local: u8, peer: u8 },

    /// Message validation failed.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Frame could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    TransportError(String),

    /// Timeout waiting for peer.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Peer is not connected.
    #[error("peer not connected: {0}")]
    PeerNotConnected(String),

    /// The document's task has stopped.
    #[error("document closed: {0}")]
    DocumentClosed(DocId),

    /// The session has no document with this id.
    #[error("unknown document: {0}")]
    UnknownDocument(DocId),
}

impl SyncError {
    /// Whether the error comes from a single inbound frame that could not
    /// be decoded, as opposed to a broken transport or document.
    pub fn is_malformed_frame(&self) -> bool {
        matches!(
            self,
            SyncError::VersionMismatch { .. } | SyncError::InvalidMessage(_) | SyncError::Codec(_)
        )
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
