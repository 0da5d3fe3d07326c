//! Error types for the replica.

use shadowsync_core::DocId;
use shadowsync_sync::SyncError;
use thiserror::Error;

/// Errors that can occur during Replica operations.
#[derive(Debug, Error)]
pub enum ReplicaError {
    /// Sync error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Document is not open on this replica.
    #[error("document not open: {0}")]
    NotOpen(DocId),
}

/// Result type for Replica operations.
pub type Result<T> = std::result::Result<T, ReplicaError>;
