//! # Shadowsync
//!
//! Keep a structured document identical on two replicas that exchange
//! compact deltas over an unreliable channel.
//!
//! ## Overview
//!
//! Shadowsync implements two-party differential synchronization:
//!
//! - **Documents**: JSON values edited freely on either side
//! - **Edits**: versioned deltas against the last exchanged state (the shadow)
//! - **Acknowledgments**: let each side drop edits the peer has incorporated
//! - **Rollback**: repairs a single lost round without a full resend
//!
//! ## Key Concepts
//!
//! - **Canonical value**: the live document the application edits.
//! - **Shadow**: the last state both sides agreed on.
//! - **Backup**: the shadow before the latest push, used for rollback.
//! - **Last writer wins**: conflicting changes are overwritten, not merged.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use serde_json::json;
//! use shadowsync::{DocId, NodeId, Replica, ReplicaConfig};
//! use shadowsync::sync::MemoryNetwork;
//!
//! async fn example() -> shadowsync::Result<()> {
//!     let network = MemoryNetwork::new();
//!     let (a, b) = (NodeId::random(), NodeId::random());
//!
//!     let mut alice = Replica::new(network.create_transport(a).await, b, ReplicaConfig::default());
//!     let mut bob = Replica::new(network.create_transport(b).await, a, ReplicaConfig::default());
//!
//!     let doc = DocId::derive("shopping-list");
//!     alice.open(doc, json!({ "items": [] }));
//!     bob.open(doc, json!({ "items": [] }));
//!
//!     alice.edit(&doc, |v| v["items"] = json!(["milk"])).await?;
//!     alice.flush().await?;
//!     bob.receive_all(std::time::Duration::from_millis(50)).await?;
//!
//!     assert_eq!(bob.value(&doc).await?, json!({ "items": ["milk"] }));
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `shadowsync::core` - Deltas, edits and the wire codec
//! - `shadowsync::sync` - The sync state machine, transports and sessions

pub mod error;
pub mod replica;

// Re-export component crates
pub use shadowsync_core as core;
pub use shadowsync_sync as sync;

// Re-export main types for convenience
pub use error::{ReplicaError, Result};
pub use replica::{Replica, ReplicaConfig};

// Re-export commonly used types
pub use shadowsync_core::{Delta, DeltaEngine, DocId, Edit, Fingerprint, JsonDiff};
pub use shadowsync_sync::{
    ConvergenceResult, DocumentHandle, DocumentSummary, JsonDocument, NodeId, PullOutcome,
    SyncConfig, SyncDocument, Transport,
};
