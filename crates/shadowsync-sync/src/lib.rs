//! # Shadowsync Sync
//!
//! Differential synchronization of a structured document between two
//! replicas over an unreliable channel.
//!
//! ## Overview
//!
//! Each replica keeps a *shadow* of what it last exchanged with its peer.
//! Local changes are diffed against the shadow and sent as versioned
//! [`Edit`](shadowsync_core::Edit)s; inbound edits are patched into both
//! the shadow and the canonical value. Version counters on both sides let
//! each replica detect duplicates, lost acknowledgments and lost edits.
//!
//! ## Key Properties
//!
//! - **Loss tolerant**: one lost round is repaired by rolling back to the backup shadow
//! - **Duplicate tolerant**: edits already incorporated are ignored
//! - **Last writer wins**: a local change that conflicts with a peer edit overrides it
//!
//! ## Usage
//!
//! ```rust,no_run
//! use serde_json::json;
//! use shadowsync_sync::JsonDocument;
//!
//! let mut a = JsonDocument::new(json!({ "foo": 123 }));
//! let mut b = JsonDocument::new(json!({ "foo": 123 }));
//!
//! a.value_mut()["bar"] = json!(5);
//! a.push();
//! for edit in a.outgoing().cloned().collect::<Vec<_>>() {
//!     b.pull(&edit);
//! }
//! assert_eq!(a.value(), b.value());
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! Replica A                           Replica B
//!   |-- Edit{v0, ov0, delta} -------->|   B: shadow += delta, ov = 1
//!   |<------- Edit{v0, ov0} ----------|   ack, A drops edits <= 0
//!   |<--- Edit{v0, ov1, delta} -------|   B's own change
//!   |-------- Edit{v1, ov0} --------->|   ack
//! ```

pub mod convergence;
pub mod document;
pub mod error;
pub mod handle;
pub mod messages;
pub mod session;
pub mod transport;

pub use convergence::{verify_convergence, ConvergenceResult, DocumentSummary};
pub use document::{BackupState, JsonDocument, PullOutcome, ShadowState, SyncDocument};
pub use error::{Result, SyncError};
pub use handle::{DocumentHandle, Outgoing};
pub use messages::{limits, NodeId, SyncMessage, PROTOCOL_VERSION};
pub use session::{Received, SyncConfig, SyncReport, SyncSession};
pub use transport::{memory::MemoryNetwork, memory::MemoryTransport, Transport};
