//! # Shadowsync Core
//!
//! Pure primitives for shadow-based differential synchronization: deltas,
//! edits, and their canonical wire encoding.
//!
//! This crate contains no I/O and no networking. It is pure computation
//! over structured values.
//!
//! ## Key Types
//!
//! - [`DeltaEngine`] - Contract for computing and applying structural deltas
//! - [`JsonDiff`] - The delta engine over `serde_json::Value`
//! - [`Cloner`] - Contract for taking independent snapshots
//! - [`Edit`] - A versioned delta, the unit exchanged between peers
//! - [`DocId`] - Identifier shared by both replicas of a document
//! - [`Fingerprint`] - Digest used to confirm two replicas converged
//!
//! ## Canonicalization
//!
//! Edits are encoded using deterministic CBOR. See [`canonical`] module.

pub mod canonical;
pub mod cloner;
pub mod delta;
pub mod edit;
pub mod error;
pub mod fingerprint;
pub mod types;

pub use canonical::{decode_edit, encode_edit};
pub use cloner::{Cloner, DeepClone};
pub use delta::{Delta, DeltaEngine, JsonDiff};
pub use edit::Edit;
pub use error::{CodecError, PatchError};
pub use fingerprint::Fingerprint;
pub use types::DocId;
