//! # Shadowsync Testkit
//!
//! Testing utilities for shadowsync.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known edits with their expected canonical encoding
//! - **Generators**: Proptest strategies for documents and local mutations
//! - **Fixtures**: Lock-step document pairs with controllable message loss
//!
//! ## Golden Vectors
//!
//! Golden vectors pin the wire encoding across implementations:
//!
//! ```rust
//! use shadowsync_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, hex) in verify_all_vectors() {
//!     println!("{}: {} {}", name, matches, hex);
//! }
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use shadowsync_testkit::generators::{apply_all, json_document, Mutation};
//!
//! proptest! {
//!     #[test]
//!     fn mutations_stay_objects(doc in json_document(), m in any::<Mutation>()) {
//!         let mut doc = doc;
//!         apply_all(&mut doc, &[m]);
//!         prop_assert!(doc.is_object());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! Drive two replicas by hand:
//!
//! ```rust
//! use serde_json::json;
//! use shadowsync_testkit::fixtures::{Delivery, DocumentPair, Side};
//!
//! let mut pair = DocumentPair::new(json!({ "foo": 123 }));
//! pair.edit(Side::A, |v| v["bar"] = json!(5));
//! pair.send(Side::A, Delivery::Lose);
//! pair.round();
//! assert!(pair.values_match());
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{connected_transports, Delivery, DocumentPair, Side};
pub use generators::{apply_all, json_document, json_value, Mutation};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
