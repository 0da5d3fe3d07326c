//! Golden test vectors for deterministic verification.
//!
//! These vectors pin the canonical CBOR encoding of edits, so any
//! implementation of the wire format produces byte-identical frames.

use std::collections::BTreeMap;

use serde_json::Value;

use shadowsync_core::{decode_edit, encode_edit, Delta, Edit};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// The edit to encode.
    pub edit: Edit<Delta>,
    /// Expected canonical encoding (hex).
    pub expected_hex: &'static str,
}

fn object(key: &str, delta: Delta) -> Delta {
    let mut fields = BTreeMap::new();
    fields.insert(key.to_string(), delta);
    Delta::Object(fields)
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "acknowledgment",
            edit: Edit::ack(0, 55),
            expected_hex: "a20000011837",
        },
        GoldenVector {
            name: "added key",
            edit: Edit::new(0, 0, object("bar", Delta::Added(Value::from(5)))),
            expected_hex: "a30000010002a1666f626a656374a163626172a165616464656405",
        },
        GoldenVector {
            name: "replaced scalar",
            edit: Edit::new(
                3,
                1,
                object(
                    "foo",
                    Delta::Replaced {
                        old: Value::from(123),
                        new: Value::from(5),
                    },
                ),
            ),
            expected_hex: "a30003010102a1666f626a656374a163666f6fa1687265706c61636564a2636e657705636f6c64187b",
        },
        GoldenVector {
            name: "array append",
            edit: Edit::new(1, 0, object("list", {
                let mut changes = BTreeMap::new();
                changes.insert(2, Delta::Added(Value::from(3)));
                Delta::Array {
                    old_len: 2,
                    new_len: 3,
                    changes,
                }
            })),
            expected_hex: "a30001010002a1666f626a656374a1646c697374a1656172726179a3676368616e676573a102a165616464656403676e65775f6c656e03676f6c645f6c656e02",
        },
        GoldenVector {
            name: "removed key",
            edit: Edit::new(0, 0, object("gone", Delta::Removed(Value::Bool(true)))),
            expected_hex: "a30000010002a1666f626a656374a164676f6e65a16772656d6f766564f5",
        },
    ]
}

/// Check every vector: encoding matches and decodes back to the edit.
///
/// Returns `(name, matches, actual_hex)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let (matches, hex) = match encode_edit(&v.edit) {
                Ok(bytes) => {
                    let hex = hex::encode(&bytes);
                    let decoded = decode_edit::<Delta>(&bytes).ok();
                    (hex == v.expected_hex && decoded.as_ref() == Some(&v.edit), hex)
                }
                Err(e) => (false, e.to_string()),
            };
            (v.name.to_string(), matches, hex)
        })
        .collect()
}
