//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{Map, Value};

use shadowsync_core::{DocId, Edit};

/// Generate a random DocId.
pub fn doc_id() -> impl Strategy<Value = DocId> {
    any::<[u8; 32]>().prop_map(DocId::from_bytes)
}

/// Generate an object key from a small alphabet, so that mutations
/// collide with existing keys often.
pub fn key() -> impl Strategy<Value = String> {
    "[a-e]".prop_map(String::from)
}

/// Generate a JSON scalar.
///
/// Floats are limited to values that survive a JSON round trip.
pub fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        (-1_000_000i32..1_000_000i32).prop_map(|n| Value::from(f64::from(n) / 4.0)),
        "[a-z ]{0,12}".prop_map(Value::from),
    ]
}

/// Generate an arbitrary JSON value, nested up to `depth` levels.
pub fn json_value(depth: u32) -> impl Strategy<Value = Value> {
    json_leaf().prop_recursive(depth, 48, 5, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..5).prop_map(Value::Array),
            prop::collection::btree_map(key(), inner, 0..5)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Generate a JSON object, the usual shape of a synced document.
pub fn json_document() -> impl Strategy<Value = Value> {
    prop::collection::btree_map(key(), json_value(2), 0..6)
        .prop_map(|m| Value::Object(m.into_iter().collect()))
}

/// A local change a host might make to a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Set a top-level key.
    Set { key: String, value: Value },
    /// Remove a top-level key.
    Remove { key: String },
    /// Append to the array at a top-level key, creating it if needed.
    Append { key: String, value: Value },
    /// Set a key inside the object at a top-level key, creating it if needed.
    SetNested {
        key: String,
        field: String,
        value: Value,
    },
}

impl Mutation {
    /// Apply to a document. Non-object documents are replaced by `{}`.
    pub fn apply(&self, document: &mut Value) {
        if !document.is_object() {
            *document = Value::Object(Map::new());
        }
        let Some(object) = document.as_object_mut() else {
            return;
        };

        match self {
            Mutation::Set { key, value } => {
                object.insert(key.clone(), value.clone());
            }
            Mutation::Remove { key } => {
                object.remove(key);
            }
            Mutation::Append { key, value } => {
                let slot = object.entry(key.clone()).or_insert_with(|| Value::Array(Vec::new()));
                match slot {
                    Value::Array(items) => items.push(value.clone()),
                    other => *other = Value::Array(vec![value.clone()]),
                }
            }
            Mutation::SetNested { key, field, value } => {
                let slot = object.entry(key.clone()).or_insert_with(|| Value::Object(Map::new()));
                match slot {
                    Value::Object(fields) => {
                        fields.insert(field.clone(), value.clone());
                    }
                    other => {
                        let mut fields = Map::new();
                        fields.insert(field.clone(), value.clone());
                        *other = Value::Object(fields);
                    }
                }
            }
        }
    }
}

impl Arbitrary for Mutation {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            (key(), json_value(2)).prop_map(|(key, value)| Mutation::Set { key, value }),
            key().prop_map(|key| Mutation::Remove { key }),
            (key(), json_leaf()).prop_map(|(key, value)| Mutation::Append { key, value }),
            (key(), key(), json_leaf())
                .prop_map(|(key, field, value)| Mutation::SetNested { key, field, value }),
        ]
        .boxed()
    }
}

/// Apply a sequence of mutations in order.
pub fn apply_all(document: &mut Value, mutations: &[Mutation]) {
    for mutation in mutations {
        mutation.apply(document);
    }
}

/// Generate a pure acknowledgment.
pub fn ack_edit<D: std::fmt::Debug>() -> impl Strategy<Value = Edit<D>> {
    (any::<u64>(), any::<u64>()).prop_map(|(version, other_version)| Edit::ack(version, other_version))
}
