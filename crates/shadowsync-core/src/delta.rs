//! Structural diff and patch over JSON values.
//!
//! The synchronization protocol treats deltas as opaque: it only needs a
//! [`DeltaEngine`] that can compute the difference between two values and
//! replay it onto a third. [`JsonDiff`] is the engine shipped with the
//! crate, operating on [`serde_json::Value`] trees.
//!
//! ## Delta shape
//!
//! - Objects diff key by key; a key maps to `Added`, `Removed`, `Replaced`
//!   or a nested delta.
//! - Arrays diff index by index. Common indices carry nested deltas, the
//!   grown tail is `Added`, the truncated tail is `Removed`. There is no
//!   move detection: inserting at the front rewrites every later index.
//! - Any other change (including a change of type) is `Replaced`.
//!
//! ## Patch strictness
//!
//! Patching is all-or-nothing. It fails when the delta's structural
//! assumptions do not hold for the target: wrong container type, an
//! `Added` key that already exists, a missing key, or an array whose
//! length differs from the one the delta was computed against. Leaf
//! values are overwritten without comparing them to `old`, so concurrent
//! scalar edits resolve to the last writer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PatchError;

/// Computes and applies structural deltas between values.
pub trait DeltaEngine {
    /// The structured value being synchronized.
    type Value;
    /// The delta representation exchanged between peers.
    type Delta;

    /// Compute the delta that turns `from` into `to`.
    ///
    /// Returns `None` iff the two values are structurally equal.
    fn diff(&self, from: &Self::Value, to: &Self::Value) -> Option<Self::Delta>;

    /// Apply `delta` to `value` in place.
    ///
    /// On error `value` is left untouched.
    fn patch(&self, value: &mut Self::Value, delta: &Self::Delta) -> Result<(), PatchError>;
}

/// A structural difference between two JSON values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delta {
    /// A key or array slot that did not exist before.
    Added(Value),
    /// A key or array slot that no longer exists.
    Removed(Value),
    /// A value overwritten wholesale.
    Replaced { old: Value, new: Value },
    /// Per-key changes inside an object.
    Object(BTreeMap<String, Delta>),
    /// Per-index changes inside an array.
    Array {
        old_len: usize,
        new_len: usize,
        changes: BTreeMap<usize, Delta>,
    },
}

impl Delta {
    /// Number of leaf changes (added, removed or replaced values).
    pub fn leaf_count(&self) -> usize {
        match self {
            Delta::Added(_) | Delta::Removed(_) | Delta::Replaced { .. } => 1,
            Delta::Object(fields) => fields.values().map(Delta::leaf_count).sum(),
            Delta::Array { changes, .. } => changes.values().map(Delta::leaf_count).sum(),
        }
    }
}

/// The JSON delta engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonDiff;

impl DeltaEngine for JsonDiff {
    type Value = Value;
    type Delta = Delta;

    fn diff(&self, from: &Value, to: &Value) -> Option<Delta> {
        diff_values(from, to)
    }

    fn patch(&self, value: &mut Value, delta: &Delta) -> Result<(), PatchError> {
        let mut scratch = value.clone();
        let mut path = Vec::new();
        apply(&mut scratch, delta, &mut path)?;
        *value = scratch;
        Ok(())
    }
}

fn diff_values(from: &Value, to: &Value) -> Option<Delta> {
    if from == to {
        return None;
    }

    match (from, to) {
        (Value::Object(a), Value::Object(b)) => diff_objects(a, b),
        (Value::Array(a), Value::Array(b)) => Some(diff_arrays(a, b)),
        _ => Some(Delta::Replaced {
            old: from.clone(),
            new: to.clone(),
        }),
    }
}

fn diff_objects(from: &Map<String, Value>, to: &Map<String, Value>) -> Option<Delta> {
    let mut fields = BTreeMap::new();

    for (key, old) in from {
        match to.get(key) {
            Some(new) => {
                if let Some(change) = diff_values(old, new) {
                    fields.insert(key.clone(), change);
                }
            }
            None => {
                fields.insert(key.clone(), Delta::Removed(old.clone()));
            }
        }
    }

    for (key, new) in to {
        if !from.contains_key(key) {
            fields.insert(key.clone(), Delta::Added(new.clone()));
        }
    }

    if fields.is_empty() {
        None
    } else {
        Some(Delta::Object(fields))
    }
}

fn diff_arrays(from: &[Value], to: &[Value]) -> Delta {
    let common = from.len().min(to.len());
    let mut changes = BTreeMap::new();

    for (index, (old, new)) in from.iter().zip(to).enumerate() {
        if let Some(change) = diff_values(old, new) {
            changes.insert(index, change);
        }
    }
    for (index, new) in to.iter().enumerate().skip(common) {
        changes.insert(index, Delta::Added(new.clone()));
    }
    for (index, old) in from.iter().enumerate().skip(common) {
        changes.insert(index, Delta::Removed(old.clone()));
    }

    Delta::Array {
        old_len: from.len(),
        new_len: to.len(),
        changes,
    }
}

fn apply(target: &mut Value, delta: &Delta, path: &mut Vec<String>) -> Result<(), PatchError> {
    match delta {
        Delta::Replaced { new, .. } => {
            *target = new.clone();
            Ok(())
        }
        Delta::Object(fields) => {
            let found = kind(target);
            let map = target.as_object_mut().ok_or_else(|| PatchError::TypeMismatch {
                path: pointer(path),
                expected: "object",
                found,
            })?;

            for (key, change) in fields {
                path.push(key.clone());
                apply_field(map, key, change, path)?;
                path.pop();
            }
            Ok(())
        }
        Delta::Array {
            old_len,
            new_len,
            changes,
        } => {
            let found = kind(target);
            let items = target.as_array_mut().ok_or_else(|| PatchError::TypeMismatch {
                path: pointer(path),
                expected: "array",
                found,
            })?;
            apply_array(items, *old_len, *new_len, changes, path)
        }
        Delta::Added(_) | Delta::Removed(_) => Err(PatchError::Malformed {
            path: pointer(path),
            reason: "insertion or removal outside of a container",
        }),
    }
}

fn apply_field(
    map: &mut Map<String, Value>,
    key: &str,
    change: &Delta,
    path: &mut Vec<String>,
) -> Result<(), PatchError> {
    match change {
        Delta::Added(value) => {
            if map.contains_key(key) {
                return Err(PatchError::AlreadyPresent(pointer(path)));
            }
            map.insert(key.to_owned(), value.clone());
            Ok(())
        }
        Delta::Removed(_) => map
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| PatchError::Missing(pointer(path))),
        nested => {
            let slot = map
                .get_mut(key)
                .ok_or_else(|| PatchError::Missing(pointer(path)))?;
            apply(slot, nested, path)
        }
    }
}

fn apply_array(
    items: &mut Vec<Value>,
    old_len: usize,
    new_len: usize,
    changes: &BTreeMap<usize, Delta>,
    path: &mut Vec<String>,
) -> Result<(), PatchError> {
    if items.len() != old_len {
        return Err(PatchError::LengthMismatch {
            path: pointer(path),
            expected: old_len,
            found: items.len(),
        });
    }

    // Every appended slot needs its own insertion.
    if new_len.saturating_sub(old_len) > changes.len() {
        return Err(PatchError::Malformed {
            path: pointer(path),
            reason: "array growth without matching insertions",
        });
    }

    let common = old_len.min(new_len);
    let mut appended = Vec::new();

    for (&index, change) in changes {
        path.push(index.to_string());
        match change {
            _ if index < common => apply(&mut items[index], change, path)?,
            Delta::Removed(_) if index < old_len => {}
            Delta::Added(value) if index >= old_len && index < new_len => {
                appended.push(value.clone());
            }
            _ => {
                return Err(PatchError::Malformed {
                    path: pointer(path),
                    reason: "array change outside of the resized range",
                });
            }
        }
        path.pop();
    }

    if appended.len() != new_len.saturating_sub(old_len) {
        return Err(PatchError::Malformed {
            path: pointer(path),
            reason: "array growth without matching insertions",
        });
    }

    items.truncate(new_len);
    items.extend(appended);
    Ok(())
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Render a path as a JSON pointer (RFC 6901).
fn pointer(path: &[String]) -> String {
    path.iter()
        .map(|segment| format!("/{}", segment.replace('~', "~0").replace('/', "~1")))
        .collect()
}
