//! Snapshotting of structured values.

/// Produces an independent, structurally equal copy of a value.
///
/// The shadow and backup snapshots held by a sync document are taken
/// through this trait so that neither ever shares storage with the live
/// canonical value.
pub trait Cloner<V> {
    /// Copy `value`.
    fn clone_value(&self, value: &V) -> V;
}

/// Deep copy through [`Clone`].
///
/// For owned trees such as `serde_json::Value`, `Clone` already copies
/// every node, so this is the cloner used by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeepClone;

impl<V: Clone> Cloner<V> for DeepClone {
    fn clone_value(&self, value: &V) -> V {
        value.clone()
    }
}
