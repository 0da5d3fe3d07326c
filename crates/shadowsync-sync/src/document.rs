//! The per-document synchronization state machine.
//!
//! A [`SyncDocument`] owns four pieces of state:
//!
//! - the **canonical** value, mutated freely by the host;
//! - the **shadow**, the last state exchanged with the peer, with its own
//!   `version` (local snapshots taken) and `other_version` (peer edits
//!   incorporated);
//! - the **backup**, the shadow as it was right before the latest push;
//! - the **outgoing queue** of edits the peer has not acknowledged yet.
//!
//! ## Transitions
//!
//! ```text
//! push()           diff(shadow, canonical) -> queue edit, shadow := canonical, version += 1
//! pull(ack)        acknowledge(ack.other_version)
//! pull(stale)      ignore (already incorporated)
//! pull(misaligned) rollback: clear queue, shadow := backup, pull again
//! pull(aligned)    patch shadow, patch canonical (or corrective push), acknowledge
//! ```
//!
//! None of these transitions fail. Every anomaly is absorbed and turned
//! into a corrective action; [`PullOutcome`] reports which one was taken.
//!
//! ## Limitation
//!
//! The backup holds a single step of history, so a rollback recovers from
//! exactly one lost round. If more consecutive edits are lost the
//! restored shadow is still misaligned; the inbound edit is then dropped
//! and the outcome is [`PullOutcome::Desynchronized`]. The replicas may
//! silently diverge from that point on.

use std::collections::VecDeque;

use serde_json::Value;
use shadowsync_core::{Cloner, DeepClone, Delta, DeltaEngine, Edit, JsonDiff};

/// The local record of what was last exchanged with the peer.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowState<V> {
    /// Number of local snapshots taken.
    pub version: u64,
    /// Number of peer edits incorporated.
    pub other_version: u64,
    /// The snapshot itself.
    pub object: V,
}

/// The shadow immediately preceding the most recent push.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupState<V> {
    pub version: u64,
    pub object: V,
}

/// What [`SyncDocument::pull`] did with an inbound edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    /// Pure acknowledgment; `removed` queued edits were confirmed.
    Acknowledged { removed: usize },
    /// The edit was already incorporated.
    Stale,
    /// The delta was applied to both shadow and canonical.
    Applied,
    /// The delta was applied to the shadow only; canonical had diverged,
    /// so a corrective edit overwriting the peer's change was queued.
    Overridden,
    /// The peer missed our last push; the shadow was restored from the
    /// backup and the edit was processed again.
    RolledBack(Box<PullOutcome>),
    /// Versions could not be reconciled; the edit was dropped.
    Desynchronized,
}

impl PullOutcome {
    /// Whether the edit changed the canonical value or the shadow.
    pub fn is_applied(&self) -> bool {
        match self {
            PullOutcome::Applied | PullOutcome::Overridden => true,
            PullOutcome::RolledBack(inner) => inner.is_applied(),
            _ => false,
        }
    }

    /// Whether the edit had already been seen.
    pub fn is_stale(&self) -> bool {
        matches!(self, PullOutcome::Stale)
    }

    /// Whether version bookkeeping was lost.
    pub fn is_desynchronized(&self) -> bool {
        match self {
            PullOutcome::Desynchronized => true,
            PullOutcome::RolledBack(inner) => inner.is_desynchronized(),
            _ => false,
        }
    }
}

/// One replica of a synchronized document.
///
/// Not internally synchronized: every operation takes `&mut self`. Share
/// it through [`crate::DocumentHandle`] when several tasks need access.
pub struct SyncDocument<E: DeltaEngine, C = DeepClone> {
    engine: E,
    cloner: C,
    object: E::Value,
    shadow: ShadowState<E::Value>,
    backup: BackupState<E::Value>,
    edits: VecDeque<Edit<E::Delta>>,
}

/// A sync document over JSON values.
pub type JsonDocument = SyncDocument<JsonDiff>;

impl<E, C> SyncDocument<E, C>
where
    E: DeltaEngine + Default,
    C: Cloner<E::Value> + Default,
{
    /// Create a document from its initial canonical value.
    ///
    /// Shadow and backup start as independent copies at version 0.
    pub fn new(object: E::Value) -> Self {
        Self::with_engine(E::default(), C::default(), object)
    }
}

impl<E, C> SyncDocument<E, C>
where
    E: DeltaEngine,
    C: Cloner<E::Value>,
{
    /// Create a document with explicit engine and cloner instances.
    pub fn with_engine(engine: E, cloner: C, object: E::Value) -> Self {
        let shadow = ShadowState {
            version: 0,
            other_version: 0,
            object: cloner.clone_value(&object),
        };
        let backup = BackupState {
            version: 0,
            object: cloner.clone_value(&object),
        };

        Self {
            engine,
            cloner,
            object,
            shadow,
            backup,
            edits: VecDeque::new(),
        }
    }

    /// The canonical value.
    pub fn value(&self) -> &E::Value {
        &self.object
    }

    /// Mutable access to the canonical value.
    ///
    /// Changes are picked up by the next [`push`](Self::push).
    pub fn value_mut(&mut self) -> &mut E::Value {
        &mut self.object
    }

    /// Consume the document, returning the canonical value.
    pub fn into_value(self) -> E::Value {
        self.object
    }

    pub fn shadow(&self) -> &ShadowState<E::Value> {
        &self.shadow
    }

    pub fn backup(&self) -> &BackupState<E::Value> {
        &self.backup
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Edits not yet acknowledged by the peer, oldest first.
    pub fn outgoing(&self) -> impl Iterator<Item = &Edit<E::Delta>> + '_ {
        self.edits.iter()
    }

    /// Number of edits not yet acknowledged by the peer.
    pub fn pending(&self) -> usize {
        self.edits.len()
    }

    /// Whether the canonical value has changes not yet pushed.
    pub fn is_dirty(&self) -> bool {
        self.engine.diff(&self.shadow.object, &self.object).is_some()
    }

    /// Highest peer edit count incorporated, to embed in acknowledgments.
    pub fn receipt(&self) -> u64 {
        self.shadow.other_version
    }

    /// Build a pure acknowledgment for the peer edits incorporated so far.
    ///
    /// Returns `None` until at least one peer edit was incorporated. The
    /// acknowledged version is the last incorporated edit's own version,
    /// so the peer never drops an edit it has not delivered yet.
    pub fn ack_edit(&self) -> Option<Edit<E::Delta>> {
        self.shadow
            .other_version
            .checked_sub(1)
            .map(|last| Edit::ack(self.shadow.version, last))
    }

    /// Snapshot local changes into the outgoing queue.
    ///
    /// Returns `true` if an edit was queued. Without changes this is a
    /// no-op.
    pub fn push(&mut self) -> bool {
        let delta = match self.engine.diff(&self.shadow.object, &self.object) {
            Some(delta) => delta,
            None => return false,
        };

        let edit = Edit::new(self.shadow.version, self.shadow.other_version, delta);

        let snapshot = self.cloner.clone_value(&self.object);
        let previous = std::mem::replace(&mut self.shadow.object, snapshot);
        self.backup = BackupState {
            version: self.shadow.version,
            object: previous,
        };
        self.shadow.version += 1;

        tracing::debug!(
            version = edit.version,
            other_version = edit.other_version,
            pending = self.edits.len() + 1,
            "queued local edit"
        );
        self.edits.push_back(edit);
        true
    }

    /// Process an inbound edit from the peer.
    pub fn pull(&mut self, edit: &Edit<E::Delta>) -> PullOutcome {
        self.pull_inner(edit, true)
    }

    /// Drop every queued edit with `version <= version`.
    ///
    /// Returns the number of edits removed.
    pub fn acknowledge(&mut self, version: u64) -> usize {
        let before = self.edits.len();
        self.edits.retain(|e| e.version > version);
        before - self.edits.len()
    }

    /// Discard the outgoing queue, restore the shadow from the backup and
    /// process `edit` against the restored shadow.
    ///
    /// The shadow's `other_version` is kept: peer edits already counted
    /// stay counted.
    pub fn rollback(&mut self, edit: &Edit<E::Delta>) -> PullOutcome {
        let discarded = self.edits.len();
        self.edits.clear();
        self.shadow.object = self.cloner.clone_value(&self.backup.object);
        self.shadow.version = self.backup.version;

        tracing::warn!(
            restored_version = self.shadow.version,
            discarded,
            edit_version = edit.version,
            edit_other_version = edit.other_version,
            "peer missed local edits, rolled back shadow"
        );

        PullOutcome::RolledBack(Box::new(self.pull_inner(edit, false)))
    }

    fn pull_inner(&mut self, edit: &Edit<E::Delta>, may_rollback: bool) -> PullOutcome {
        let delta = match &edit.delta {
            Some(delta) => delta,
            None => {
                let removed = self.acknowledge(edit.other_version);
                return PullOutcome::Acknowledged { removed };
            }
        };

        if edit.version < self.shadow.other_version {
            tracing::trace!(
                edit_version = edit.version,
                other_version = self.shadow.other_version,
                "ignoring already incorporated edit"
            );
            return PullOutcome::Stale;
        }

        if edit.other_version != self.shadow.version {
            if may_rollback {
                return self.rollback(edit);
            }
            tracing::warn!(
                shadow_version = self.shadow.version,
                edit_other_version = edit.other_version,
                "versions still misaligned after rollback, dropping edit"
            );
            return PullOutcome::Desynchronized;
        }

        let Some(other_version) = edit.version.checked_add(1) else {
            tracing::warn!(edit_version = edit.version, "edit version out of range, dropping edit");
            return PullOutcome::Desynchronized;
        };

        if let Err(e) = self.engine.patch(&mut self.shadow.object, delta) {
            tracing::warn!(error = %e, "aligned edit does not apply to shadow, dropping edit");
            return PullOutcome::Desynchronized;
        }
        self.shadow.other_version = other_version;

        let outcome = match self.engine.patch(&mut self.object, delta) {
            Ok(()) => PullOutcome::Applied,
            Err(e) => {
                tracing::debug!(error = %e, "canonical diverged from shadow, overriding peer edit");
                PullOutcome::Overridden
            }
        };

        // Acknowledge before the corrective push: the corrective edit's
        // version equals edit.other_version and must stay queued.
        self.acknowledge(edit.other_version);
        if outcome == PullOutcome::Overridden {
            self.push();
        }

        tracing::debug!(
            edit_version = edit.version,
            other_version = self.shadow.other_version,
            pending = self.edits.len(),
            "incorporated peer edit"
        );
        outcome
    }
}

impl<C> SyncDocument<JsonDiff, C>
where
    C: Cloner<Value>,
{
    /// Number of leaf changes queued for the peer.
    pub fn pending_changes(&self) -> usize {
        self.edits
            .iter()
            .filter_map(|e| e.delta.as_ref())
            .map(Delta::leaf_count)
            .sum()
    }
}

impl<E, C> std::fmt::Debug for SyncDocument<E, C>
where
    E: DeltaEngine,
    E::Value: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncDocument")
            .field("object", &self.object)
            .field("shadow_version", &self.shadow.version)
            .field("other_version", &self.shadow.other_version)
            .field("backup_version", &self.backup.version)
            .field("pending", &self.edits.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn queued(doc: &JsonDocument) -> Vec<Edit<Delta>> {
        doc.outgoing().cloned().collect()
    }

    fn edit_at(version: u64) -> Edit<Delta> {
        Edit::new(version, 0, Delta::Added(json!(version)))
    }

    #[test]
    fn test_new_document_copies_into_shadow_and_backup() {
        let doc = JsonDocument::new(json!({ "foo": 123 }));

        assert_eq!(doc.value(), &json!({ "foo": 123 }));
        assert_eq!(doc.shadow().object, json!({ "foo": 123 }));
        assert_eq!(doc.backup().object, json!({ "foo": 123 }));
        assert_eq!(doc.shadow().version, 0);
        assert_eq!(doc.shadow().other_version, 0);
        assert_eq!(doc.backup().version, 0);
        assert_eq!(doc.pending(), 0);

        // Distinct storage, not just equal contents.
        assert!(!std::ptr::eq(doc.value(), &doc.shadow().object));
        assert!(!std::ptr::eq(&doc.shadow().object, &doc.backup().object));
    }

    #[test]
    fn test_shadow_does_not_alias_canonical() {
        let mut doc = JsonDocument::new(json!({ "foo": 123 }));
        doc.value_mut()["foo"] = json!(5);
        assert_eq!(doc.shadow().object, json!({ "foo": 123 }));
        assert_eq!(doc.backup().object, json!({ "foo": 123 }));
    }

    #[test]
    fn test_push_without_changes_is_noop() {
        let mut doc = JsonDocument::new(json!({ "foo": 123 }));
        assert!(!doc.push());
        assert!(!doc.push());

        assert_eq!(doc.value(), &json!({ "foo": 123 }));
        assert_eq!(doc.shadow().object, json!({ "foo": 123 }));
        assert_eq!(doc.shadow().version, 0);
        assert_eq!(doc.shadow().other_version, 0);
        assert_eq!(doc.pending(), 0);
    }

    #[test]
    fn test_push_queues_edit_against_shadow() {
        let mut doc = JsonDocument::new(json!({ "foo": 123 }));
        doc.value_mut()["foo"] = json!(5);
        assert!(doc.is_dirty());

        let expected_delta = JsonDiff
            .diff(&json!({ "foo": 123 }), &json!({ "foo": 5 }))
            .unwrap();
        assert!(doc.push());

        assert_eq!(queued(&doc), vec![Edit::new(0, 0, expected_delta)]);
        assert_eq!(doc.shadow().object, json!({ "foo": 5 }));
        assert_eq!(doc.shadow().version, 1);
        assert_eq!(doc.shadow().other_version, 0);
        assert_eq!(doc.pending_changes(), 1);
        assert!(!doc.is_dirty());
    }

    #[test]
    fn test_push_backs_up_previous_shadow() {
        let mut doc = JsonDocument::new(json!({ "foo": 123 }));
        doc.value_mut()["foo"] = json!(5);
        doc.push();
        assert_eq!(doc.backup().object, json!({ "foo": 123 }));
        assert_eq!(doc.backup().version, 0);

        doc.value_mut()["foo"] = json!(6);
        doc.push();
        assert_eq!(doc.backup().object, json!({ "foo": 5 }));
        assert_eq!(doc.backup().version, 1);
        assert_eq!(doc.shadow().version, 2);
        assert_eq!(doc.pending(), 2);
    }

    #[test]
    fn test_acknowledge_keeps_newer_edits_in_order() {
        let mut doc = JsonDocument::new(json!({}));
        doc.edits = (0..5).map(edit_at).collect();

        assert_eq!(doc.acknowledge(2), 3);
        let versions: Vec<u64> = doc.outgoing().map(|e| e.version).collect();
        assert_eq!(versions, vec![3, 4]);

        assert_eq!(doc.acknowledge(1), 0);
        assert_eq!(doc.pending(), 2);
    }

    #[test]
    fn test_pull_applies_edit_to_shadow_and_canonical() {
        let mut a = JsonDocument::new(json!({ "foo": 123 }));
        let mut b = JsonDocument::new(json!({ "foo": 123 }));

        a.value_mut()["bar"] = json!(5);
        a.push();
        let edits = queued(&a);
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].version, 0);
        assert_eq!(edits[0].other_version, 0);

        assert_eq!(b.pull(&edits[0]), PullOutcome::Applied);
        assert_eq!(b.value(), &json!({ "foo": 123, "bar": 5 }));
        assert_eq!(b.shadow().object, json!({ "foo": 123, "bar": 5 }));
        assert_eq!(b.shadow().version, 0);
        assert_eq!(b.shadow().other_version, 1);
        assert_eq!(b.receipt(), 1);
    }

    #[test]
    fn test_pull_ack_only_acknowledges() {
        let mut doc = JsonDocument::new(json!({ "foo": 123 }));
        doc.edits = (0..3).map(edit_at).collect();
        let shadow_before = doc.shadow().clone();
        let backup_before = doc.backup().clone();

        let outcome = doc.pull(&Edit::ack(9, 1));

        assert_eq!(outcome, PullOutcome::Acknowledged { removed: 2 });
        assert_eq!(doc.outgoing().map(|e| e.version).collect::<Vec<_>>(), vec![2]);
        assert_eq!(doc.shadow(), &shadow_before);
        assert_eq!(doc.backup(), &backup_before);
        assert_eq!(doc.value(), &json!({ "foo": 123 }));
    }

    #[test]
    fn test_pull_stale_edit_is_ignored() {
        let mut doc = JsonDocument::new(json!({ "foo": 123 }));
        doc.value_mut()["foo"] = json!(5);
        doc.push();
        doc.value_mut()["foo"] = json!(6);
        doc.push();
        doc.shadow.other_version = 2;

        let queue_before = queued(&doc);
        let shadow_before = doc.shadow().clone();
        let backup_before = doc.backup().clone();

        let outcome = doc.pull(&Edit::new(1, 2, Delta::Object(Default::default())));

        assert_eq!(outcome, PullOutcome::Stale);
        assert_eq!(queued(&doc), queue_before);
        assert_eq!(doc.pending(), 2);
        assert_eq!(doc.shadow(), &shadow_before);
        assert_eq!(doc.backup(), &backup_before);
        assert_eq!(doc.value(), &json!({ "foo": 6 }));
    }

    #[test]
    fn test_pull_max_version_is_dropped() {
        let mut doc = JsonDocument::new(json!({}));
        let delta = JsonDiff.diff(&json!({}), &json!({ "x": 1 })).unwrap();

        let outcome = doc.pull(&Edit::new(u64::MAX, 0, delta));

        assert_eq!(outcome, PullOutcome::Desynchronized);
        assert_eq!(doc.receipt(), 0);
        assert_eq!(doc.shadow().object, json!({}));
        assert_eq!(doc.value(), &json!({}));
    }

    #[test]
    fn test_pull_oversized_array_is_dropped() {
        let mut doc = JsonDocument::new(json!([]));
        let delta = Delta::Array {
            old_len: 0,
            new_len: usize::MAX,
            changes: Default::default(),
        };

        assert_eq!(doc.pull(&Edit::new(0, 0, delta)), PullOutcome::Desynchronized);
        assert_eq!(doc.receipt(), 0);
        assert_eq!(doc.value(), &json!([]));
    }

    #[test]
    fn test_pull_duplicate_is_ignored() {
        let mut a = JsonDocument::new(json!({ "n": 0 }));
        let mut b = JsonDocument::new(json!({ "n": 0 }));
        a.value_mut()["n"] = json!(1);
        a.push();
        let edit = queued(&a).remove(0);

        assert_eq!(b.pull(&edit), PullOutcome::Applied);
        b.value_mut()["n"] = json!(7);
        assert_eq!(b.pull(&edit), PullOutcome::Stale);
        assert_eq!(b.value(), &json!({ "n": 7 }));
        assert_eq!(b.receipt(), 1);
    }

    #[test]
    fn test_pull_misaligned_rolls_back_once() {
        let mut doc = JsonDocument::new(json!({ "foo": 123 }));
        doc.value_mut()["foo"] = json!(5);
        doc.push();
        assert_eq!(doc.shadow().version, 1);
        assert_eq!(doc.pending(), 1);

        // The peer never saw our push: it still expects version 0.
        let peer_delta = JsonDiff
            .diff(&json!({ "foo": 123 }), &json!({ "foo": 123, "baz": true }))
            .unwrap();
        let outcome = doc.pull(&Edit::new(0, 0, peer_delta));

        assert_eq!(outcome, PullOutcome::RolledBack(Box::new(PullOutcome::Applied)));
        assert_eq!(doc.pending(), 0);
        assert_eq!(doc.shadow().version, 0);
        assert_eq!(doc.shadow().other_version, 1);
        assert_eq!(doc.shadow().object, json!({ "foo": 123, "baz": true }));
        assert_eq!(doc.value(), &json!({ "foo": 5, "baz": true }));

        // The lost local change is still pending in canonical.
        assert!(doc.is_dirty());
        doc.push();
        let resent = queued(&doc);
        assert_eq!(resent.len(), 1);
        assert_eq!(resent[0].version, 0);
        assert_eq!(resent[0].other_version, 1);
    }

    #[test]
    fn test_rollback_without_backup_step_desynchronizes() {
        let mut doc = JsonDocument::new(json!({}));
        // Peer claims to have seen versions we never produced.
        let outcome = doc.pull(&Edit::new(0, 3, Delta::Object(Default::default())));
        assert_eq!(
            outcome,
            PullOutcome::RolledBack(Box::new(PullOutcome::Desynchronized))
        );
        assert!(outcome.is_desynchronized());
        assert_eq!(doc.receipt(), 0);
    }

    #[test]
    fn test_diverged_canonical_is_overridden() {
        let mut a = JsonDocument::new(json!({ "list": [1, 2] }));
        let mut b = JsonDocument::new(json!({ "list": [1, 2] }));

        a.value_mut()["list"] = json!([1, 2, 3]);
        a.push();
        // Local edit on b that the peer delta cannot be applied to.
        b.value_mut()["list"] = json!([9]);

        let outcome = b.pull(&queued(&a)[0]);
        assert_eq!(outcome, PullOutcome::Overridden);
        assert_eq!(b.shadow().object, json!({ "list": [1, 2, 3] }));
        assert_eq!(b.value(), &json!({ "list": [9] }));

        // The corrective edit stays queued even though it carries the
        // version that was just acknowledged.
        let corrective = queued(&b);
        assert_eq!(corrective.len(), 1);
        assert_eq!(corrective[0].version, 0);
        assert_eq!(corrective[0].other_version, 1);

        assert_eq!(a.pull(&corrective[0]), PullOutcome::Applied);
        assert_eq!(a.value(), &json!({ "list": [9] }));
        assert_eq!(a.value(), b.value());
        assert_eq!(a.pending(), 0);
    }

    #[test]
    fn test_aligned_edit_acknowledges_queue() {
        let mut a = JsonDocument::new(json!({}));
        let mut b = JsonDocument::new(json!({}));

        a.value_mut()["x"] = json!(1);
        a.push();
        b.pull(&queued(&a)[0]);

        b.value_mut()["y"] = json!(2);
        b.push();
        let reply = queued(&b).remove(0);
        assert_eq!(reply.other_version, 1);

        assert_eq!(a.pull(&reply), PullOutcome::Applied);
        assert_eq!(a.pending(), 0);
        assert_eq!(a.value(), &json!({ "x": 1, "y": 2 }));
    }

    #[test]
    fn test_ack_edit_confirms_last_incorporated() {
        let mut a = JsonDocument::new(json!({}));
        let mut b = JsonDocument::new(json!({}));
        assert!(b.ack_edit().is_none());

        a.value_mut()["x"] = json!(1);
        a.push();
        b.pull(&queued(&a)[0]);

        // a pushes again before hearing back.
        a.value_mut()["x"] = json!(2);
        a.push();

        let ack = b.ack_edit().unwrap();
        assert!(ack.is_ack());
        assert_eq!(ack.other_version, 0);

        assert_eq!(a.pull(&ack), PullOutcome::Acknowledged { removed: 1 });
        assert_eq!(a.outgoing().map(|e| e.version).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_concurrent_pushes_converge_after_one_cycle() {
        let mut a = JsonDocument::new(json!({ "x": 1 }));
        let mut b = JsonDocument::new(json!({ "x": 1 }));

        a.value_mut()["a"] = json!(1);
        a.push();
        b.value_mut()["b"] = json!(2);
        b.push();

        let from_a = queued(&a);
        let from_b = queued(&b);

        let outcome = b.pull(&from_a[0]);
        assert_eq!(outcome, PullOutcome::RolledBack(Box::new(PullOutcome::Applied)));
        let outcome = a.pull(&from_b[0]);
        assert_eq!(outcome, PullOutcome::RolledBack(Box::new(PullOutcome::Applied)));

        // One more push/pull cycle.
        a.push();
        b.push();
        for edit in queued(&a) {
            b.pull(&edit);
        }
        for edit in queued(&b) {
            a.pull(&edit);
        }

        let expected = json!({ "x": 1, "a": 1, "b": 2 });
        assert_eq!(a.value(), &expected);
        assert_eq!(b.value(), &expected);
        assert_eq!(a.shadow().object, b.shadow().object);
        assert!(!a.is_dirty());
        assert!(!b.is_dirty());
    }

    #[test]
    fn test_two_consecutive_losses_diverge() {
        let mut a = JsonDocument::new(json!({}));
        let mut b = JsonDocument::new(json!({}));

        // Two pushes from a, both lost in transit.
        a.value_mut()["a"] = json!(1);
        a.push();
        a.value_mut()["a2"] = json!(1);
        a.push();
        assert_eq!(a.shadow().version, 2);

        b.value_mut()["b"] = json!(1);
        b.push();

        // The backup only reaches back one step.
        let outcome = a.pull(&queued(&b)[0]);
        assert_eq!(
            outcome,
            PullOutcome::RolledBack(Box::new(PullOutcome::Desynchronized))
        );
        assert_eq!(a.pending(), 0);
        assert_eq!(a.shadow().version, 1);
        assert_eq!(a.receipt(), 0);

        a.push();
        let outcome = b.pull(&queued(&a)[0]);
        assert_eq!(outcome, PullOutcome::RolledBack(Box::new(PullOutcome::Applied)));

        b.push();
        assert_eq!(a.pull(&queued(&b)[0]), PullOutcome::Applied);

        // Nothing left to send, versions in lockstep, yet "a" never
        // reached b.
        assert!(!a.push());
        assert!(!b.push());
        assert_eq!(a.shadow().version, b.receipt());
        assert_eq!(b.shadow().version, a.receipt());
        assert_eq!(a.value(), &json!({ "a": 1, "a2": 1, "b": 1 }));
        assert_eq!(b.value(), &json!({ "a2": 1, "b": 1 }));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        struct Round {
            key: usize,
            value: Option<i32>,
            lose_edits: bool,
            lose_ack: bool,
            duplicate: bool,
        }

        fn round() -> impl Strategy<Value = Round> {
            (
                0..3usize,
                proptest::option::of(any::<i32>()),
                any::<bool>(),
                any::<bool>(),
                any::<bool>(),
            )
                .prop_map(|(key, value, lose_edits, lose_ack, duplicate)| Round {
                    key,
                    value,
                    lose_edits,
                    lose_ack,
                    duplicate,
                })
        }

        fn deliver(from: &JsonDocument, to: &mut JsonDocument, copies: usize) {
            let edits = queued(from);
            for _ in 0..copies {
                for edit in &edits {
                    to.pull(edit);
                }
            }
        }

        proptest! {
            /// A single writer converges under arbitrary loss and
            /// duplication as long as the queue is eventually delivered.
            #[test]
            fn prop_single_writer_converges(rounds in prop::collection::vec(round(), 1..24)) {
                let keys = ["a", "b", "c"];
                let mut a = JsonDocument::new(json!({}));
                let mut b = JsonDocument::new(json!({}));

                for r in &rounds {
                    let object = a.value_mut().as_object_mut().unwrap();
                    match r.value {
                        Some(v) => { object.insert(keys[r.key].to_string(), json!(v)); }
                        None => { object.remove(keys[r.key]); }
                    }
                    a.push();

                    if !r.lose_edits {
                        deliver(&a, &mut b, if r.duplicate { 2 } else { 1 });
                    }
                    prop_assert!(!b.push());
                    if let (Some(ack), false) = (b.ack_edit(), r.lose_ack) {
                        let outcome = a.pull(&ack);
                        prop_assert!(
                            matches!(outcome, PullOutcome::Acknowledged { .. }),
                            "unexpected outcome {:?}",
                            outcome
                        );
                    }
                }

                deliver(&a, &mut b, 1);
                if let Some(ack) = b.ack_edit() {
                    a.pull(&ack);
                }

                prop_assert_eq!(a.value(), b.value());
                prop_assert_eq!(a.pending(), 0);
                prop_assert_eq!(b.receipt(), a.shadow().version);
            }
        }
    }

    #[test]
    fn test_outcome_helpers() {
        let rolled = PullOutcome::RolledBack(Box::new(PullOutcome::Overridden));
        assert!(rolled.is_applied());
        assert!(!rolled.is_desynchronized());
        assert!(PullOutcome::Stale.is_stale());
        assert!(!PullOutcome::Acknowledged { removed: 0 }.is_applied());
    }
}
