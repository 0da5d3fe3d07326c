//! Convergence verification for sync protocol.
//!
//! Two replicas can verify they converged by exchanging a small
//! [`DocumentSummary`] instead of the whole document: a fingerprint of
//! the canonical value plus the version counters.

use shadowsync_core::{Cloner, DocId, Fingerprint, JsonDiff};

use crate::document::SyncDocument;
use crate::error::Result;

/// Snapshot of a replica's sync state, cheap to ship to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentSummary {
    pub doc_id: DocId,
    /// Fingerprint of the canonical value.
    pub fingerprint: Fingerprint,
    pub version: u64,
    pub other_version: u64,
    /// Edits queued but not acknowledged.
    pub pending: usize,
    /// Canonical has changes not yet pushed.
    pub dirty: bool,
}

impl DocumentSummary {
    /// Summarize a JSON document.
    pub fn of<C: Cloner<serde_json::Value>>(
        doc_id: DocId,
        doc: &SyncDocument<JsonDiff, C>,
    ) -> Result<Self> {
        Ok(Self {
            doc_id,
            fingerprint: Fingerprint::of(doc.value())?,
            version: doc.shadow().version,
            other_version: doc.shadow().other_version,
            pending: doc.pending(),
            dirty: doc.is_dirty(),
        })
    }

    /// Whether each side has incorporated every snapshot the other took.
    pub fn in_lockstep_with(&self, remote: &DocumentSummary) -> bool {
        self.version == remote.other_version && self.other_version == remote.version
    }
}

/// Verify two replicas have converged on a document.
///
/// Converged means identical canonical values with version counters in
/// lockstep. Differing values while both sides are idle and in lockstep
/// means the replicas diverged silently and no further exchange will
/// repair them.
pub fn verify_convergence(local: &DocumentSummary, remote: &DocumentSummary) -> ConvergenceResult {
    if local.doc_id != remote.doc_id {
        return ConvergenceResult::NotConverged {
            reason: format!("doc_id mismatch: local={}, remote={}", local.doc_id, remote.doc_id),
        };
    }

    let lockstep = local.in_lockstep_with(remote);
    let idle = !local.dirty && !remote.dirty;

    if local.fingerprint == remote.fingerprint {
        if lockstep {
            return ConvergenceResult::Converged;
        }
        return ConvergenceResult::NotConverged {
            reason: format!(
                "versions not in lockstep: local={}/{}, remote={}/{}",
                local.version, local.other_version, remote.version, remote.other_version
            ),
        };
    }

    if lockstep && idle {
        return ConvergenceResult::Diverged {
            local_fingerprint: local.fingerprint,
            remote_fingerprint: remote.fingerprint,
        };
    }

    ConvergenceResult::NotConverged {
        reason: "changes in flight".into(),
    }
}

/// Result of convergence verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceResult {
    /// Both replicas hold identical state.
    Converged,
    /// Replicas have not yet converged (may need more sync rounds).
    NotConverged { reason: String },
    /// Replicas disagree and neither has anything left to send.
    Diverged {
        local_fingerprint: Fingerprint,
        remote_fingerprint: Fingerprint,
    },
}

impl ConvergenceResult {
    /// Check if replicas have converged.
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceResult::Converged)
    }

    /// Check if a silent divergence was detected.
    pub fn is_diverged(&self) -> bool {
        matches!(self, ConvergenceResult::Diverged { .. })
    }
}
