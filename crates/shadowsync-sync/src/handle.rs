//! Task-owned documents.
//!
//! A [`SyncDocument`] is not internally synchronized. [`DocumentHandle`]
//! moves one into its own tokio task and serializes every access through
//! a mailbox, so the host and the sync loop can share it without locks.
//! The task stops, dropping the document, when the last handle is
//! dropped.

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use shadowsync_core::{Delta, DocId, Edit};

use crate::convergence::DocumentSummary;
use crate::document::{JsonDocument, PullOutcome};
use crate::error::{Result, SyncError};

type Job = Box<dyn FnOnce(&mut JsonDocument) + Send>;

/// Edits to send after a [`DocumentHandle::prepare_outgoing`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outgoing {
    /// Unacknowledged edits, oldest first.
    pub edits: Vec<Edit<Delta>>,
    /// Peer edits incorporated so far.
    pub receipt: u64,
    /// Pure acknowledgment for the incorporated peer edits, if any.
    pub ack: Option<Edit<Delta>>,
    /// Whether this call queued a new edit.
    pub pushed: bool,
}

/// Cloneable handle to a document owned by a background task.
#[derive(Clone)]
pub struct DocumentHandle {
    doc_id: DocId,
    mailbox: mpsc::Sender<Job>,
}

impl DocumentHandle {
    /// Move `document` into a new task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(doc_id: DocId, document: JsonDocument, capacity: usize) -> Self {
        let (mailbox, mut jobs) = mpsc::channel::<Job>(capacity.max(1));

        tokio::spawn(async move {
            let mut document = document;
            while let Some(job) = jobs.recv().await {
                job(&mut document);
            }
            tracing::debug!(doc = %doc_id, "document task stopped");
        });

        Self { doc_id, mailbox }
    }

    pub fn doc_id(&self) -> DocId {
        self.doc_id
    }

    /// Run `f` against the document inside its task.
    pub async fn with_document<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut JsonDocument) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        let job: Job = Box::new(move |document| {
            let _ = reply.send(f(document));
        });

        self.mailbox
            .send(job)
            .await
            .map_err(|_| SyncError::DocumentClosed(self.doc_id))?;
        result.await.map_err(|_| SyncError::DocumentClosed(self.doc_id))
    }

    /// Mutate the canonical value.
    pub async fn edit<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Value) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.with_document(move |document| f(document.value_mut()))
            .await
    }

    /// A copy of the canonical value.
    pub async fn value(&self) -> Result<Value> {
        self.with_document(|document| document.value().clone()).await
    }

    pub async fn push(&self) -> Result<bool> {
        self.with_document(|document| document.push()).await
    }

    /// Apply inbound edits in order.
    pub async fn pull(&self, edits: Vec<Edit<Delta>>) -> Result<Vec<PullOutcome>> {
        self.with_document(move |document| edits.iter().map(|e| document.pull(e)).collect())
            .await
    }

    pub async fn receipt(&self) -> Result<u64> {
        self.with_document(|document| document.receipt()).await
    }

    /// Push local changes and collect everything the peer should hear.
    pub async fn prepare_outgoing(&self) -> Result<Outgoing> {
        self.with_document(|document| {
            let pushed = document.push();
            Outgoing {
                edits: document.outgoing().cloned().collect(),
                receipt: document.receipt(),
                ack: document.ack_edit(),
                pushed,
            }
        })
        .await
    }

    pub async fn summary(&self) -> Result<DocumentSummary> {
        let doc_id = self.doc_id;
        self.with_document(move |document| DocumentSummary::of(doc_id, document))
            .await?
    }
}

impl std::fmt::Debug for DocumentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentHandle")
            .field("doc_id", &self.doc_id)
            .field("closed", &self.mailbox.is_closed())
            .finish()
    }
}
