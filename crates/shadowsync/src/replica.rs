//! The Replica: one side of a two-party sync session.
//!
//! The Replica keeps a reference-counted registry of open documents,
//! binds them to a single peer over a single transport, and drives the
//! flush / receive loop.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;

use shadowsync_core::DocId;
use shadowsync_sync::{
    verify_convergence, ConvergenceResult, DocumentHandle, DocumentSummary, JsonDocument, NodeId,
    Received, SyncConfig, SyncReport, SyncSession, Transport,
};

use crate::error::{ReplicaError, Result};

/// Configuration for the Replica.
#[derive(Debug, Clone, Default)]
pub struct ReplicaConfig {
    /// Sync configuration.
    pub sync: SyncConfig,
}

/// The main Replica struct.
///
/// Provides a unified API for:
/// - Opening and closing shared documents
/// - Editing canonical values
/// - Exchanging edits with the peer
/// - Verifying convergence
pub struct Replica<T: Transport> {
    session: SyncSession<T>,
    /// Open count per document.
    references: HashMap<DocId, usize>,
}

impl<T: Transport> Replica<T> {
    /// Create a replica syncing with `peer` over `transport`.
    pub fn new(transport: T, peer: NodeId, config: ReplicaConfig) -> Self {
        Self {
            session: SyncSession::new(transport, peer, config.sync),
            references: HashMap::new(),
        }
    }

    /// Get this replica's node id.
    pub fn node_id(&self) -> NodeId {
        self.session.transport().local_node_id()
    }

    pub fn peer(&self) -> NodeId {
        self.session.peer()
    }

    pub fn transport(&self) -> &T {
        self.session.transport()
    }

    pub fn config(&self) -> &SyncConfig {
        self.session.config()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Document Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Open a document, or take another reference to it if already open.
    ///
    /// `initial` is only used the first time; both replicas must open a
    /// document with the same initial value.
    pub fn open(&mut self, doc_id: DocId, initial: Value) -> DocumentHandle {
        let count = self.references.entry(doc_id).or_insert(0);
        *count += 1;

        if let Some(handle) = self.session.handle(&doc_id) {
            tracing::trace!(doc = %doc_id, references = *count, "document already open");
            return handle.clone();
        }

        let capacity = self.session.config().mailbox_capacity;
        let handle = DocumentHandle::spawn(doc_id, JsonDocument::new(initial), capacity);
        self.session.attach(handle.clone());
        tracing::debug!(doc = %doc_id, "opened document");
        handle
    }

    /// Open a document by name. See [`DocId::derive`].
    pub fn open_named(&mut self, name: &str, initial: Value) -> DocumentHandle {
        self.open(DocId::derive(name), initial)
    }

    /// Release one reference to a document.
    ///
    /// Returns `true` if that was the last reference and the document was
    /// detached from the session. Its task stops once every outstanding
    /// [`DocumentHandle`] is dropped.
    pub fn close(&mut self, doc_id: &DocId) -> Result<bool> {
        let count = self
            .references
            .get_mut(doc_id)
            .ok_or(ReplicaError::NotOpen(*doc_id))?;
        *count -= 1;
        if *count > 0 {
            return Ok(false);
        }

        self.references.remove(doc_id);
        self.session.detach(doc_id);
        tracing::debug!(doc = %doc_id, "closed document");
        Ok(true)
    }

    /// Number of open references to a document.
    pub fn references(&self, doc_id: &DocId) -> usize {
        self.references.get(doc_id).copied().unwrap_or(0)
    }

    pub fn is_open(&self, doc_id: &DocId) -> bool {
        self.references.contains_key(doc_id)
    }

    /// Get the handle of an open document.
    pub fn document(&self, doc_id: &DocId) -> Result<&DocumentHandle> {
        self.session
            .handle(doc_id)
            .ok_or(ReplicaError::NotOpen(*doc_id))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Document Access
    // ─────────────────────────────────────────────────────────────────────────

    /// Mutate a document's canonical value.
    ///
    /// The change reaches the peer on the next [`flush`](Self::flush).
    pub async fn edit<F, R>(&self, doc_id: &DocId, f: F) -> Result<R>
    where
        F: FnOnce(&mut Value) -> R + Send + 'static,
        R: Send + 'static,
    {
        Ok(self.document(doc_id)?.edit(f).await?)
    }

    /// A copy of a document's canonical value.
    pub async fn value(&self, doc_id: &DocId) -> Result<Value> {
        Ok(self.document(doc_id)?.value().await?)
    }

    /// Summarize a document for a convergence check.
    pub async fn summary(&self, doc_id: &DocId) -> Result<DocumentSummary> {
        Ok(self.document(doc_id)?.summary().await?)
    }

    /// Compare a document against the peer's summary of it.
    pub async fn verify(&self, remote: &DocumentSummary) -> Result<ConvergenceResult> {
        let local = self.summary(&remote.doc_id).await?;
        Ok(verify_convergence(&local, remote))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sync Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Push every open document and send what the peer needs.
    pub async fn flush(&mut self) -> Result<SyncReport> {
        Ok(self.session.flush().await?)
    }

    /// Apply one inbound message, waiting up to `timeout`.
    pub async fn receive(&mut self, timeout: Duration) -> Result<Option<Received>> {
        Ok(self.session.receive(timeout).await?)
    }

    /// Wait for the peer's next message, failing with a timeout error
    /// after the configured `message_timeout`.
    pub async fn receive_next(&mut self) -> Result<Received> {
        Ok(self.session.receive_next().await?)
    }

    /// Apply inbound messages until none arrives within `timeout`.
    ///
    /// Returns the number of messages applied.
    pub async fn receive_all(&mut self, timeout: Duration) -> Result<usize> {
        let mut count = 0;
        while self.receive(timeout).await?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    /// Run the sync loop until `shutdown` flips to `true`.
    pub async fn run(&mut self, shutdown: watch::Receiver<bool>) -> Result<()> {
        Ok(self.session.run(shutdown).await?)
    }
}
