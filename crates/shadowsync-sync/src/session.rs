//! Sync session driving documents over a transport.
//!
//! A [`SyncSession`] links a set of documents to one peer. It decides
//! when to send: new edits go out immediately, unacknowledged edits are
//! resent after `resend_interval`, and a pure acknowledgment is sent when
//! peer edits were incorporated that nothing we sent has acknowledged yet,
//! or when the peer resends edits we already have.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use shadowsync_core::DocId;
use tokio::sync::watch;

use crate::document::PullOutcome;
use crate::error::{Result, SyncError};
use crate::handle::{DocumentHandle, Outgoing};
use crate::messages::{limits, NodeId, SyncMessage};
use crate::transport::Transport;

/// Configuration for sync behavior.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How often [`SyncSession::run`] flushes local changes.
    pub push_interval: Duration,
    /// How long to wait for an acknowledgment before resending.
    pub resend_interval: Duration,
    /// How long [`SyncSession::receive_next`] waits for the peer.
    pub message_timeout: Duration,
    /// Maximum edits per message; larger queues are split.
    pub max_edits_per_message: usize,
    /// Mailbox size of each document task.
    pub mailbox_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            push_interval: Duration::from_millis(100),
            resend_interval: Duration::from_secs(1),
            message_timeout: Duration::from_secs(30),
            max_edits_per_message: limits::MAX_EDITS_PER_MESSAGE,
            mailbox_capacity: 64,
        }
    }
}

/// What one [`SyncSession::flush`] sent.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Messages handed to the transport.
    pub messages_sent: usize,
    /// Edits carrying a delta.
    pub edits_sent: usize,
    /// Pure acknowledgments.
    pub acks_sent: usize,
    /// Documents whose queue was resent without new changes.
    pub resent: usize,
}

/// What one received message did.
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    /// Edits were handed to the document.
    Pulled {
        doc_id: DocId,
        outcomes: Vec<PullOutcome>,
    },
    /// No document with this id is attached; the message was skipped.
    UnknownDocument(DocId),
    /// The message came from a node other than our peer.
    UnexpectedPeer(NodeId),
}

struct Link {
    handle: DocumentHandle,
    /// Highest edit version handed to the transport.
    sent_version: Option<u64>,
    last_sent: Option<Instant>,
    /// Peer edit count already acknowledged by something we sent.
    acked_receipt: u64,
    /// The peer resent edits we already have; only a pure ack stops it.
    ack_owed: bool,
}

/// Sync session state.
pub struct SyncSession<T: Transport> {
    transport: T,
    peer: NodeId,
    config: SyncConfig,
    links: HashMap<DocId, Link>,
}

impl<T: Transport> SyncSession<T> {
    /// Create a new sync session with `peer`.
    pub fn new(transport: T, peer: NodeId, config: SyncConfig) -> Self {
        Self {
            transport,
            peer,
            config,
            links: HashMap::new(),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn peer(&self) -> NodeId {
        self.peer
    }

    /// Start syncing a document.
    pub fn attach(&mut self, handle: DocumentHandle) {
        let doc_id = handle.doc_id();
        tracing::debug!(doc = %doc_id, peer = %self.peer, "attached document");
        self.links.insert(
            doc_id,
            Link {
                handle,
                sent_version: None,
                last_sent: None,
                acked_receipt: 0,
                ack_owed: false,
            },
        );
    }

    /// Stop syncing a document, returning its handle.
    pub fn detach(&mut self, doc_id: &DocId) -> Option<DocumentHandle> {
        self.links.remove(doc_id).map(|link| link.handle)
    }

    pub fn handle(&self, doc_id: &DocId) -> Option<&DocumentHandle> {
        self.links.get(doc_id).map(|link| &link.handle)
    }

    pub fn documents(&self) -> impl Iterator<Item = &DocId> + '_ {
        self.links.keys()
    }

    /// Push every document and send what the peer needs to hear.
    pub async fn flush(&mut self) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let doc_ids: Vec<DocId> = self.links.keys().copied().collect();

        for doc_id in doc_ids {
            self.flush_document(&doc_id, &mut report).await?;
        }

        Ok(report)
    }

    async fn flush_document(&mut self, doc_id: &DocId, report: &mut SyncReport) -> Result<()> {
        let (outgoing, due) = {
            let link = self
                .links
                .get(doc_id)
                .ok_or(SyncError::UnknownDocument(*doc_id))?;
            let outgoing = link.handle.prepare_outgoing().await?;
            let due = self.edits_due(link, &outgoing);
            (outgoing, due)
        };

        let Outgoing {
            edits, receipt, ack, ..
        } = outgoing;

        if due {
            let resend = edits.last().map(|e| e.version) <= self.link(doc_id)?.sent_version;
            let chunk_size = self
                .config
                .max_edits_per_message
                .clamp(1, limits::MAX_EDITS_PER_MESSAGE);
            for chunk in edits.chunks(chunk_size) {
                self.transport
                    .send(&self.peer, SyncMessage::new(*doc_id, chunk.to_vec()))
                    .await?;
                report.messages_sent += 1;
            }
            report.edits_sent += edits.len();
            if resend {
                report.resent += 1;
            }

            let link = self.link_mut(doc_id)?;
            link.sent_version = edits.last().map(|e| e.version);
            link.last_sent = Some(Instant::now());
            if let Some(last) = edits.last() {
                link.acked_receipt = link.acked_receipt.max(last.other_version);
            }
            tracing::debug!(doc = %doc_id, edits = edits.len(), resend, "sent edits");
        }

        let link = self.link(doc_id)?;
        if receipt > link.acked_receipt || link.ack_owed {
            if let Some(ack) = ack {
                self.transport
                    .send(&self.peer, SyncMessage::new(*doc_id, vec![ack]))
                    .await?;
                report.messages_sent += 1;
                report.acks_sent += 1;
                let link = self.link_mut(doc_id)?;
                link.acked_receipt = receipt;
                link.ack_owed = false;
                tracing::trace!(doc = %doc_id, receipt, "sent acknowledgment");
            }
        }

        Ok(())
    }

    /// New edits go out at once; an unchanged queue waits for the resend
    /// interval.
    fn edits_due(&self, link: &Link, outgoing: &Outgoing) -> bool {
        let newest = match outgoing.edits.last() {
            Some(edit) => edit.version,
            None => return false,
        };
        if link.sent_version.map_or(true, |sent| newest > sent) {
            return true;
        }
        link.last_sent
            .map_or(true, |at| at.elapsed() >= self.config.resend_interval)
    }

    fn link(&self, doc_id: &DocId) -> Result<&Link> {
        self.links
            .get(doc_id)
            .ok_or(SyncError::UnknownDocument(*doc_id))
    }

    fn link_mut(&mut self, doc_id: &DocId) -> Result<&mut Link> {
        self.links
            .get_mut(doc_id)
            .ok_or(SyncError::UnknownDocument(*doc_id))
    }

    /// Wait up to `timeout` for one message and apply it.
    ///
    /// Returns `None` if nothing arrived in time.
    pub async fn receive(&mut self, timeout: Duration) -> Result<Option<Received>> {
        match self.transport.recv_timeout(timeout).await? {
            Some((from, message)) => self.handle_message(from, message).await.map(Some),
            None => Ok(None),
        }
    }

    /// Wait up to `message_timeout` for the peer's next message and apply it.
    pub async fn receive_next(&mut self) -> Result<Received> {
        let timeout = self.config.message_timeout;
        self.receive(timeout).await?.ok_or_else(|| {
            SyncError::Timeout(format!("no message from {} within {:?}", self.peer, timeout))
        })
    }

    /// Apply one inbound message.
    pub async fn handle_message(&mut self, from: NodeId, message: SyncMessage) -> Result<Received> {
        if from != self.peer {
            tracing::warn!(from = %from, peer = %self.peer, "ignoring message from unexpected node");
            return Ok(Received::UnexpectedPeer(from));
        }

        let doc_id = message.doc_id;
        let link = match self.links.get_mut(&doc_id) {
            Some(link) => link,
            None => {
                tracing::warn!(doc = %doc_id, "ignoring edits for unknown document");
                return Ok(Received::UnknownDocument(doc_id));
            }
        };

        let outcomes = link.handle.pull(message.edits).await?;

        // A stale edit means the peer resent something we already have:
        // our acknowledgment was lost, or it rode on an edit the peer
        // treated as stale too.
        if outcomes.iter().any(PullOutcome::is_stale) {
            link.ack_owed = true;
        }
        for outcome in outcomes.iter().filter(|o| o.is_desynchronized()) {
            tracing::warn!(doc = %doc_id, ?outcome, "document lost sync with peer");
        }

        Ok(Received::Pulled { doc_id, outcomes })
    }

    /// Flush every `push_interval` and apply messages as they arrive,
    /// until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut ticker = tokio::time::interval(self.config.push_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let event = tokio::select! {
                _ = ticker.tick() => Event::Tick,
                received = self.transport.recv() => Event::Message(received),
                changed = shutdown.changed() => match changed {
                    Ok(()) => continue,
                    Err(_) => Event::Shutdown,
                },
            };

            match event {
                Event::Tick => {
                    self.flush().await?;
                }
                Event::Message(Ok((from, message))) => {
                    self.handle_message(from, message).await?;
                }
                Event::Message(Err(e)) if e.is_malformed_frame() => {
                    tracing::warn!(peer = %self.peer, error = %e, "skipping malformed frame");
                }
                Event::Message(Err(e)) => return Err(e),
                Event::Shutdown => break,
            }
        }

        tracing::debug!(peer = %self.peer, "sync session stopped");
        Ok(())
    }
}

enum Event {
    Tick,
    Message(Result<(NodeId, SyncMessage)>),
    Shutdown,
}
