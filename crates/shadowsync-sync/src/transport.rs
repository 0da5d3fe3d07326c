//! Transport abstraction for sync protocol.
//!
//! The transport layer handles message serialization and delivery.
//! Delivery may be lossy or duplicate messages; the document state
//! machine tolerates both. It must not reorder messages between a
//! given pair of nodes.

use async_trait::async_trait;

use crate::error::SyncError;
use crate::messages::{NodeId, SyncMessage};

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Transport trait for sending and receiving sync messages.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a message to a specific peer.
    async fn send(&self, peer: &NodeId, message: SyncMessage) -> Result<()>;

    /// Receive the next message from any peer.
    ///
    /// Returns the sender's NodeId and the message.
    /// Blocks until a message is available or an error occurs.
    async fn recv(&self) -> Result<(NodeId, SyncMessage)>;

    /// Receive with timeout.
    ///
    /// Returns None if timeout expires before a message arrives.
    async fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<Option<(NodeId, SyncMessage)>>;

    /// Get the local node's identity.
    fn local_node_id(&self) -> NodeId;

    /// Check if a specific peer is connected.
    async fn is_connected(&self, peer: &NodeId) -> bool;
}

/// A simple in-memory transport for testing.
///
/// Messages travel as encoded frames over channels, so every hop also
/// exercises the wire codec. Each transport can be told to drop or
/// duplicate its next outbound messages.
pub mod memory {
    use super::*;
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::{mpsc, RwLock};

    /// Frame envelope for internal routing.
    #[derive(Debug, Clone)]
    struct Envelope {
        from: NodeId,
        frame: Bytes,
    }

    /// Shared state for the memory transport network.
    pub struct MemoryNetwork {
        /// Sender channels for each node.
        senders: RwLock<HashMap<NodeId, mpsc::Sender<Envelope>>>,
    }

    impl MemoryNetwork {
        /// Create a new memory network.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Create a transport connected to this network.
        pub async fn create_transport(self: &Arc<Self>, node_id: NodeId) -> MemoryTransport {
            let (tx, rx) = mpsc::channel(1000);

            self.senders.write().await.insert(node_id, tx);

            MemoryTransport {
                node_id,
                network: Arc::clone(self),
                receiver: RwLock::new(rx),
                faults: Faults::default(),
            }
        }

        /// Remove a node; later sends to it fail.
        pub async fn disconnect(&self, node_id: &NodeId) {
            self.senders.write().await.remove(node_id);
        }
    }

    impl Default for MemoryNetwork {
        fn default() -> Self {
            Self {
                senders: RwLock::new(HashMap::new()),
            }
        }
    }

    #[derive(Debug, Default)]
    struct Faults {
        drop_next: AtomicUsize,
        duplicate_next: AtomicUsize,
    }

    impl Faults {
        /// Consume one unit of a counter if any is left.
        fn take(counter: &AtomicUsize) -> bool {
            counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    /// In-memory transport implementation.
    pub struct MemoryTransport {
        node_id: NodeId,
        network: Arc<MemoryNetwork>,
        receiver: RwLock<mpsc::Receiver<Envelope>>,
        faults: Faults,
    }

    impl MemoryTransport {
        /// Silently lose the next `n` outbound messages.
        pub fn drop_next(&self, n: usize) {
            self.faults.drop_next.fetch_add(n, Ordering::SeqCst);
        }

        /// Deliver each of the next `n` outbound messages twice.
        pub fn duplicate_next(&self, n: usize) {
            self.faults.duplicate_next.fetch_add(n, Ordering::SeqCst);
        }

        fn decode(envelope: Envelope) -> Result<(NodeId, SyncMessage)> {
            let message = SyncMessage::decode(&envelope.frame)?;
            Ok((envelope.from, message))
        }
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send(&self, peer: &NodeId, message: SyncMessage) -> Result<()> {
            let frame = message.encode()?;

            let senders = self.network.senders.read().await;
            let sender = senders
                .get(peer)
                .ok_or_else(|| SyncError::PeerNotConnected(peer.to_string()))?;

            if Faults::take(&self.faults.drop_next) {
                tracing::trace!(peer = %peer, doc = %message.doc_id, "dropping frame");
                return Ok(());
            }

            let copies = if Faults::take(&self.faults.duplicate_next) { 2 } else { 1 };
            for _ in 0..copies {
                let envelope = Envelope {
                    from: self.node_id,
                    frame: frame.clone(),
                };
                sender
                    .send(envelope)
                    .await
                    .map_err(|_| SyncError::TransportError("peer disconnected".into()))?;
            }
            Ok(())
        }

        async fn recv(&self) -> Result<(NodeId, SyncMessage)> {
            let mut rx = self.receiver.write().await;
            match rx.recv().await {
                Some(envelope) => Self::decode(envelope),
                None => Err(SyncError::TransportError("channel closed".into())),
            }
        }

        async fn recv_timeout(
            &self,
            timeout: std::time::Duration,
        ) -> Result<Option<(NodeId, SyncMessage)>> {
            let mut rx = self.receiver.write().await;
            match tokio::time::timeout(timeout, rx.recv()).await {
                Ok(Some(envelope)) => Self::decode(envelope).map(Some),
                Ok(None) => Err(SyncError::TransportError("channel closed".into())),
                Err(_) => Ok(None), // Timeout
            }
        }

        fn local_node_id(&self) -> NodeId {
            self.node_id
        }

        async fn is_connected(&self, peer: &NodeId) -> bool {
            let senders = self.network.senders.read().await;
            senders.contains_key(peer)
        }
    }
}
