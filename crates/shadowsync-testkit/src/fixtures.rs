//! Test fixtures and helpers.
//!
//! [`DocumentPair`] wires two documents together in lock step, with
//! explicit control over which messages get lost or duplicated.
//! [`connected_transports`] sets up two nodes on an in-memory network.

use serde_json::Value;

use shadowsync_core::{DocId, Edit, Delta};
use shadowsync_sync::{
    verify_convergence, ConvergenceResult, DocumentSummary, JsonDocument, MemoryNetwork,
    MemoryTransport, NodeId, PullOutcome,
};

/// One side of a [`DocumentPair`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// What happens to a message in transit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Deliver,
    Lose,
    Duplicate,
}

/// Two replicas of one document connected by a simulated link.
pub struct DocumentPair {
    pub doc_id: DocId,
    pub a: JsonDocument,
    pub b: JsonDocument,
}

impl DocumentPair {
    /// Both replicas start from the same value.
    pub fn new(initial: Value) -> Self {
        Self {
            doc_id: DocId::derive("fixture"),
            a: JsonDocument::new(initial.clone()),
            b: JsonDocument::new(initial),
        }
    }

    pub fn side(&self, side: Side) -> &JsonDocument {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut JsonDocument {
        match side {
            Side::A => &mut self.a,
            Side::B => &mut self.b,
        }
    }

    /// Mutate one side's canonical value.
    pub fn edit<F: FnOnce(&mut Value)>(&mut self, side: Side, f: F) {
        f(self.side_mut(side).value_mut());
    }

    /// Push `from` and hand its whole outgoing queue to the other side.
    ///
    /// Returns the outcome of every pull performed.
    pub fn send(&mut self, from: Side, delivery: Delivery) -> Vec<PullOutcome> {
        self.side_mut(from).push();
        let edits: Vec<Edit<Delta>> = self.side(from).outgoing().cloned().collect();
        self.deliver(from.other(), &edits, delivery)
    }

    /// Send `from`'s pure acknowledgment, if it has incorporated anything.
    pub fn ack(&mut self, from: Side, delivery: Delivery) -> Vec<PullOutcome> {
        match self.side(from).ack_edit() {
            Some(ack) => self.deliver(from.other(), &[ack], delivery),
            None => Vec::new(),
        }
    }

    fn deliver(&mut self, to: Side, edits: &[Edit<Delta>], delivery: Delivery) -> Vec<PullOutcome> {
        let copies = match delivery {
            Delivery::Deliver => 1,
            Delivery::Lose => 0,
            Delivery::Duplicate => 2,
        };
        let target = self.side_mut(to);
        let mut outcomes = Vec::new();
        for _ in 0..copies {
            outcomes.extend(edits.iter().map(|edit| target.pull(edit)));
        }
        outcomes
    }

    /// One reliable exchange: A sends, B sends, both acknowledge.
    pub fn round(&mut self) {
        self.send(Side::A, Delivery::Deliver);
        self.send(Side::B, Delivery::Deliver);
        self.ack(Side::A, Delivery::Deliver);
        self.ack(Side::B, Delivery::Deliver);
    }

    pub fn summary(&self, side: Side) -> DocumentSummary {
        match DocumentSummary::of(self.doc_id, self.side(side)) {
            Ok(summary) => summary,
            Err(e) => panic!("fixture document cannot be fingerprinted: {}", e),
        }
    }

    pub fn verify(&self) -> ConvergenceResult {
        verify_convergence(&self.summary(Side::A), &self.summary(Side::B))
    }

    /// Whether both sides hold the same canonical value.
    pub fn values_match(&self) -> bool {
        self.a.value() == self.b.value()
    }
}

/// Two transports on a fresh in-memory network, with fixed node ids.
pub async fn connected_transports() -> ((NodeId, MemoryTransport), (NodeId, MemoryTransport)) {
    let network = MemoryNetwork::new();
    let node_a = NodeId::from_bytes([0xAA; 32]);
    let node_b = NodeId::from_bytes([0xBB; 32]);
    let transport_a = network.create_transport(node_a).await;
    let transport_b = network.create_transport(node_b).await;
    ((node_a, transport_a), (node_b, transport_b))
}
