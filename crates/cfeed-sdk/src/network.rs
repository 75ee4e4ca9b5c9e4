//! Network transport abstractions for replica fan-out.
//!
//! Peers are addressed by their index in the static replica list; there is
//! no discovery and no membership change.

use crate::error::NetworkError;
use async_trait::async_trait;
use cfeed_core::{Event, ReplicaId};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;

/// An event received from a peer, tagged with the sender.
pub type Inbound = (ReplicaId, Event);

/// Abstract network transport trait.
#[async_trait]
pub trait NetworkTransport: Send + Sync + 'static {
    /// Index of the local replica.
    fn local_id(&self) -> ReplicaId;

    /// Size of the replica set, including the local replica.
    fn replica_count(&self) -> usize;

    /// Every replica except the local one.
    fn peers(&self) -> Vec<ReplicaId> {
        let local = self.local_id();
        (0..self.replica_count()).filter(|&id| id != local).collect()
    }

    /// Hand a stamped event to `peer`'s share endpoint.
    async fn send(&self, peer: ReplicaId, event: Event) -> Result<(), NetworkError>;
}

/// Type alias for the message receiver shared across threads.
type SharedReceiver = Arc<RwLock<Option<mpsc::Receiver<Inbound>>>>;
/// Type alias for the outgoing message senders shared across threads.
type SharedOutgoing = Arc<RwLock<HashMap<ReplicaId, mpsc::Sender<Inbound>>>>;

/// In-memory transport for testing and simulation.
pub struct MemoryTransport {
    local_id: ReplicaId,
    replicas: usize,
    inbox_tx: mpsc::Sender<Inbound>,
    inbox_rx: SharedReceiver,
    outgoing: SharedOutgoing,
    partitioned: Arc<RwLock<HashSet<ReplicaId>>>,
}

impl MemoryTransport {
    pub fn new(local_id: ReplicaId, replicas: usize) -> Self {
        let (tx, rx) = mpsc::channel(1024);
        Self {
            local_id,
            replicas,
            inbox_tx: tx,
            inbox_rx: Arc::new(RwLock::new(Some(rx))),
            outgoing: Arc::new(RwLock::new(HashMap::new())),
            partitioned: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Connect two memory transports together (for testing).
    pub fn connect_to(&self, other: &MemoryTransport) {
        self.outgoing
            .write()
            .insert(other.local_id, other.inbox_tx.clone());
        other
            .outgoing
            .write()
            .insert(self.local_id, self.inbox_tx.clone());
    }

    /// Take the inbound receiver. Only the first call gets it.
    pub fn subscribe(&self) -> Option<mpsc::Receiver<Inbound>> {
        self.inbox_rx.write().take()
    }

    /// Drop every outgoing send to `peer` until [`heal`](Self::heal).
    pub fn partition(&self, peer: ReplicaId) {
        self.partitioned.write().insert(peer);
    }

    pub fn heal(&self, peer: ReplicaId) {
        self.partitioned.write().remove(&peer);
    }

    pub fn is_partitioned(&self, peer: ReplicaId) -> bool {
        self.partitioned.read().contains(&peer)
    }
}

#[async_trait]
impl NetworkTransport for MemoryTransport {
    fn local_id(&self) -> ReplicaId {
        self.local_id
    }

    fn replica_count(&self) -> usize {
        self.replicas
    }

    async fn send(&self, peer: ReplicaId, event: Event) -> Result<(), NetworkError> {
        if self.is_partitioned(peer) {
            return Err(NetworkError::Disconnected(peer));
        }

        let tx = {
            let outgoing = self.outgoing.read();
            outgoing.get(&peer).cloned()
        };

        match tx {
            Some(tx) => tx
                .send((self.local_id, event))
                .await
                .map_err(|e| NetworkError::SendFailed(e.to_string())),
            None => Err(NetworkError::PeerNotFound(peer)),
        }
    }
}

/// Create a network of connected memory transports for testing.
pub fn create_network(count: usize) -> Vec<MemoryTransport> {
    let transports: Vec<_> = (0..count).map(|i| MemoryTransport::new(i, count)).collect();

    // Connect all peers to each other
    for i in 0..count {
        for j in (i + 1)..count {
            transports[i].connect_to(&transports[j]);
        }
    }

    transports
}
