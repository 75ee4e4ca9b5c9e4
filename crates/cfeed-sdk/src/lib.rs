//! Causal feed SDK - async runtime for feed replicas
//!
//! This crate wraps the synchronous replicas of `cfeed-delivery` in a
//! Tokio runtime: a lock-guarded ingress for local posts and peer shares,
//! best-effort fan-out over a pluggable transport, and feed event
//! notifications.
//!
//! # Quick Start
//!
//! ```rust
//! use cfeed_sdk::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let nodes = cfeed_sdk::quick::create_cluster(3, ReplicaConfig::default());
//!
//! let published = nodes[0].post(Event::post("p1", "alice", "hello")).await.unwrap();
//! assert_eq!(published.ack.status, "ok");
//! published.flush().await;
//! # });
//! ```
//!
//! # Architecture
//!
//! - [`node`] - Replica ingress (`post`, `share`) and feed events
//! - [`broadcast`] - Detached, timed peer sends
//! - [`network`] - Network transport abstractions
//! - [`config`] - Replica runtime configuration
//! - [`error`] - Error types

pub mod broadcast;
pub mod config;
pub mod error;
pub mod network;
pub mod node;

// Re-exports for convenience
pub use broadcast::{BroadcastSender, SendHandle};
pub use config::{ReplicaConfig, ReplicaConfigBuilder};
pub use error::{NetworkError, Result, SdkError};
pub use network::{create_network, Inbound, MemoryTransport, NetworkTransport};
pub use node::{Ack, FeedEvent, Published, ReplicaNode};

pub use cfeed_core::{Event, EventId, FeedView, ReplicaId};
pub use cfeed_delivery::{Consistency, DeliveryError};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::ReplicaConfig;
    pub use crate::error::SdkError;
    pub use crate::network::{MemoryTransport, NetworkTransport};
    pub use crate::node::{Ack, FeedEvent, ReplicaNode};
    pub use cfeed_core::{Event, FeedView};
    pub use cfeed_delivery::Consistency;
}

/// Convenience functions for in-process clusters.
pub mod quick {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    /// Create `count` connected replicas over memory transports, each with
    /// its receiver loop running. Must be called within a Tokio runtime.
    pub fn create_cluster(count: usize, config: ReplicaConfig) -> Vec<Arc<ReplicaNode<MemoryTransport>>> {
        create_network(count)
            .into_iter()
            .map(|transport| {
                let inbox = transport.subscribe();
                let node = Arc::new(ReplicaNode::new(Arc::new(transport), config.clone()));
                if let Some(inbox) = inbox {
                    node.spawn_receiver(inbox);
                }
                node
            })
            .collect()
    }

    /// Poll until every node holds `expected` delivered events and nothing
    /// is pending, or `timeout` passes. Returns whether the cluster settled.
    pub async fn settle<T: NetworkTransport>(
        nodes: &[Arc<ReplicaNode<T>>],
        expected: usize,
        timeout: Duration,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let settled = nodes
                .iter()
                .all(|n| n.delivered_count() == expected && n.pending_count() == 0);
            if settled {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}
