//! The replica interface shared by both consistency strategies.
//!
//! Ingress code (the SDK node, the cluster simulator) only ever talks to a
//! `dyn FeedReplica`, so the strategy is picked once at construction time.

use crate::causal::CausalReplica;
use crate::error::Result;
use crate::eventual::EventualReplica;
use cfeed_core::{Event, EventId, FeedStore, FeedView, Readiness, ReplicaId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Replication strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Consistency {
    /// Vector-clock gated delivery with a causal buffer.
    #[default]
    Causal,
    /// Apply on receipt; order at read time.
    Eventual,
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Consistency::Causal => write!(f, "causal"),
            Consistency::Eventual => write!(f, "eventual"),
        }
    }
}

impl FromStr for Consistency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "causal" => Ok(Consistency::Causal),
            "eventual" => Ok(Consistency::Eventual),
            other => Err(format!("unknown consistency mode: {}", other)),
        }
    }
}

/// What happened to the event handed to the replica.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Delivered into the feed store (possibly after others it unblocked).
    Delivered,
    /// Kept in the causal buffer for the given reason.
    Held(Readiness),
    /// Already delivered or already buffered; dropped.
    Duplicate,
}

/// Result of one ingress call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryReport {
    pub evt_id: EventId,
    pub outcome: Outcome,
    /// Every event delivered by this call, in delivery order.
    pub delivered: Vec<EventId>,
    /// Events still buffered after this call.
    pub pending: usize,
}

impl DeliveryReport {
    pub fn duplicate(evt_id: EventId, pending: usize) -> Self {
        Self {
            evt_id,
            outcome: Outcome::Duplicate,
            delivered: Vec::new(),
            pending,
        }
    }

    pub fn was_delivered(&self) -> bool {
        self.outcome == Outcome::Delivered
    }
}

/// A locally authored event after stamping, plus what its delivery did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stamped {
    pub event: Event,
    pub report: DeliveryReport,
}

pub trait FeedReplica: Send {
    fn id(&self) -> ReplicaId;

    fn consistency(&self) -> Consistency;

    /// Stamp and deliver a locally authored event. The returned event is the
    /// one to broadcast.
    fn local_post(&mut self, event: Event) -> Result<Stamped>;

    /// Accept an event from a peer.
    fn receive(&mut self, event: Event) -> Result<DeliveryReport>;

    fn store(&self) -> &FeedStore;

    /// Events received but not delivered yet.
    fn pending_count(&self) -> usize;

    fn view(&self) -> FeedView;
}

/// Build a replica `id` of a `replicas`-member set with the given strategy.
pub fn new_replica(
    consistency: Consistency,
    id: ReplicaId,
    replicas: usize,
) -> Box<dyn FeedReplica> {
    match consistency {
        Consistency::Causal => Box::new(CausalReplica::new(id, replicas)),
        Consistency::Eventual => Box::new(EventualReplica::new(id, replicas)),
    }
}
