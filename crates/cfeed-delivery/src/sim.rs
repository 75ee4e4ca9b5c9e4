//! In-process cluster simulation.
//!
//! A [`Cluster`] holds `n` replicas of one consistency strategy and a
//! [`NetworkSimulator`] that carries their broadcasts. The simulator can
//! lose, duplicate and reorder messages, deterministically from a seed, so
//! tests can replay the same adversarial schedule.

use crate::error::Result;
use crate::replica::{new_replica, Consistency, DeliveryReport, FeedReplica};
use cfeed_core::{Event, EventId, FeedStore, ReplicaId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// An event addressed to one replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub to: ReplicaId,
    pub event: Event,
}

/// Network configuration for simulation
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Probability of message loss (0.0 - 1.0)
    pub loss_rate: f64,
    /// Probability of message duplication (0.0 - 1.0)
    pub dup_rate: f64,
    /// Probability of message reordering (0.0 - 1.0)
    pub reorder_rate: f64,
    pub seed: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            dup_rate: 0.0,
            reorder_rate: 0.0,
            seed: 12345,
        }
    }
}

impl NetworkConfig {
    pub fn lossy(loss_rate: f64) -> Self {
        Self {
            loss_rate,
            ..Default::default()
        }
    }

    pub fn reordering(reorder_rate: f64) -> Self {
        Self {
            reorder_rate,
            ..Default::default()
        }
    }

    /// Loss, duplication and reordering all at once.
    pub fn chaotic() -> Self {
        Self {
            loss_rate: 0.1,
            dup_rate: 0.2,
            reorder_rate: 0.5,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[derive(Debug)]
pub struct NetworkSimulator {
    in_flight: VecDeque<Envelope>,
    lost: Vec<Envelope>,
    config: NetworkConfig,
    rng: StdRng,
}

impl NetworkSimulator {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            in_flight: VecDeque::new(),
            lost: Vec::new(),
            rng: StdRng::seed_from_u64(config.seed),
            config,
        }
    }

    pub fn send(&mut self, envelope: Envelope) {
        if self.rng.gen::<f64>() < self.config.loss_rate {
            self.lost.push(envelope);
            return;
        }

        if self.rng.gen::<f64>() < self.config.dup_rate {
            self.in_flight.push_back(envelope.clone());
        }

        if self.rng.gen::<f64>() < self.config.reorder_rate && !self.in_flight.is_empty() {
            let pos = self.rng.gen_range(0..=self.in_flight.len());
            self.in_flight.insert(pos, envelope);
        } else {
            self.in_flight.push_back(envelope);
        }
    }

    pub fn receive(&mut self) -> Option<Envelope> {
        self.in_flight.pop_front()
    }

    /// Pull the first in-flight message matching `pred`, skipping ahead of
    /// everything queued before it.
    pub fn receive_where<F>(&mut self, pred: F) -> Option<Envelope>
    where
        F: Fn(&Envelope) -> bool,
    {
        let pos = self.in_flight.iter().position(pred)?;
        self.in_flight.remove(pos)
    }

    /// Re-send lost messages (simulates a later retransmission by a client)
    pub fn retransmit_lost(&mut self) {
        for envelope in self.lost.drain(..) {
            self.in_flight.push_back(envelope);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn lost_count(&self) -> usize {
        self.lost.len()
    }
}

/// Posts with their reply sets, plus orphan replies, ignoring delivery
/// order. Two replicas that delivered the same events have the same digest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedDigest {
    pub threads: BTreeMap<EventId, BTreeSet<EventId>>,
    pub orphans: BTreeSet<EventId>,
}

pub fn digest(store: &FeedStore) -> FeedDigest {
    FeedDigest {
        threads: store
            .posts()
            .map(|post| {
                let replies = store.replies(&post.evt_id).map(|r| r.evt_id.clone()).collect();
                (post.evt_id.clone(), replies)
            })
            .collect(),
        orphans: store.orphans().map(|o| o.evt_id.clone()).collect(),
    }
}

/// Cluster coordinator for simulated replicas
pub struct Cluster {
    replicas: Vec<Box<dyn FeedReplica>>,
    network: NetworkSimulator,
}

impl Cluster {
    pub fn new(n: usize, consistency: Consistency, config: NetworkConfig) -> Self {
        Self {
            replicas: (0..n).map(|i| new_replica(consistency, i, n)).collect(),
            network: NetworkSimulator::new(config),
        }
    }

    pub fn replica(&self, idx: ReplicaId) -> &dyn FeedReplica {
        self.replicas[idx].as_ref()
    }

    pub fn network(&self) -> &NetworkSimulator {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut NetworkSimulator {
        &mut self.network
    }

    /// Author `event` at replica `idx` and broadcast it to every peer.
    pub fn post(&mut self, idx: ReplicaId, event: Event) -> Result<Event> {
        let stamped = self.replicas[idx].local_post(event)?.event;
        for to in (0..self.replicas.len()).filter(|&to| to != idx) {
            self.network.send(Envelope {
                to,
                event: stamped.clone(),
            });
        }
        Ok(stamped)
    }

    /// Hand `event` directly to replica `idx`, bypassing the network.
    pub fn deliver_to(&mut self, idx: ReplicaId, event: Event) -> Result<DeliveryReport> {
        self.replicas[idx].receive(event)
    }

    /// Process one network message
    pub fn process_one(&mut self) -> Result<bool> {
        match self.network.receive() {
            Some(envelope) => {
                self.replicas[envelope.to].receive(envelope.event)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn drain_network(&mut self) -> Result<()> {
        while self.process_one()? {}
        Ok(())
    }

    pub fn retransmit_and_process(&mut self) -> Result<()> {
        self.network.retransmit_lost();
        self.drain_network()
    }

    /// Every replica holds the same posts, replies and pending count 0.
    pub fn is_converged(&self) -> bool {
        let Some(first) = self.replicas.first() else {
            return true;
        };
        let expected = digest(first.store());
        self.replicas
            .iter()
            .all(|r| r.pending_count() == 0 && digest(r.store()) == expected)
    }

    pub fn total_pending(&self) -> usize {
        self.replicas.iter().map(|r| r.pending_count()).sum()
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }
}
