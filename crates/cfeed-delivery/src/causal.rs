//! Causal delivery engine
//!
//! Each replica `i` of an `N`-member set maintains:
//! - `V`: its vector clock
//! - `B`: the causal buffer of received, undelivered events
//! - `F`: the feed store of delivered posts and replies
//!
//! ## Protocol
//!
//! 1. **On local post e**:
//!    ```text
//!    V[i] := V[i] + 1
//!    e.vector := V
//!    F := F ∪ {e}
//!    broadcast e              // by the caller, after releasing the lock
//!    ```
//!
//! 2. **On receive e from a peer**:
//!    ```text
//!    B := B ∪ {e}
//!    while ∃ d ∈ B: canDeliver(V, d):
//!        d := earliest such arrival
//!        B := B \ {d}
//!        V := V ⊔ d.vector
//!        F := F ∪ {d}
//!    ```
//!
//! The drain runs to a fixed point inside a single `&mut self` call, so the
//! whole chain unblocked by one arrival is atomic with respect to any other
//! call on the same replica.
//!
//! A remote event is a duplicate only when its slot `(origin, Ve[origin])`
//! is already delivered or buffered. Two origins may author the same
//! `evt_id`; the later one still advances the clock but keeps the earlier
//! event in the feed store, and is kept aside in [`CausalReplica::collisions`].

use crate::buffer::{Admission, CausalBuffer};
use crate::error::{DeliveryError, Result};
use crate::replica::{Consistency, DeliveryReport, FeedReplica, Outcome, Stamped};
use cfeed_core::{
    check, validate_stamp, Event, EventId, FeedStore, FeedView, PostIndex, PostOrder, ReplicaId,
    VectorClock,
};

#[derive(Debug, Clone)]
pub struct CausalReplica {
    id: ReplicaId,
    clock: VectorClock,
    buffer: CausalBuffer,
    store: FeedStore,
    collisions: Vec<Event>,
}

impl CausalReplica {
    /// Create replica `id` of a `replicas`-member set.
    pub fn new(id: ReplicaId, replicas: usize) -> Self {
        Self {
            id,
            clock: VectorClock::new(replicas.max(id + 1)),
            buffer: CausalBuffer::new(),
            store: FeedStore::new(),
            collisions: Vec::new(),
        }
    }

    pub fn clock(&self) -> &VectorClock {
        &self.clock
    }

    pub fn buffer(&self) -> &CausalBuffer {
        &self.buffer
    }

    /// Delivered events whose id was already taken in the feed store.
    pub fn collisions(&self) -> &[Event] {
        &self.collisions
    }

    /// Author an event here.
    ///
    /// A reply must name a post already delivered at this replica. The
    /// author is the origin, so the sequence and dependency clauses hold by
    /// construction and the parent clause is the only one to check.
    pub fn post(&mut self, mut event: Event) -> Result<Stamped> {
        if self.store.contains(&event.evt_id) || self.buffer.contains(&event.evt_id) {
            return Err(DeliveryError::DuplicateId(event.evt_id));
        }
        if let Some(parent) = &event.parent_evt_id {
            if !self.store.contains_post(parent) {
                return Err(DeliveryError::UnknownParent {
                    evt_id: event.evt_id.clone(),
                    parent: parent.clone(),
                });
            }
        }

        event.process_id = self.id;
        event.vector = Some(self.clock.increment(self.id));
        event.timestamp = None;

        let evt_id = event.evt_id.clone();
        self.apply(event.clone());
        let mut delivered = vec![evt_id.clone()];
        delivered.extend(self.drain());

        Ok(Stamped {
            event,
            report: DeliveryReport {
                evt_id,
                outcome: Outcome::Delivered,
                delivered,
                pending: self.buffer.len(),
            },
        })
    }

    /// Accept a stamped event from a peer and deliver whatever became
    /// deliverable.
    pub fn share(&mut self, event: Event) -> Result<DeliveryReport> {
        if let Err(reason) = validate_stamp(self.clock.len(), &event) {
            return Err(DeliveryError::Malformed {
                evt_id: event.evt_id,
                reason,
            });
        }

        let evt_id = event.evt_id.clone();
        let origin = event.process_id;
        let seq = event.sequence().unwrap_or_default();
        let readiness = check(&self.clock, &event, &self.store);
        if readiness.is_stale() || self.buffer.insert(event) != Admission::Buffered {
            return Ok(DeliveryReport::duplicate(evt_id, self.buffer.len()));
        }

        let delivered = self.drain();
        let outcome = match self.buffer.get(origin, seq) {
            Some(held) => Outcome::Held(check(&self.clock, &held.event, &self.store)),
            None => Outcome::Delivered,
        };

        Ok(DeliveryReport {
            evt_id,
            outcome,
            delivered,
            pending: self.buffer.len(),
        })
    }

    /// Deliver buffered events until none is deliverable. Returns the ids
    /// delivered, in order.
    fn drain(&mut self) -> Vec<EventId> {
        let mut delivered = Vec::new();
        loop {
            let next = self
                .buffer
                .candidates(&self.clock)
                .filter(|b| check(&self.clock, &b.event, &self.store).is_ready())
                .min_by_key(|b| b.arrival)
                .map(|b| (b.event.process_id, b.seq));

            let Some((origin, seq)) = next else {
                break;
            };
            if let Some(event) = self.buffer.take(origin, seq) {
                delivered.push(event.evt_id.clone());
                self.apply(event);
            }
        }
        self.buffer.purge_delivered(&self.clock);
        delivered
    }

    fn apply(&mut self, event: Event) {
        if let Some(stamp) = &event.vector {
            self.clock.merge(stamp);
        }
        if self.store.contains(&event.evt_id) {
            self.collisions.push(event);
        } else {
            self.store.insert(event);
        }
    }
}

impl FeedReplica for CausalReplica {
    fn id(&self) -> ReplicaId {
        self.id
    }

    fn consistency(&self) -> Consistency {
        Consistency::Causal
    }

    fn local_post(&mut self, event: Event) -> Result<Stamped> {
        self.post(event)
    }

    fn receive(&mut self, event: Event) -> Result<DeliveryReport> {
        self.share(event)
    }

    fn store(&self) -> &FeedStore {
        &self.store
    }

    fn pending_count(&self) -> usize {
        self.buffer.len()
    }

    fn view(&self) -> FeedView {
        FeedView::project(self.id, &self.store, PostOrder::Delivery)
            .with_clock(self.clock.clone())
            .with_pending(self.buffer.pending_ids())
    }
}
