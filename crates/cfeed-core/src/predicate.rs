//! Causal delivery predicate.
//!
//! An event `e` from origin `s`, stamped with `Ve`, can be delivered against
//! the local clock `V` when:
//!
//! ```text
//! 1. Ve[s] == V[s] + 1                 next event expected from s
//! 2. ∀ j ≠ s: Ve[j] <= V[j]            everything s had seen is delivered here
//! 3. parentEvtId ∈ delivered posts     explicit thread dependency
//! ```
//!
//! Vector clocks do not capture the thread dependency on their own (a reply
//! can be authored on a replica that learned the post from a third replica),
//! so clause 3 is checked separately.

use crate::clock::VectorClock;
use crate::event::{Event, EventId, ReplicaId};
use std::collections::{BTreeSet, HashSet};

/// Lookup of delivered root posts, consulted for clause 3.
pub trait PostIndex {
    fn contains_post(&self, evt_id: &str) -> bool;
}

impl PostIndex for HashSet<EventId> {
    fn contains_post(&self, evt_id: &str) -> bool {
        self.contains(evt_id)
    }
}

impl PostIndex for BTreeSet<EventId> {
    fn contains_post(&self, evt_id: &str) -> bool {
        self.contains(evt_id)
    }
}

/// Outcome of checking an event against the local clock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Readiness {
    /// All clauses hold.
    Ready,
    /// `Ve[s] <= V[s]`: this event (or its slot) was already delivered.
    Delivered { sequence: u64 },
    /// Earlier events from the same origin are missing.
    Gap { expected: u64, found: u64 },
    /// The origin had seen events from `replica` that are not delivered here.
    MissingDependency {
        replica: ReplicaId,
        required: u64,
        delivered: u64,
    },
    /// The parent post is not delivered here.
    MissingParent(EventId),
    /// The event carries no vector.
    Unstamped,
    /// The stamp does not fit this replica set.
    Malformed(String),
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready)
    }

    /// A stale duplicate: it can never become deliverable.
    pub fn is_stale(&self) -> bool {
        matches!(self, Readiness::Delivered { .. })
    }

    /// Held for a missing predecessor; may become deliverable later.
    pub fn is_waiting(&self) -> bool {
        matches!(
            self,
            Readiness::Gap { .. } | Readiness::MissingDependency { .. } | Readiness::MissingParent(_)
        )
    }
}

/// Structural validation of a causal stamp against a replica set of
/// `replicas` members. Independent of the local clock's values.
pub fn validate_stamp(replicas: usize, event: &Event) -> Result<(), String> {
    let stamp = event.vector.as_ref().ok_or("event has no vector")?;
    if event.process_id >= replicas {
        return Err(format!(
            "origin {} outside replica set of {}",
            event.process_id, replicas
        ));
    }
    if stamp.len() != replicas {
        return Err(format!(
            "vector has {} entries, expected {}",
            stamp.len(),
            replicas
        ));
    }
    if stamp.get(event.process_id) == 0 {
        return Err("origin coordinate is zero".to_string());
    }
    Ok(())
}

/// Evaluate the three delivery clauses and report the first one that fails.
pub fn check<P: PostIndex + ?Sized>(clock: &VectorClock, event: &Event, posts: &P) -> Readiness {
    let stamp = match event.vector.as_ref() {
        Some(stamp) => stamp,
        None => return Readiness::Unstamped,
    };
    if let Err(reason) = validate_stamp(clock.len(), event) {
        return Readiness::Malformed(reason);
    }

    let sender = event.process_id;
    let expected = clock.get(sender) + 1;
    let found = stamp.get(sender);
    if found < expected {
        return Readiness::Delivered { sequence: found };
    }
    if found > expected {
        return Readiness::Gap { expected, found };
    }

    let missing = stamp
        .as_slice()
        .iter()
        .zip(clock.as_slice())
        .enumerate()
        .find(|&(replica, (required, delivered))| replica != sender && required > delivered);
    if let Some((replica, (&required, &delivered))) = missing {
        return Readiness::MissingDependency {
            replica,
            required,
            delivered,
        };
    }

    if let Some(parent) = &event.parent_evt_id {
        if !posts.contains_post(parent) {
            return Readiness::MissingParent(parent.clone());
        }
    }

    Readiness::Ready
}

/// `true` iff [`check`] returns [`Readiness::Ready`].
pub fn can_deliver<P: PostIndex + ?Sized>(clock: &VectorClock, event: &Event, posts: &P) -> bool {
    check(clock, event, posts).is_ready()
}
