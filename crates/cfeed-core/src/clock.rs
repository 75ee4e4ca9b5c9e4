//! Vector clock for causal delivery across a fixed replica set.
//!
//! `V[i]` is the number of events originated by replica `i` that the owning
//! replica has delivered. Coordinates only ever grow: [`VectorClock::increment`]
//! bumps the local coordinate, [`VectorClock::merge`] takes the coordinate-wise
//! max with an incoming stamp.

use crate::event::ReplicaId;
use crate::lattice::Lattice;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordering result when comparing two vector clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockOrdering {
    /// This clock happened before the other.
    Before,
    /// This clock happened after the other.
    After,
    /// Neither clock dominates the other.
    Concurrent,
    /// The clocks are identical.
    Equal,
}

/// A vector clock with one counter per replica.
///
/// Serialized as a plain JSON array (`[2, 0, 1]`), which is also the wire
/// shape of an event's `vector` field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorClock {
    counters: Vec<u64>,
}

impl VectorClock {
    /// Create a zeroed clock for `replicas` replicas.
    pub fn new(replicas: usize) -> Self {
        Self {
            counters: vec![0; replicas],
        }
    }

    pub fn from_counters(counters: Vec<u64>) -> Self {
        Self { counters }
    }

    /// Number of replicas tracked.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Counter for a replica (0 for an index past the end).
    pub fn get(&self, replica: ReplicaId) -> u64 {
        self.counters.get(replica).copied().unwrap_or(0)
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.counters
    }

    /// Bump the counter for `replica` and return a snapshot to stamp an
    /// outgoing event with.
    pub fn increment(&mut self, replica: ReplicaId) -> VectorClock {
        if replica >= self.counters.len() {
            self.counters.resize(replica + 1, 0);
        }
        self.counters[replica] += 1;
        self.clone()
    }

    /// Merge an incoming stamp: `V[i] = max(V[i], incoming[i])`.
    pub fn merge(&mut self, incoming: &VectorClock) {
        if incoming.counters.len() > self.counters.len() {
            self.counters.resize(incoming.counters.len(), 0);
        }
        for (mine, &theirs) in self.counters.iter_mut().zip(&incoming.counters) {
            *mine = (*mine).max(theirs);
        }
    }

    /// True if every coordinate of `self` is >= the matching one in `other`.
    pub fn dominates(&self, other: &VectorClock) -> bool {
        other.leq(self)
    }

    /// Compare this clock with another.
    pub fn compare(&self, other: &VectorClock) -> ClockOrdering {
        match self.partial_cmp_lattice(other) {
            Some(std::cmp::Ordering::Equal) => ClockOrdering::Equal,
            Some(std::cmp::Ordering::Less) => ClockOrdering::Before,
            Some(std::cmp::Ordering::Greater) => ClockOrdering::After,
            None => ClockOrdering::Concurrent,
        }
    }

    /// Sum of all counters: the number of events this clock has seen.
    pub fn total(&self) -> u64 {
        self.counters.iter().sum()
    }
}

impl Lattice for VectorClock {
    fn bottom() -> Self {
        Self::default()
    }

    fn join(&self, other: &Self) -> Self {
        let mut joined = self.clone();
        joined.merge(other);
        joined
    }

    fn join_assign(&mut self, other: &Self) {
        self.merge(other);
    }

    // Trailing zeros are insignificant, so compare coordinate-wise instead of
    // relying on `==` between vectors of different lengths.
    fn partial_cmp_lattice(&self, other: &Self) -> Option<std::cmp::Ordering> {
        let width = self.len().max(other.len());
        let mut self_le = true;
        let mut other_le = true;
        for i in 0..width {
            let (a, b) = (self.get(i), other.get(i));
            if a > b {
                self_le = false;
            }
            if b > a {
                other_le = false;
            }
        }
        match (self_le, other_le) {
            (true, true) => Some(std::cmp::Ordering::Equal),
            (true, false) => Some(std::cmp::Ordering::Less),
            (false, true) => Some(std::cmp::Ordering::Greater),
            (false, false) => None,
        }
    }
}

impl From<Vec<u64>> for VectorClock {
    fn from(counters: Vec<u64>) -> Self {
        Self::from_counters(counters)
    }
}

impl fmt::Display for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, counter) in self.counters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", counter)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_increment_returns_snapshot() {
        let mut clock = VectorClock::new(3);
        let stamp = clock.increment(0);
        assert_eq!(stamp.as_slice(), &[1, 0, 0]);

        let stamp = clock.increment(0);
        assert_eq!(stamp.as_slice(), &[2, 0, 0]);
        assert_eq!(clock, stamp);
    }

    #[test]
    fn test_merge_takes_max() {
        let mut clock = VectorClock::from_counters(vec![3, 0, 1]);
        clock.merge(&VectorClock::from_counters(vec![1, 2, 1]));
        assert_eq!(clock.as_slice(), &[3, 2, 1]);
    }

    #[test]
    fn test_compare() {
        let a = VectorClock::from_counters(vec![1, 0, 0]);
        let b = VectorClock::from_counters(vec![1, 1, 0]);
        let c = VectorClock::from_counters(vec![0, 0, 1]);

        assert_eq!(a.compare(&b), ClockOrdering::Before);
        assert_eq!(b.compare(&a), ClockOrdering::After);
        assert_eq!(a.compare(&c), ClockOrdering::Concurrent);
        assert_eq!(a.compare(&a.clone()), ClockOrdering::Equal);
        assert!(b.dominates(&a));
        assert!(!a.dominates(&c));
    }

    #[test]
    fn test_serializes_as_array() {
        let clock = VectorClock::from_counters(vec![2, 0, 1]);
        let json = serde_json::to_string(&clock).unwrap();
        assert_eq!(json, "[2,0,1]");
        assert_eq!(clock.to_string(), "[2, 0, 1]");
    }

    fn clock_strategy() -> impl Strategy<Value = VectorClock> {
        prop::collection::vec(0u64..20, 3).prop_map(VectorClock::from_counters)
    }

    proptest! {
        #[test]
        fn merge_is_commutative(a in clock_strategy(), b in clock_strategy()) {
            prop_assert_eq!(a.join(&b), b.join(&a));
        }

        #[test]
        fn merge_is_associative(
            a in clock_strategy(),
            b in clock_strategy(),
            c in clock_strategy()
        ) {
            prop_assert_eq!(a.join(&b).join(&c), a.join(&b.join(&c)));
        }

        #[test]
        fn merge_never_decreases(a in clock_strategy(), b in clock_strategy()) {
            let mut merged = a.clone();
            merged.merge(&b);
            prop_assert!(merged.dominates(&a));
            prop_assert!(merged.dominates(&b));
        }
    }
}
