//! Causal buffer: received events that are not yet deliverable.
//!
//! Events are indexed by origin replica and, within an origin, by their
//! sequence number `Ve[origin]`. Sender FIFO means only the entry at
//! `V[origin] + 1` can ever pass the predicate, so a delivery pass looks at
//! no more than one candidate per origin:
//!
//! ```text
//! origin 0: { 3: e03, 4: e04 }      V[0] = 2  -> candidate e03
//! origin 1: { 7: e17 }              V[1] = 5  -> none (gap)
//! origin 2: { 1: e21 }              V[2] = 0  -> candidate e21
//! ```
//!
//! Every entry also remembers its arrival number so that, among several
//! ready candidates, the earliest arrival is delivered first.
//!
//! An entry is identified by its slot, not by its id. Ids are chosen by
//! clients and two origins may reuse one; the slot is unique per event.

use cfeed_core::{Event, EventId, ReplicaId, VectorClock};
use std::collections::{BTreeMap, HashMap};

/// Sequence number of an event within its origin's send order.
pub type SeqNo = u64;

/// An event waiting in the buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Buffered {
    pub arrival: u64,
    pub seq: SeqNo,
    pub event: Event,
}

/// Result of offering an event to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Buffered,
    /// This very event already occupies its slot.
    Duplicate,
    /// Another event already occupies this (origin, sequence) slot.
    SlotTaken,
    /// The event carries no causal stamp.
    Unstamped,
}

#[derive(Clone, Debug, Default)]
pub struct CausalBuffer {
    by_origin: BTreeMap<ReplicaId, BTreeMap<SeqNo, Buffered>>,
    ids: HashMap<EventId, usize>,
    len: usize,
    next_arrival: u64,
}

impl CausalBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, event: Event) -> Admission {
        let seq = match event.sequence() {
            Some(seq) => seq,
            None => return Admission::Unstamped,
        };

        let slots = self.by_origin.entry(event.process_id).or_default();
        if let Some(taken) = slots.get(&seq) {
            return if taken.event.evt_id == event.evt_id {
                Admission::Duplicate
            } else {
                Admission::SlotTaken
            };
        }

        self.next_arrival += 1;
        self.len += 1;
        *self.ids.entry(event.evt_id.clone()).or_default() += 1;
        slots.insert(
            seq,
            Buffered {
                arrival: self.next_arrival,
                seq,
                event,
            },
        );
        Admission::Buffered
    }

    pub fn contains(&self, evt_id: &str) -> bool {
        self.ids.contains_key(evt_id)
    }

    /// The entry at `(origin, seq)`, if one is buffered.
    pub fn get(&self, origin: ReplicaId, seq: SeqNo) -> Option<&Buffered> {
        self.by_origin.get(&origin)?.get(&seq)
    }

    /// The next-expected entry of every origin, given the local clock.
    pub fn candidates<'a>(&'a self, clock: &'a VectorClock) -> impl Iterator<Item = &'a Buffered> + 'a {
        self.by_origin
            .iter()
            .filter_map(move |(&origin, slots)| slots.get(&(clock.get(origin) + 1)))
    }

    /// Remove the entry at `(origin, seq)`.
    pub fn take(&mut self, origin: ReplicaId, seq: SeqNo) -> Option<Event> {
        let slots = self.by_origin.get_mut(&origin)?;
        let entry = slots.remove(&seq)?;
        if slots.is_empty() {
            self.by_origin.remove(&origin);
        }
        self.forget(&entry.event.evt_id);
        Some(entry.event)
    }

    /// Drop entries whose slot the clock has already passed. Returns them.
    pub fn purge_delivered(&mut self, clock: &VectorClock) -> Vec<Event> {
        let mut purged = Vec::new();
        for (&origin, slots) in self.by_origin.iter_mut() {
            let delivered = clock.get(origin);
            let keep = slots.split_off(&(delivered + 1));
            purged.extend(std::mem::replace(slots, keep).into_values().map(|e| e.event));
        }
        self.by_origin.retain(|_, slots| !slots.is_empty());
        for event in &purged {
            self.forget(&event.evt_id);
        }
        purged
    }

    fn forget(&mut self, evt_id: &str) {
        self.len -= 1;
        if let Some(count) = self.ids.get_mut(evt_id) {
            *count -= 1;
            if *count == 0 {
                self.ids.remove(evt_id);
            }
        }
    }

    /// Buffered entries in arrival order.
    pub fn iter_arrival(&self) -> impl Iterator<Item = &Buffered> {
        let mut entries: Vec<&Buffered> = self.by_origin.values().flat_map(|s| s.values()).collect();
        entries.sort_by_key(|b| b.arrival);
        entries.into_iter()
    }

    /// Buffered event ids in arrival order.
    pub fn pending_ids(&self) -> Vec<EventId> {
        self.iter_arrival().map(|b| b.event.evt_id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamped(origin: ReplicaId, id: &str, vector: Vec<u64>) -> Event {
        Event::post(id, "alice", "text")
            .with_origin(origin)
            .with_vector(vector)
    }

    #[test]
    fn test_candidates_are_next_expected_per_origin() {
        let mut buffer = CausalBuffer::new();
        buffer.insert(stamped(0, "a3", vec![3, 0, 0]));
        buffer.insert(stamped(0, "a4", vec![4, 0, 0]));
        buffer.insert(stamped(1, "b7", vec![0, 7, 0]));
        buffer.insert(stamped(2, "c1", vec![0, 0, 1]));

        let clock = VectorClock::from_counters(vec![2, 5, 0]);
        let mut ids: Vec<_> = buffer
            .candidates(&clock)
            .map(|b| b.event.evt_id.as_str())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["a3", "c1"]);
    }

    #[test]
    fn test_rejects_duplicates() {
        let mut buffer = CausalBuffer::new();
        assert_eq!(
            buffer.insert(stamped(0, "a", vec![2, 0, 0])),
            Admission::Buffered
        );
        assert_eq!(
            buffer.insert(stamped(0, "a", vec![2, 0, 0])),
            Admission::Duplicate
        );
        assert_eq!(
            buffer.insert(stamped(0, "other", vec![2, 0, 0])),
            Admission::SlotTaken
        );
        assert_eq!(
            buffer.insert(Event::post("u", "alice", "text")),
            Admission::Unstamped
        );
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_same_id_from_two_origins_gets_two_slots() {
        let mut buffer = CausalBuffer::new();
        assert_eq!(
            buffer.insert(stamped(0, "1", vec![2, 0, 0])),
            Admission::Buffered
        );
        assert_eq!(
            buffer.insert(stamped(1, "1", vec![0, 2, 0])),
            Admission::Buffered
        );
        assert_eq!(buffer.len(), 2);

        assert_eq!(buffer.take(0, 2).unwrap().process_id, 0);
        assert!(buffer.contains("1"));
        assert_eq!(buffer.get(1, 2).unwrap().event.process_id, 1);

        buffer.purge_delivered(&VectorClock::from_counters(vec![0, 2, 0]));
        assert!(!buffer.contains("1"));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_take_and_arrival_order() {
        let mut buffer = CausalBuffer::new();
        buffer.insert(stamped(1, "second", vec![0, 2, 0]));
        buffer.insert(stamped(0, "first", vec![2, 0, 0]));

        assert_eq!(buffer.pending_ids(), vec!["second", "first"]);

        let taken = buffer.take(1, 2).unwrap();
        assert_eq!(taken.evt_id, "second");
        assert!(!buffer.contains("second"));
        assert_eq!(buffer.len(), 1);
        assert!(buffer.take(1, 2).is_none());
    }

    #[test]
    fn test_purge_delivered() {
        let mut buffer = CausalBuffer::new();
        buffer.insert(stamped(0, "old", vec![1, 0, 0]));
        buffer.insert(stamped(0, "new", vec![3, 0, 0]));

        let purged = buffer.purge_delivered(&VectorClock::from_counters(vec![2, 0, 0]));
        assert_eq!(purged.len(), 1);
        assert_eq!(purged[0].evt_id, "old");
        assert_eq!(buffer.pending_ids(), vec!["new"]);
    }
}
