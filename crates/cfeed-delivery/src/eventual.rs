//! Eventual-consistency variant.
//!
//! One monotonic counter per replica replaces the vector clock, and there is
//! no buffer: every received event goes straight into the feed store. Order
//! is resolved when the feed is read (posts sorted by timestamp), and a reply
//! that arrives before its post is shown as an orphan until the post shows
//! up. Replicas converge on the same set of events, but a reader can see a
//! reply without its post, which the causal engine never allows.

use crate::error::{DeliveryError, Result};
use crate::replica::{Consistency, DeliveryReport, FeedReplica, Outcome, Stamped};
use cfeed_core::{Event, FeedStore, FeedView, Insertion, PostOrder, ReplicaId};

#[derive(Debug, Clone)]
pub struct EventualReplica {
    id: ReplicaId,
    replicas: usize,
    timestamp: u64,
    store: FeedStore,
}

impl EventualReplica {
    pub fn new(id: ReplicaId, replicas: usize) -> Self {
        Self {
            id,
            replicas: replicas.max(id + 1),
            timestamp: 0,
            store: FeedStore::new(),
        }
    }

    /// Local counter: number of events authored here.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn delivered(&self, evt_id: String) -> DeliveryReport {
        DeliveryReport {
            delivered: vec![evt_id.clone()],
            evt_id,
            outcome: Outcome::Delivered,
            pending: 0,
        }
    }
}

impl FeedReplica for EventualReplica {
    fn id(&self) -> ReplicaId {
        self.id
    }

    fn consistency(&self) -> Consistency {
        Consistency::Eventual
    }

    fn local_post(&mut self, mut event: Event) -> Result<Stamped> {
        if self.store.contains(&event.evt_id) {
            return Err(DeliveryError::DuplicateId(event.evt_id));
        }

        self.timestamp += 1;
        event.process_id = self.id;
        event.timestamp = Some(self.timestamp);
        event.vector = None;

        self.store.insert(event.clone());
        let report = self.delivered(event.evt_id.clone());
        Ok(Stamped { event, report })
    }

    fn receive(&mut self, event: Event) -> Result<DeliveryReport> {
        if event.process_id >= self.replicas {
            return Err(DeliveryError::Malformed {
                reason: format!(
                    "origin {} outside replica set of {}",
                    event.process_id, self.replicas
                ),
                evt_id: event.evt_id,
            });
        }

        let evt_id = event.evt_id.clone();
        match self.store.insert(event) {
            Insertion::Duplicate => Ok(DeliveryReport::duplicate(evt_id, 0)),
            Insertion::Post | Insertion::Reply => Ok(self.delivered(evt_id)),
        }
    }

    fn store(&self) -> &FeedStore {
        &self.store
    }

    fn pending_count(&self) -> usize {
        0
    }

    fn view(&self) -> FeedView {
        FeedView::project(self.id, &self.store, PostOrder::Timestamp).with_timestamp(self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_post_increments_timestamp() {
        let mut replica = EventualReplica::new(1, 3);
        let a = replica.local_post(Event::post("a", "alice", "one")).unwrap();
        let b = replica.local_post(Event::post("b", "alice", "two")).unwrap();

        assert_eq!(a.event.timestamp, Some(1));
        assert_eq!(b.event.timestamp, Some(2));
        assert_eq!(b.event.process_id, 1);
        assert!(b.event.vector.is_none());
        assert_eq!(replica.timestamp(), 2);
    }

    #[test]
    fn test_orphan_reply_moves_under_parent() {
        let mut author = EventualReplica::new(0, 3);
        let post = author.local_post(Event::post("p", "alice", "root")).unwrap().event;
        let reply = author
            .local_post(Event::reply("r", "p", "alice", "re"))
            .unwrap()
            .event;

        let mut reader = EventualReplica::new(2, 3);
        assert!(reader.receive(reply).unwrap().was_delivered());

        let view = reader.view();
        assert!(view.threads.is_empty());
        assert_eq!(view.orphans.len(), 1);
        assert_eq!(view.orphans[0].evt_id, "r");

        reader.receive(post).unwrap();
        let view = reader.view();
        assert!(view.orphans.is_empty());
        assert_eq!(view.reply_ids("p"), vec!["r"]);
    }

    #[test]
    fn test_posts_sorted_by_timestamp() {
        let mut reader = EventualReplica::new(0, 3);
        reader
            .receive(Event::post("late", "bob", "b").with_origin(1).with_timestamp(3))
            .unwrap();
        reader
            .receive(Event::post("early", "carol", "c").with_origin(2).with_timestamp(1))
            .unwrap();

        assert_eq!(reader.view().post_ids(), vec!["early", "late"]);
    }

    #[test]
    fn test_duplicate_receive_is_idempotent() {
        let mut reader = EventualReplica::new(0, 2);
        let event = Event::post("a", "bob", "b").with_origin(1).with_timestamp(1);

        assert!(reader.receive(event.clone()).unwrap().was_delivered());
        let again = reader.receive(event).unwrap();
        assert_eq!(again.outcome, Outcome::Duplicate);
        assert_eq!(reader.store().len(), 1);
    }

    #[test]
    fn test_out_of_range_origin_is_malformed() {
        let mut reader = EventualReplica::new(0, 2);
        let result = reader.receive(Event::post("a", "bob", "b").with_origin(9));
        assert!(matches!(result, Err(DeliveryError::Malformed { .. })));
    }
}
