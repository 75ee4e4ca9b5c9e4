//! Causal Consistency Tests
//!
//! These tests drive whole replica sets through reordered networks and check
//! that no replica ever exposes a reply before its post, and that a held
//! event is delivered as soon as its dependencies arrive.

use cfeed_core::{Event, VectorClock};
use cfeed_delivery::{
    CausalReplica, Cluster, Consistency, Envelope, FeedReplica, NetworkConfig, Outcome,
};

fn assert_threads_intact(replica: &dyn FeedReplica) {
    let store = replica.store();
    let log = store.delivery_log();
    for (pos, evt_id) in log.iter().enumerate() {
        let event = store.get(evt_id).expect("logged event is stored");
        if let Some(parent) = &event.parent_evt_id {
            let parent_pos = log
                .iter()
                .position(|id| id == parent)
                .unwrap_or_else(|| panic!("reply {} delivered without its post", evt_id));
            assert!(
                parent_pos < pos,
                "reply {} delivered before post {}",
                evt_id,
                parent
            );
        }
    }
    assert!(store.orphans().next().is_none());
}

/// Post and reply from one replica, reply overtakes the post.
#[test]
fn test_reply_waits_for_post() {
    let mut cluster = Cluster::new(3, Consistency::Causal, NetworkConfig::default());

    let a = cluster.post(0, Event::post("A", "alice", "root")).unwrap();
    let b = cluster.post(0, Event::reply("B", "A", "alice", "reply")).unwrap();
    assert_eq!(a.vector, Some(VectorClock::from_counters(vec![1, 0, 0])));
    assert_eq!(b.vector, Some(VectorClock::from_counters(vec![2, 0, 0])));

    // Replica 2 gets B first.
    let late = cluster
        .network_mut()
        .receive_where(|e| e.to == 2 && e.event.evt_id == "B")
        .unwrap();
    let report = cluster.deliver_to(late.to, late.event).unwrap();
    assert!(matches!(report.outcome, Outcome::Held(_)));
    assert_eq!(cluster.replica(2).pending_count(), 1);
    assert!(cluster.replica(2).view().threads.is_empty());

    cluster.drain_network().unwrap();

    let view = cluster.replica(2).view();
    assert_eq!(view.post_ids(), vec!["A"]);
    assert_eq!(view.reply_ids("A"), vec!["B"]);
    assert_eq!(view.clock.unwrap().as_slice(), &[2, 0, 0]);
    assert!(cluster.is_converged());
}

/// Three independent posts converge to the same clock everywhere.
#[test]
fn test_concurrent_posts_converge() {
    let mut cluster = Cluster::new(3, Consistency::Causal, NetworkConfig::default());
    for i in 0..3 {
        cluster
            .post(i, Event::post(format!("root-{}", i), "user", "hello"))
            .unwrap();
    }
    cluster.drain_network().unwrap();

    for i in 0..3 {
        let view = cluster.replica(i).view();
        assert_eq!(view.threads.len(), 3);
        assert_eq!(view.clock.unwrap().as_slice(), &[1, 1, 1]);
    }
    assert!(cluster.is_converged());
}

#[test]
fn test_conversation_across_replicas_under_reordering() {
    for seed in [1u64, 7, 42, 1234, 99_999] {
        let config = NetworkConfig::reordering(0.8).with_seed(seed);
        let mut cluster = Cluster::new(4, Consistency::Causal, config);

        cluster.post(0, Event::post("q", "alice", "question?")).unwrap();
        // Every replica must see the question before it can answer.
        cluster.drain_network().unwrap();
        cluster.post(1, Event::reply("a1", "q", "bob", "answer one")).unwrap();
        cluster.post(2, Event::reply("a2", "q", "carol", "answer two")).unwrap();
        cluster.post(3, Event::post("other", "dave", "unrelated")).unwrap();
        cluster.post(1, Event::post("follow", "bob", "new thread")).unwrap();
        cluster.drain_network().unwrap();

        assert!(cluster.is_converged(), "seed {} did not converge", seed);
        for i in 0..4 {
            assert_threads_intact(cluster.replica(i));
            assert_eq!(cluster.replica(i).store().reply_count(), 2);
            assert_eq!(cluster.replica(i).store().post_count(), 3);
        }
    }
}

#[test]
fn test_chain_unblocked_by_single_arrival() {
    let mut author = CausalReplica::new(0, 2);
    let events: Vec<Event> = (1..=5)
        .map(|i| {
            author
                .post(Event::post(format!("p{}", i), "alice", "x"))
                .unwrap()
                .event
        })
        .collect();

    let mut reader = CausalReplica::new(1, 2);
    for event in events.iter().skip(1).rev() {
        let report = reader.share(event.clone()).unwrap();
        assert!(report.delivered.is_empty());
    }
    assert_eq!(reader.pending_count(), 4);

    let report = reader.share(events[0].clone()).unwrap();
    assert_eq!(report.delivered, vec!["p1", "p2", "p3", "p4", "p5"]);
    assert_eq!(report.pending, 0);
    assert_eq!(reader.clock().as_slice(), &[5, 0]);
}

#[test]
fn test_lost_dependency_blocks_until_retransmit() {
    let mut cluster = Cluster::new(2, Consistency::Causal, NetworkConfig::default());
    cluster.post(0, Event::post("a", "alice", "root")).unwrap();
    cluster.post(0, Event::reply("b", "a", "alice", "re")).unwrap();

    // Drop "a" on the floor and deliver only "b".
    let lost = cluster
        .network_mut()
        .receive_where(|e| e.event.evt_id == "a")
        .unwrap();
    cluster.drain_network().unwrap();
    assert_eq!(cluster.replica(1).pending_count(), 1);
    assert!(cluster.replica(1).store().is_empty());
    assert!(!cluster.is_converged());

    cluster.network_mut().send(Envelope {
        to: lost.to,
        event: lost.event,
    });
    cluster.drain_network().unwrap();
    assert!(cluster.is_converged());
    assert_threads_intact(cluster.replica(1));
}

#[test]
fn test_eventual_cluster_may_show_orphans() {
    let mut cluster = Cluster::new(3, Consistency::Eventual, NetworkConfig::default());
    cluster.post(0, Event::post("A", "alice", "root")).unwrap();
    cluster.post(0, Event::reply("B", "A", "alice", "reply")).unwrap();

    let early = cluster
        .network_mut()
        .receive_where(|e| e.to == 2 && e.event.evt_id == "B")
        .unwrap();
    cluster.deliver_to(early.to, early.event).unwrap();

    let view = cluster.replica(2).view();
    assert_eq!(view.orphans.len(), 1);
    assert_eq!(view.orphans[0].parent_evt_id.as_deref(), Some("A"));

    cluster.drain_network().unwrap();
    let view = cluster.replica(2).view();
    assert!(view.orphans.is_empty());
    assert_eq!(view.reply_ids("A"), vec!["B"]);
    assert!(cluster.is_converged());
}

/// Two clients at different replicas pick the same id. Every later event
/// from either origin must still be delivered everywhere.
#[test]
fn test_reused_id_does_not_stall_origin() {
    let mut cluster = Cluster::new(3, Consistency::Causal, NetworkConfig::reordering(1.0));
    cluster.post(0, Event::post("1", "alice", "from r0")).unwrap();
    cluster.post(1, Event::post("1", "bob", "from r1")).unwrap();
    cluster.post(1, Event::reply("2", "1", "bob", "follow-up")).unwrap();

    cluster.drain_network().unwrap();

    assert_eq!(cluster.total_pending(), 0);
    for idx in 0..cluster.len() {
        let view = cluster.replica(idx).view();
        assert_eq!(view.clock.as_ref().unwrap().as_slice(), &[1, 2, 0]);
        assert_eq!(view.post_ids(), vec!["1"]);
        assert_eq!(view.reply_ids("1"), vec!["2"]);
    }
    assert!(cluster.is_converged());
}
