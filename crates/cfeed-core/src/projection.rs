//! Read-only feed projection.
//!
//! A [`FeedView`] is a snapshot derived from a [`FeedStore`]: threads (a post
//! and its replies), orphan replies, and the ids still held back by the
//! causal buffer. It is what the HTTP layer returns and what the console
//! rendering prints.

use crate::clock::VectorClock;
use crate::event::{Event, EventId, ReplicaId};
use crate::store::FeedStore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How root posts are ordered in a view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostOrder {
    /// The order posts were delivered at this replica.
    Delivery,
    /// By author-side timestamp, then origin, then id.
    Timestamp,
}

/// A root post and its replies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub post: Event,
    pub replies: Vec<Event>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedView {
    pub replica: ReplicaId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock: Option<VectorClock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    pub threads: Vec<Thread>,
    pub orphans: Vec<Event>,
    pub pending: Vec<EventId>,
}

impl FeedView {
    /// Project the store of `replica`.
    pub fn project(replica: ReplicaId, store: &FeedStore, order: PostOrder) -> Self {
        let mut posts: Vec<&Event> = store.posts().collect();
        if order == PostOrder::Timestamp {
            posts.sort_by(|a, b| {
                (a.timestamp.unwrap_or(0), a.process_id, &a.evt_id).cmp(&(
                    b.timestamp.unwrap_or(0),
                    b.process_id,
                    &b.evt_id,
                ))
            });
        }

        let threads = posts
            .into_iter()
            .map(|post| Thread {
                post: post.clone(),
                replies: store.replies(&post.evt_id).cloned().collect(),
            })
            .collect();

        Self {
            replica,
            clock: None,
            timestamp: None,
            threads,
            orphans: store.orphans().cloned().collect(),
            pending: Vec::new(),
        }
    }

    pub fn with_clock(mut self, clock: VectorClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_pending(mut self, pending: Vec<EventId>) -> Self {
        self.pending = pending;
        self
    }

    /// Root post ids, in view order.
    pub fn post_ids(&self) -> Vec<&str> {
        self.threads.iter().map(|t| t.post.evt_id.as_str()).collect()
    }

    pub fn thread(&self, post_id: &str) -> Option<&Thread> {
        self.threads.iter().find(|t| t.post.evt_id == post_id)
    }

    /// Reply ids under `post_id`, in view order.
    pub fn reply_ids(&self, post_id: &str) -> Vec<&str> {
        self.thread(post_id)
            .map(|t| t.replies.iter().map(|r| r.evt_id.as_str()).collect())
            .unwrap_or_default()
    }
}

impl fmt::Display for FeedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "================ FEED =================")?;
        write!(f, "Replica {}", self.replica)?;
        if let Some(clock) = &self.clock {
            write!(f, " | VC = {}", clock)?;
        }
        if let Some(ts) = self.timestamp {
            write!(f, " | ts = {}", ts)?;
        }
        writeln!(f)?;

        for thread in &self.threads {
            let post = &thread.post;
            write!(f, "\nPOST {} ({}): {}", post.evt_id, post.author, post.text)?;
            if let Some(ts) = post.timestamp {
                write!(f, " | ts={}", ts)?;
            }
            writeln!(f)?;
            for reply in &thread.replies {
                writeln!(
                    f,
                    "   ↳ REPLY {} ({}): {}",
                    reply.evt_id, reply.author, reply.text
                )?;
            }
        }

        if !self.orphans.is_empty() {
            writeln!(f, "\n--- ORPHAN REPLIES ---")?;
            for reply in &self.orphans {
                writeln!(
                    f,
                    "parent={} | REPLY {} ({}): {}",
                    reply.parent_evt_id.as_deref().unwrap_or("?"),
                    reply.evt_id,
                    reply.author,
                    reply.text
                )?;
            }
        }

        if !self.pending.is_empty() {
            writeln!(f, "\n--- CAUSAL BUFFER ---")?;
            for id in &self.pending {
                writeln!(f, "Event {} waiting for dependencies", id)?;
            }
        }

        write!(f, "=======================================")
    }
}
