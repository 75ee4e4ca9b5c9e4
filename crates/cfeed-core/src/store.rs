//! Feed store: the delivered posts and replies of one replica.
//!
//! Once an event is inserted here it is visible. The store keeps:
//! - root posts in delivery order,
//! - for each parent id, its replies in delivery order,
//! - the full delivery log, which lets tests check ordering properties.
//!
//! Replies are indexed by parent id even when that parent has not been
//! delivered. The causal engine never produces such orphans; the eventual
//! variant does, and they surface through [`FeedStore::orphans`].

use crate::event::{Event, EventId};
use crate::predicate::PostIndex;
use std::collections::HashMap;

/// Result of inserting an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    Post,
    Reply,
    /// The `evtId` was already delivered; nothing changed.
    Duplicate,
}

#[derive(Clone, Debug, Default)]
pub struct FeedStore {
    events: HashMap<EventId, Event>,
    post_order: Vec<EventId>,
    replies: HashMap<EventId, Vec<EventId>>,
    delivery_log: Vec<EventId>,
}

impl FeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a delivered event. Idempotent per `evtId`.
    pub fn insert(&mut self, event: Event) -> Insertion {
        if self.events.contains_key(&event.evt_id) {
            return Insertion::Duplicate;
        }

        let id = event.evt_id.clone();
        let insertion = match &event.parent_evt_id {
            None => {
                self.post_order.push(id.clone());
                Insertion::Post
            }
            Some(parent) => {
                self.replies
                    .entry(parent.clone())
                    .or_default()
                    .push(id.clone());
                Insertion::Reply
            }
        };
        self.delivery_log.push(id.clone());
        self.events.insert(id, event);
        insertion
    }

    /// Whether an event (post or reply) with this id was delivered.
    pub fn contains(&self, evt_id: &str) -> bool {
        self.events.contains_key(evt_id)
    }

    pub fn get(&self, evt_id: &str) -> Option<&Event> {
        self.events.get(evt_id)
    }

    /// A delivered root post.
    pub fn post(&self, evt_id: &str) -> Option<&Event> {
        self.events.get(evt_id).filter(|e| e.is_post())
    }

    /// Root posts in delivery order.
    pub fn posts(&self) -> impl Iterator<Item = &Event> + '_ {
        self.post_order.iter().filter_map(|id| self.events.get(id))
    }

    /// Replies to `post_id` in delivery order.
    pub fn replies<'a>(&'a self, post_id: &str) -> impl Iterator<Item = &'a Event> + 'a {
        self.replies
            .get(post_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.events.get(id))
    }

    /// Delivered replies whose parent post is not delivered, in delivery
    /// order.
    pub fn orphans(&self) -> impl Iterator<Item = &Event> + '_ {
        self.delivery_log
            .iter()
            .filter_map(|id| self.events.get(id))
            .filter(|e| match &e.parent_evt_id {
                Some(parent) => !self.contains_post(parent),
                None => false,
            })
    }

    /// Every delivered id, in the order it was delivered.
    pub fn delivery_log(&self) -> &[EventId] {
        &self.delivery_log
    }

    pub fn post_count(&self) -> usize {
        self.post_order.len()
    }

    pub fn reply_count(&self) -> usize {
        self.events.len() - self.post_order.len()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl PostIndex for FeedStore {
    fn contains_post(&self, evt_id: &str) -> bool {
        self.post(evt_id).is_some()
    }
}
