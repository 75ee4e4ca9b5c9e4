//! Feed events: root posts and threaded replies.
//!
//! Events are immutable once stamped. The JSON shape uses the camel-case
//! field names replicas exchange on the wire:
//!
//! ```text
//! {"processId": 0, "evtId": "a", "parentEvtId": null,
//!  "author": "alice", "text": "hi", "vector": [1, 0, 0]}
//! ```

use crate::clock::VectorClock;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Index of a replica in the static peer list.
pub type ReplicaId = usize;

/// Opaque, caller-supplied event identifier.
pub type EventId = String;

/// Generate a fresh, sortable event id.
pub fn new_event_id() -> EventId {
    Ulid::new().to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Origin replica.
    pub process_id: ReplicaId,
    pub evt_id: EventId,
    /// The post this event replies to; `None` for a root post.
    #[serde(default)]
    pub parent_evt_id: Option<EventId>,
    pub author: String,
    pub text: String,
    /// Causal stamp: the origin's clock right after it authored this event.
    #[serde(default)]
    pub vector: Option<VectorClock>,
    /// Eventual-mode stamp: the origin's counter at authoring time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl Event {
    /// An unstamped root post.
    pub fn post(
        evt_id: impl Into<EventId>,
        author: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            process_id: 0,
            evt_id: evt_id.into(),
            parent_evt_id: None,
            author: author.into(),
            text: text.into(),
            vector: None,
            timestamp: None,
        }
    }

    /// An unstamped reply to `parent`.
    pub fn reply(
        evt_id: impl Into<EventId>,
        parent: impl Into<EventId>,
        author: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            parent_evt_id: Some(parent.into()),
            ..Self::post(evt_id, author, text)
        }
    }

    pub fn with_origin(mut self, replica: ReplicaId) -> Self {
        self.process_id = replica;
        self
    }

    pub fn with_vector(mut self, vector: impl Into<VectorClock>) -> Self {
        self.vector = Some(vector.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn is_post(&self) -> bool {
        self.parent_evt_id.is_none()
    }

    pub fn is_reply(&self) -> bool {
        self.parent_evt_id.is_some()
    }

    /// Position of this event in its origin's send sequence (1-based), if
    /// it carries a causal stamp.
    pub fn sequence(&self) -> Option<u64> {
        self.vector.as_ref().map(|v| v.get(self.process_id))
    }
}
