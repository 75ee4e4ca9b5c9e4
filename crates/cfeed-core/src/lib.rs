// File: `crates/cfeed-core/src/lib.rs`
//! Core types for the causal feed: events, vector clocks, the delivery
//! predicate, the feed store and its read projection.

pub mod clock;
pub mod event;
pub mod lattice;
pub mod predicate;
pub mod projection;
pub mod store;

pub use clock::{ClockOrdering, VectorClock};
pub use event::{new_event_id, Event, EventId, ReplicaId};
pub use lattice::Lattice;
pub use predicate::{can_deliver, check, validate_stamp, PostIndex, Readiness};
pub use projection::{FeedView, PostOrder, Thread};
pub use store::{FeedStore, Insertion};
