//! Causal feed delivery
//!
//! This crate turns the pure types of `cfeed-core` into replicas:
//! - [`CausalReplica`]: vector-clock gated delivery with a causal buffer
//! - [`EventualReplica`]: apply on receipt, order at read time
//! - [`Cluster`]: an in-process replica set over a simulated network
//!
//! # Example
//!
//! ```rust
//! use cfeed_core::Event;
//! use cfeed_delivery::{CausalReplica, FeedReplica};
//!
//! let mut alice = CausalReplica::new(0, 2);
//! let mut bob = CausalReplica::new(1, 2);
//!
//! let post = alice.local_post(Event::post("p1", "alice", "hello")).unwrap().event;
//! let reply = alice.local_post(Event::reply("r1", "p1", "alice", "me again")).unwrap().event;
//!
//! // The reply overtakes the post on the way to bob.
//! assert!(!bob.receive(reply).unwrap().was_delivered());
//! let report = bob.receive(post).unwrap();
//! assert_eq!(report.delivered, vec!["p1".to_string(), "r1".to_string()]);
//! ```

pub mod buffer;
pub mod causal;
pub mod error;
pub mod eventual;
pub mod replica;
pub mod sim;

pub use buffer::{Admission, Buffered, CausalBuffer, SeqNo};
pub use causal::CausalReplica;
pub use error::{DeliveryError, Result};
pub use eventual::EventualReplica;
pub use replica::{new_replica, Consistency, DeliveryReport, FeedReplica, Outcome, Stamped};
pub use sim::{digest, Cluster, Envelope, FeedDigest, NetworkConfig, NetworkSimulator};
