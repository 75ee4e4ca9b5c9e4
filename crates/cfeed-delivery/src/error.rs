//! Error types for the delivery engine.

use cfeed_core::EventId;
use thiserror::Error;

/// Errors returned by replica ingress. None of them mutate state.
///
/// Events that are merely not deliverable yet are not errors: they stay in
/// the causal buffer and show up as [`crate::Outcome::Held`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("malformed event {evt_id}: {reason}")]
    Malformed { evt_id: EventId, reason: String },

    #[error("parent post {parent} of {evt_id} is not delivered at this replica")]
    UnknownParent { evt_id: EventId, parent: EventId },

    #[error("event id {0} is already in use at this replica")]
    DuplicateId(EventId),
}

pub type Result<T> = std::result::Result<T, DeliveryError>;
