//! Error types for the causal feed SDK.

use cfeed_core::ReplicaId;
use cfeed_delivery::DeliveryError;
use thiserror::Error;

/// Failure of a single peer send.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("Peer not found: {0}")]
    PeerNotFound(ReplicaId),
    #[error("Send failed: {0}")]
    SendFailed(String),
    #[error("Disconnected from peer {0}")]
    Disconnected(ReplicaId),
    #[error("Send to peer {peer} timed out after {timeout_ms}ms")]
    Timeout { peer: ReplicaId, timeout_ms: u64 },
}

/// Error type for SDK operations.
#[derive(Debug, Error)]
pub enum SdkError {
    /// The replica refused the event.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for SDK operations.
pub type Result<T> = std::result::Result<T, SdkError>;
