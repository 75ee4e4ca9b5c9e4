//! Replica runtime configuration.

use cfeed_delivery::Consistency;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaConfig {
    pub consistency: Consistency,
    /// Per-peer send timeout (in milliseconds). A send that takes longer is
    /// dropped.
    pub send_timeout_ms: u64,
    /// Artificial delay before each outgoing send (in milliseconds).
    pub send_delay_ms: u64,
    /// Warn once the causal buffer holds this many events.
    pub pending_warn_threshold: usize,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            consistency: Consistency::Causal,
            send_timeout_ms: 3000,
            send_delay_ms: 0,
            pending_warn_threshold: 64,
        }
    }
}

impl ReplicaConfig {
    pub fn builder() -> ReplicaConfigBuilder {
        ReplicaConfigBuilder::new()
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }
}

/// Builder for replica configuration.
pub struct ReplicaConfigBuilder {
    config: ReplicaConfig,
}

impl ReplicaConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ReplicaConfig::default(),
        }
    }

    pub fn consistency(mut self, consistency: Consistency) -> Self {
        self.config.consistency = consistency;
        self
    }

    pub fn send_timeout(mut self, ms: u64) -> Self {
        self.config.send_timeout_ms = ms;
        self
    }

    pub fn send_delay(mut self, ms: u64) -> Self {
        self.config.send_delay_ms = ms;
        self
    }

    pub fn pending_warn_threshold(mut self, threshold: usize) -> Self {
        self.config.pending_warn_threshold = threshold;
        self
    }

    pub fn build(self) -> ReplicaConfig {
        self.config
    }
}

impl Default for ReplicaConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
