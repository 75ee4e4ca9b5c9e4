//! Best-effort fan-out of locally authored events.
//!
//! Every peer send runs as its own detached task. Nothing is acknowledged
//! and nothing is retried: a send either completes within the configured
//! timeout or it is logged and dropped. Causal order does not depend on
//! these sends arriving, only on what each receiver does with what it gets.

use crate::config::ReplicaConfig;
use crate::error::NetworkError;
use crate::network::NetworkTransport;
use cfeed_core::Event;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Handle of one detached peer send.
pub type SendHandle = JoinHandle<Result<(), NetworkError>>;

pub struct BroadcastSender<T: NetworkTransport> {
    transport: Arc<T>,
    timeout: Duration,
    delay: Duration,
}

impl<T: NetworkTransport> BroadcastSender<T> {
    pub fn new(transport: Arc<T>, config: &ReplicaConfig) -> Self {
        Self {
            transport,
            timeout: config.send_timeout(),
            delay: config.send_delay(),
        }
    }

    /// Spawn one send per peer. Must be called from within a Tokio runtime.
    ///
    /// The handles may be dropped; the sends keep running.
    pub fn fan_out(&self, event: &Event) -> Vec<SendHandle> {
        self.transport
            .peers()
            .into_iter()
            .map(|peer| {
                let transport = Arc::clone(&self.transport);
                let event = event.clone();
                let timeout = self.timeout;
                let delay = self.delay;

                tokio::spawn(async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }

                    let evt_id = event.evt_id.clone();
                    let result = match tokio::time::timeout(timeout, transport.send(peer, event)).await {
                        Ok(result) => result,
                        Err(_) => Err(NetworkError::Timeout {
                            peer,
                            timeout_ms: timeout.as_millis() as u64,
                        }),
                    };

                    match &result {
                        Ok(()) => debug!(peer, evt_id = %evt_id, "event sent"),
                        Err(e) => warn!(peer, evt_id = %evt_id, error = %e, "send to peer dropped"),
                    }
                    result
                })
            })
            .collect()
    }
}
