//! The replica runtime: ingress for local posts and peer shares.
//!
//! A [`ReplicaNode`] owns one [`FeedReplica`] behind a mutex. Each ingress
//! call takes the lock once, runs the whole receive-and-drain step, and
//! releases it before any network I/O. Fan-out happens afterwards on
//! detached tasks, so the acknowledgment never waits for peers.

use crate::broadcast::{BroadcastSender, SendHandle};
use crate::config::ReplicaConfig;
use crate::error::{NetworkError, Result};
use crate::network::{Inbound, NetworkTransport};
use cfeed_core::{Event, EventId, FeedView, ReplicaId};
use cfeed_delivery::{new_replica, Consistency, DeliveryReport, FeedReplica, Outcome};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Level};

/// Acknowledgment returned to the caller of `post` or `share`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub status: String,
    pub replica: ReplicaId,
}

impl Ack {
    pub fn ok(replica: ReplicaId) -> Self {
        Self {
            status: "ok".to_string(),
            replica,
        }
    }
}

/// Events emitted by a replica node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedEvent {
    /// An event entered the feed store.
    Delivered { evt_id: EventId, origin: ReplicaId },
    /// A remote event is waiting in the causal buffer.
    Held { evt_id: EventId, reason: String },
    /// A remote event was already known and was dropped.
    Duplicate { evt_id: EventId },
}

/// A local post after it has been applied and handed to the fan-out.
pub struct Published {
    pub ack: Ack,
    /// The stamped event as broadcast to peers.
    pub event: Event,
    sends: Vec<SendHandle>,
}

impl Published {
    /// Wait for every peer send to finish. Ingress never does this; tests and
    /// tools that need a quiet network do.
    pub async fn flush(self) -> Vec<std::result::Result<(), NetworkError>> {
        futures::future::join_all(self.sends)
            .await
            .into_iter()
            .map(|joined| joined.unwrap_or_else(|e| Err(NetworkError::SendFailed(e.to_string()))))
            .collect()
    }
}

pub struct ReplicaNode<T: NetworkTransport> {
    id: ReplicaId,
    replica: Arc<Mutex<Box<dyn FeedReplica>>>,
    broadcaster: BroadcastSender<T>,
    config: ReplicaConfig,
    event_tx: broadcast::Sender<FeedEvent>,
}

impl<T: NetworkTransport> ReplicaNode<T> {
    pub fn new(transport: Arc<T>, config: ReplicaConfig) -> Self {
        let id = transport.local_id();
        let replica = new_replica(config.consistency, id, transport.replica_count());
        let (event_tx, _) = broadcast::channel(256);

        Self {
            id,
            replica: Arc::new(Mutex::new(replica)),
            broadcaster: BroadcastSender::new(transport, &config),
            config,
            event_tx,
        }
    }

    pub fn id(&self) -> ReplicaId {
        self.id
    }

    pub fn consistency(&self) -> Consistency {
        self.config.consistency
    }

    pub fn config(&self) -> &ReplicaConfig {
        &self.config
    }

    /// Subscribe to feed events.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.event_tx.subscribe()
    }

    /// Author an event here and broadcast it.
    ///
    /// The event's origin is forced to this replica. Returns once the event
    /// is delivered locally; peers receive it in the background.
    pub async fn post(&self, event: Event) -> Result<Published> {
        let (stamped, delivered) = {
            let mut replica = self.replica.lock();
            let stamped = replica.local_post(event)?;
            self.log_feed(replica.as_ref());
            let delivered = origins(replica.as_ref(), &stamped.report);
            (stamped, delivered)
        };

        debug!(
            replica = self.id,
            evt_id = %stamped.event.evt_id,
            "local event delivered"
        );
        self.publish(&stamped.report, delivered);

        let sends = self.broadcaster.fan_out(&stamped.event);
        Ok(Published {
            ack: Ack::ok(self.id),
            event: stamped.event,
            sends,
        })
    }

    /// Accept an event from a peer.
    pub async fn share(&self, event: Event) -> Result<Ack> {
        let (report, delivered) = {
            let mut replica = self.replica.lock();
            let report = replica.receive(event)?;
            if !report.delivered.is_empty() {
                self.log_feed(replica.as_ref());
            }
            let delivered = origins(replica.as_ref(), &report);
            (report, delivered)
        };

        match &report.outcome {
            Outcome::Delivered => debug!(
                replica = self.id,
                evt_id = %report.evt_id,
                delivered = report.delivered.len(),
                "remote event delivered"
            ),
            Outcome::Held(reason) => debug!(
                replica = self.id,
                evt_id = %report.evt_id,
                reason = ?reason,
                "remote event buffered"
            ),
            Outcome::Duplicate => debug!(
                replica = self.id,
                evt_id = %report.evt_id,
                "duplicate event dropped"
            ),
        }

        let threshold = self.config.pending_warn_threshold;
        if threshold > 0 && report.pending >= threshold {
            warn!(
                replica = self.id,
                pending = report.pending,
                threshold,
                "causal buffer is growing; a predecessor may be lost"
            );
        }

        self.publish(&report, delivered);
        Ok(Ack::ok(self.id))
    }

    /// Feed remote events from `inbox` into [`share`](Self::share) until the
    /// channel closes.
    pub fn spawn_receiver(self: &Arc<Self>, mut inbox: mpsc::Receiver<Inbound>) -> JoinHandle<()> {
        let node = Arc::clone(self);
        tokio::spawn(async move {
            info!(replica = node.id, "receiver started");
            while let Some((from, event)) = inbox.recv().await {
                let evt_id = event.evt_id.clone();
                if let Err(e) = node.share(event).await {
                    warn!(replica = node.id, from, evt_id = %evt_id, error = %e, "share rejected");
                }
            }
            info!(replica = node.id, "receiver stopped");
        })
    }

    pub fn view(&self) -> FeedView {
        self.replica.lock().view()
    }

    /// The feed rendered as text.
    pub fn render(&self) -> String {
        self.view().to_string()
    }

    pub fn pending_count(&self) -> usize {
        self.replica.lock().pending_count()
    }

    pub fn delivered_count(&self) -> usize {
        self.replica.lock().store().len()
    }

    /// Run `f` against the replica under the lock.
    pub fn with_replica<R>(&self, f: impl FnOnce(&dyn FeedReplica) -> R) -> R {
        f(self.replica.lock().as_ref())
    }

    fn publish(&self, report: &DeliveryReport, delivered: Vec<(EventId, ReplicaId)>) {
        match &report.outcome {
            Outcome::Held(reason) => {
                let _ = self.event_tx.send(FeedEvent::Held {
                    evt_id: report.evt_id.clone(),
                    reason: format!("{:?}", reason),
                });
            }
            Outcome::Duplicate => {
                let _ = self.event_tx.send(FeedEvent::Duplicate {
                    evt_id: report.evt_id.clone(),
                });
            }
            Outcome::Delivered => {}
        }

        for (evt_id, origin) in delivered {
            let _ = self.event_tx.send(FeedEvent::Delivered { evt_id, origin });
        }
    }

    fn log_feed(&self, replica: &dyn FeedReplica) {
        if tracing::enabled!(Level::DEBUG) {
            debug!(replica = self.id, "\n{}", replica.view());
        }
    }
}

/// Pair every event delivered by `report` with its origin replica.
fn origins(replica: &dyn FeedReplica, report: &DeliveryReport) -> Vec<(EventId, ReplicaId)> {
    report
        .delivered
        .iter()
        .filter_map(|id| replica.store().get(id).map(|e| (id.clone(), e.process_id)))
        .collect()
}
