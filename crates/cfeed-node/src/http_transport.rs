//! Peer sends over HTTP: `POST http://{peer}/share`.

use async_trait::async_trait;
use cfeed_core::{Event, ReplicaId};
use cfeed_sdk::{NetworkError, NetworkTransport};
use reqwest::Client;

#[derive(Debug, Clone)]
pub struct HttpTransport {
    local_id: ReplicaId,
    peers: Vec<String>,
    client: Client,
}

impl HttpTransport {
    pub fn new(local_id: ReplicaId, peers: Vec<String>) -> Self {
        Self {
            local_id,
            peers,
            client: Client::new(),
        }
    }

    pub fn share_url(&self, peer: ReplicaId) -> Option<String> {
        self.peers
            .get(peer)
            .map(|addr| format!("http://{}/share", addr.trim_end_matches('/')))
    }
}

#[async_trait]
impl NetworkTransport for HttpTransport {
    fn local_id(&self) -> ReplicaId {
        self.local_id
    }

    fn replica_count(&self) -> usize {
        self.peers.len()
    }

    async fn send(&self, peer: ReplicaId, event: Event) -> Result<(), NetworkError> {
        let url = self.share_url(peer).ok_or(NetworkError::PeerNotFound(peer))?;
        let resp = self
            .client
            .post(&url)
            .json(&event)
            .send()
            .await
            .map_err(|e| NetworkError::SendFailed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(NetworkError::SendFailed(format!(
                "share to {} failed: {}",
                url,
                resp.status()
            )));
        }
        Ok(())
    }
}
