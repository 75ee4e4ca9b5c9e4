//! HTTP surface of a replica.
//!
//! | route            | body          | reply                               |
//! |------------------|---------------|-------------------------------------|
//! | `POST /post`     | `PostRequest` | `{"status": "ok", "replica": <id>}` |
//! | `POST /share`    | stamped event | `{"status": "ok", "replica": <id>}` |
//! | `GET /feed`      |               | feed snapshot as JSON               |
//! | `GET /feed/text` |               | rendered feed                       |

use crate::errors::NodeError;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use cfeed_core::{new_event_id, Event, EventId, FeedView};
use cfeed_sdk::{Ack, NetworkTransport, ReplicaNode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type SharedNode<T> = Arc<ReplicaNode<T>>;

/// Body of `POST /post`. Any `processId`, `vector` or `timestamp` sent by
/// the client is ignored; the replica stamps the event itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRequest {
    /// Generated when absent.
    #[serde(default)]
    pub evt_id: Option<EventId>,
    #[serde(default)]
    pub parent_evt_id: Option<EventId>,
    pub author: String,
    pub text: String,
}

impl PostRequest {
    fn into_event(self) -> Event {
        let evt_id = self.evt_id.unwrap_or_else(new_event_id);
        match self.parent_evt_id {
            Some(parent) => Event::reply(evt_id, parent, self.author, self.text),
            None => Event::post(evt_id, self.author, self.text),
        }
    }
}

pub fn build_router<T: NetworkTransport>(node: SharedNode<T>) -> Router {
    Router::new()
        .route("/post", post(post_event::<T>))
        .route("/share", post(share_event::<T>))
        .route("/feed", get(get_feed::<T>))
        .route("/feed/text", get(get_feed_text::<T>))
        .with_state(node)
}

async fn post_event<T: NetworkTransport>(
    State(node): State<SharedNode<T>>,
    Json(req): Json<PostRequest>,
) -> Result<Json<Ack>, NodeError> {
    let published = node.post(req.into_event()).await?;
    tracing::info!(
        replica = node.id(),
        evt_id = %published.event.evt_id,
        "post accepted"
    );
    Ok(Json(published.ack))
}

async fn share_event<T: NetworkTransport>(
    State(node): State<SharedNode<T>>,
    Json(event): Json<Event>,
) -> Result<Json<Ack>, NodeError> {
    let ack = node.share(event).await?;
    Ok(Json(ack))
}

async fn get_feed<T: NetworkTransport>(State(node): State<SharedNode<T>>) -> Json<FeedView> {
    Json(node.view())
}

async fn get_feed_text<T: NetworkTransport>(State(node): State<SharedNode<T>>) -> String {
    node.render()
}
