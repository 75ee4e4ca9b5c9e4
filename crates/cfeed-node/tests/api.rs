use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use cfeed_core::{Event, FeedView};
use cfeed_node::build_router;
use cfeed_sdk::{Ack, Consistency, MemoryTransport, ReplicaConfig, ReplicaNode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt; // for oneshot

/// Replica 1 of three, with no live peers behind its transport.
fn app(consistency: Consistency) -> Router {
    let config = ReplicaConfig::builder().consistency(consistency).build();
    let node = Arc::new(ReplicaNode::new(Arc::new(MemoryTransport::new(1, 3)), config));
    build_router(node)
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_post_acks_and_stamps() {
    let app = app(Consistency::Causal);

    let response = app
        .clone()
        .oneshot(json_request(
            "/post",
            json!({"processId": 0, "evtId": "a", "author": "alice", "text": "hello"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ack: Value = body_json(response).await;
    assert_eq!(ack, json!({"status": "ok", "replica": 1}));

    let response = app.oneshot(get("/feed")).await.unwrap();
    let view: FeedView = body_json(response).await;
    assert_eq!(view.post_ids(), vec!["a"]);
    assert_eq!(view.threads[0].post.process_id, 1);
    assert_eq!(view.clock.unwrap().as_slice(), &[0, 1, 0]);
}

#[tokio::test]
async fn test_post_generates_missing_id() {
    let app = app(Consistency::Causal);

    let response = app
        .clone()
        .oneshot(json_request("/post", json!({"author": "alice", "text": "hi"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let view: FeedView = body_json(app.oneshot(get("/feed")).await.unwrap()).await;
    assert_eq!(view.threads.len(), 1);
    assert!(!view.threads[0].post.evt_id.is_empty());
}

#[tokio::test]
async fn test_reply_to_unknown_post_is_bad_request() {
    let app = app(Consistency::Causal);

    let response = app
        .oneshot(json_request(
            "/post",
            json!({"evtId": "r", "parentEvtId": "nope", "author": "bob", "text": "re"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn test_reused_id_conflicts() {
    let app = app(Consistency::Causal);
    let body = json!({"evtId": "a", "author": "alice", "text": "hello"});

    let first = app.clone().oneshot(json_request("/post", body.clone())).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let second = app.oneshot(json_request("/post", body)).await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_share_holds_until_dependency_arrives() {
    let app = app(Consistency::Causal);
    let post = Event::post("A", "alice", "root")
        .with_origin(0)
        .with_vector(vec![1, 0, 0]);
    let reply = Event::reply("B", "A", "alice", "re")
        .with_origin(0)
        .with_vector(vec![2, 0, 0]);

    let response = app
        .clone()
        .oneshot(json_request("/share", serde_json::to_value(&reply).unwrap()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ack: Ack = body_json(response).await;
    assert_eq!(ack, Ack::ok(1));

    let view: FeedView = body_json(app.clone().oneshot(get("/feed")).await.unwrap()).await;
    assert!(view.threads.is_empty());
    assert_eq!(view.pending, vec!["B".to_string()]);

    let text = app.clone().oneshot(get("/feed/text")).await.unwrap();
    let bytes = axum::body::to_bytes(text.into_body(), 1 << 20).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("Event B waiting for dependencies"));

    app.clone()
        .oneshot(json_request("/share", serde_json::to_value(&post).unwrap()))
        .await
        .unwrap();
    let view: FeedView = body_json(app.oneshot(get("/feed")).await.unwrap()).await;
    assert_eq!(view.reply_ids("A"), vec!["B"]);
    assert!(view.pending.is_empty());
}

#[tokio::test]
async fn test_malformed_share_is_rejected() {
    let app = app(Consistency::Causal);

    // Wrong vector width.
    let bad = Event::post("x", "mallory", "hi")
        .with_origin(0)
        .with_vector(vec![1, 0]);
    let response = app
        .clone()
        .oneshot(json_request("/share", serde_json::to_value(&bad).unwrap()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Missing required fields never reach the replica.
    let response = app
        .clone()
        .oneshot(json_request("/share", json!({"evtId": "y"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let view: FeedView = body_json(app.oneshot(get("/feed")).await.unwrap()).await;
    assert!(view.threads.is_empty());
    assert!(view.pending.is_empty());
}

#[tokio::test]
async fn test_eventual_feed_shows_orphans() {
    let app = app(Consistency::Eventual);
    let reply = Event::reply("B", "A", "alice", "re")
        .with_origin(0)
        .with_timestamp(2);

    app.clone()
        .oneshot(json_request("/share", serde_json::to_value(&reply).unwrap()))
        .await
        .unwrap();

    let view: FeedView = body_json(app.oneshot(get("/feed")).await.unwrap()).await;
    assert!(view.clock.is_none());
    assert_eq!(view.timestamp, Some(0));
    assert_eq!(view.orphans.len(), 1);
}
