use cfeed_node::config::{NodeArgs, NodeConfig};
use cfeed_node::errors::NodeError;
use cfeed_node::http_transport::HttpTransport;
use cfeed_node::{build_router, telemetry};
use cfeed_sdk::ReplicaNode;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), NodeError> {
    telemetry::init_telemetry();

    let cfg = NodeConfig::try_from(NodeArgs::parse())?;
    tracing::info!(
        replica = cfg.replica_id,
        mode = %cfg.replica.consistency,
        peers = ?cfg.peers,
        "starting replica"
    );

    let transport = Arc::new(HttpTransport::new(cfg.replica_id, cfg.peers.clone()));
    let node = Arc::new(ReplicaNode::new(transport, cfg.replica.clone()));
    let app = build_router(node);

    let listener = TcpListener::bind(cfg.bind_addr).await?;
    tracing::info!("Listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
