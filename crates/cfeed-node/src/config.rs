use crate::errors::NodeError;
use cfeed_core::ReplicaId;
use cfeed_delivery::Consistency;
use cfeed_sdk::ReplicaConfig;
use clap::Parser;
use std::net::SocketAddr;

/// Command line of the replica server.
#[derive(Parser, Debug, Clone)]
#[command(name = "cfeed-node")]
#[command(about = "Causal feed replica server")]
#[command(version)]
pub struct NodeArgs {
    /// Index of this replica in the peer list
    pub replica_id: ReplicaId,

    /// Comma separated `host:port` of every replica, in id order
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "127.0.0.1:9000,127.0.0.1:9001,127.0.0.1:9002"
    )]
    pub peers: Vec<String>,

    /// Consistency strategy: causal or eventual
    #[arg(long, default_value_t = Consistency::Causal)]
    pub mode: Consistency,

    /// Per-peer send timeout in milliseconds
    #[arg(long, default_value_t = 3000)]
    pub send_timeout_ms: u64,

    /// Artificial delay before each outgoing send, in milliseconds
    #[arg(long, default_value_t = 0)]
    pub send_delay_ms: u64,

    /// Warn when this many events wait in the causal buffer
    #[arg(long, default_value_t = 64)]
    pub pending_warn: usize,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub replica_id: ReplicaId,
    pub peers: Vec<String>,
    pub bind_addr: SocketAddr,
    pub replica: ReplicaConfig,
}

impl TryFrom<NodeArgs> for NodeConfig {
    type Error = NodeError;

    fn try_from(args: NodeArgs) -> Result<Self, Self::Error> {
        let own = args.peers.get(args.replica_id).ok_or_else(|| {
            NodeError::Config(format!(
                "replica id {} outside peer list of {}",
                args.replica_id,
                args.peers.len()
            ))
        })?;
        let bind_addr = own
            .parse()
            .map_err(|e| NodeError::Config(format!("bad address {}: {}", own, e)))?;

        let replica = ReplicaConfig::builder()
            .consistency(args.mode)
            .send_timeout(args.send_timeout_ms)
            .send_delay(args.send_delay_ms)
            .pending_warn_threshold(args.pending_warn)
            .build();

        Ok(Self {
            replica_id: args.replica_id,
            peers: args.peers,
            bind_addr,
            replica,
        })
    }
}
