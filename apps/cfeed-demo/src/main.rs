//! # Causal Feed Demo
//!
//! A standalone CLI that runs small replica sets in-process over the memory
//! transport and prints every replica's feed, so the difference between
//! causal and eventual delivery is visible on the console.
//!
//! Reordering is produced by cutting the link from replica 0 to replica 2
//! while a post goes out, then handing the post to replica 2 late:
//!
//! ```text
//! r0 ──A──▶ r1        r0 ──B──▶ r1, r2        r0 ··A··▶ r2 (late)
//!    ╳──A──  r2
//! ```

use std::sync::Arc;
use std::time::Duration;

use cfeed_sdk::prelude::*;
use cfeed_sdk::{create_network, quick};
use clap::{Parser, Subcommand};
use colored::*;

type Node = Arc<ReplicaNode<MemoryTransport>>;

// ─── CLI ───────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "cfeed-demo")]
#[command(about = "Causal vs eventual replicated feed, side by side")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print feeds as JSON instead of text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// A reply overtakes its post; the causal replica holds it back
    Causal,
    /// Same schedule on eventual replicas; the reply shows up as an orphan
    Eventual,
    /// Three replicas post concurrently and converge
    Concurrent,
}

// ─── Cluster ───────────────────────────────────────────────────────────────

struct Cluster {
    nodes: Vec<Node>,
    transports: Vec<Arc<MemoryTransport>>,
}

impl Cluster {
    fn new(count: usize, consistency: Consistency) -> Self {
        let config = ReplicaConfig::builder().consistency(consistency).build();
        let transports: Vec<Arc<MemoryTransport>> =
            create_network(count).into_iter().map(Arc::new).collect();
        let nodes = transports
            .iter()
            .map(|transport| {
                let node = Arc::new(ReplicaNode::new(Arc::clone(transport), config.clone()));
                if let Some(inbox) = transport.subscribe() {
                    node.spawn_receiver(inbox);
                }
                node
            })
            .collect();
        Self { nodes, transports }
    }

    async fn post(&self, replica: usize, event: Event) -> Option<Event> {
        match self.nodes[replica].post(event).await {
            Ok(published) => {
                let event = published.event.clone();
                published.flush().await;
                Some(event)
            }
            Err(e) => {
                println!("  {} {}", "✗".bright_red(), e);
                None
            }
        }
    }

    async fn settle(&self, expected: usize) -> bool {
        quick::settle(&self.nodes, expected, Duration::from_secs(2)).await
    }
}

// ─── Pretty printing ──────────────────────────────────────────────────────

fn header(text: &str) {
    let bar = "═".repeat(60);
    println!("\n{}", bar.bright_cyan());
    println!("  {}", text.bold().bright_white());
    println!("{}", bar.bright_cyan());
}

fn section(text: &str) {
    println!("\n{} {}", "▸".bright_yellow(), text.bold());
}

fn step(text: &str) {
    println!("  {} {}", "•".bright_green(), text);
}

fn stamp(event: &Event) -> String {
    event
        .vector
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn show_feed(node: &Node, json: bool) {
    if json {
        match serde_json::to_string_pretty(&node.view()) {
            Ok(text) => println!("{}", text),
            Err(e) => println!("  {} {}", "✗".bright_red(), e),
        }
        return;
    }
    for line in node.render().lines() {
        println!("  {}", line);
    }
}

fn convergence_result(converged: bool) {
    if converged {
        println!(
            "\n  {} {}",
            "✓".bright_green().bold(),
            "ALL REPLICAS CONVERGED".bright_green().bold()
        );
    } else {
        println!(
            "\n  {} {}",
            "✗".bright_red().bold(),
            "REPLICAS DID NOT SETTLE".bright_red().bold()
        );
    }
}

// ─── Scenarios ─────────────────────────────────────────────────────────────

/// Post A from replica 0 with replica 2 cut off, then reply B with the link
/// restored. Returns A so the caller can deliver it late.
async fn reorder_post_and_reply(cluster: &Cluster) -> Option<Event> {
    cluster.transports[0].partition(2);
    step("link r0 → r2 cut");
    let a = cluster.post(0, Event::post("A", "alice", "Is anyone there?")).await?;
    step(&format!("r0 posts A  vector={}", stamp(&a)));
    cluster.transports[0].heal(2);
    step("link r0 → r2 restored");

    let b = cluster
        .post(0, Event::reply("B", "A", "alice", "Hello? Anyone?"))
        .await?;
    step(&format!("r0 replies B  vector={}", stamp(&b)));
    tokio::time::sleep(Duration::from_millis(50)).await;
    Some(a)
}

async fn run_reordered(consistency: Consistency, json: bool) {
    let title = match consistency {
        Consistency::Causal => "CAUSAL — reply held until its post arrives",
        Consistency::Eventual => "EVENTUAL — reply shown as an orphan",
    };
    header(title);
    let cluster = Cluster::new(3, consistency);

    section("Phase 1: B reaches r2 before A");
    let Some(a) = reorder_post_and_reply(&cluster).await else {
        return;
    };
    show_feed(&cluster.nodes[2], json);

    section("Phase 2: A finally reaches r2");
    if let Err(e) = cluster.nodes[2].share(a).await {
        println!("  {} {}", "✗".bright_red(), e);
    }
    let ok = cluster.settle(2).await;
    show_feed(&cluster.nodes[2], json);
    convergence_result(ok);
}

async fn run_concurrent(json: bool) {
    header("CONCURRENT — independent posts on three replicas");
    let cluster = Cluster::new(3, Consistency::Causal);

    section("Phase 1: every replica posts once");
    for (i, author) in ["alice", "bob", "carol"].iter().enumerate() {
        let id = format!("root-{}", i);
        if cluster.post(i, Event::post(id.clone(), *author, "hello")).await.is_some() {
            step(&format!("r{} posts {}", i, id));
        }
    }

    section("Phase 2: feeds after fan-out");
    let ok = cluster.settle(3).await;
    for node in &cluster.nodes {
        show_feed(node, json);
    }
    convergence_result(ok);
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    match cli.command {
        Commands::Causal => run_reordered(Consistency::Causal, cli.json).await,
        Commands::Eventual => run_reordered(Consistency::Eventual, cli.json).await,
        Commands::Concurrent => run_concurrent(cli.json).await,
    }
}
