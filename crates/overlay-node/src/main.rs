use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use overlay_node::{LocalEngineFactory, Node, NodeOptions, ServiceLog};

#[derive(Parser)]
#[command(name = "overlayd", about = "Overlay network node control plane")]
struct Cli {
    /// Working directory for identity, config and state
    #[arg(short, long)]
    base_path: Option<PathBuf>,

    /// Log as JSON lines (also enabled by RUST_LOG_FORMAT=json)
    #[arg(long)]
    log_json: bool,

    /// Seed for port defaults and path hint selection
    #[arg(long)]
    seed: Option<u64>,
}

fn default_base_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("overlayd")
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let service_log = ServiceLog::new();
    if cli.log_json || std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        overlay_node::logging::init_json(&service_log);
    } else {
        overlay_node::logging::init(&service_log);
    }

    let base_path = cli.base_path.unwrap_or_else(default_base_path);
    let mut options = NodeOptions::new(base_path, Arc::new(LocalEngineFactory));
    options.service_log = service_log;
    options.rng_seed = cli.seed;

    let node = match Node::new(options).await {
        Ok(node) => node,
        Err(e) => {
            tracing::error!("failed to start node: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("cannot listen for shutdown signal: {e}");
    }
    tracing::info!("received SIGINT, shutting down");
    node.close().await;
}
