//! Meshnode RPC Server - JSON-RPC management endpoint for a mesh node.
//!
//! This binary boots a node from its configuration file, auto-starts the
//! configured applications and serves the management gateway over JSON-RPC 2.0.

mod handlers;
mod server;

use anyhow::{Context, Result};
use clap::Parser;
use meshnode_core::{
    ChildExecutorFactory, ExecutorFactory, Gateway, Identity, MemoryExecutorFactory, Node,
    NodeConfig, NodeDefaults,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "meshnode-rpc")]
#[command(about = "JSON-RPC management server for a mesh node")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value_t = NodeDefaults::RPC_PORT)]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = NodeDefaults::RPC_HOST)]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Node configuration file (created with defaults if missing)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run applications as in-process tasks instead of child processes
    #[arg(long)]
    dry_run: bool,

    /// Maximum number of RPC requests served at once
    #[arg(long, default_value_t = 64)]
    max_concurrent: usize,
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("meshnode")
        .join(NodeDefaults::CONFIG_FILE_NAME)
}

/// Load the node configuration, writing a fresh one on first boot.
fn load_config(path: &Path) -> Result<NodeConfig> {
    if path.exists() {
        return NodeConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()));
    }

    let config = NodeConfig {
        local_identity: Identity::generate(),
        ..Default::default()
    };
    config
        .save(path)
        .with_context(|| format!("failed to write config {}", path.display()))?;
    info!("Wrote default config to {}", path.display());
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting Meshnode RPC Server {}", NodeDefaults::NODE_VERSION);

    let config_path = args.config.unwrap_or_else(default_config_path);
    info!("Config: {}", config_path.display());
    let config = load_config(&config_path)?;

    let executors: Arc<dyn ExecutorFactory> = if args.dry_run {
        info!("Dry run: applications run in-process");
        Arc::new(MemoryExecutorFactory::new())
    } else {
        Arc::new(ChildExecutorFactory::default())
    };

    let node = Arc::new(Node::standalone(config, executors)?.with_config_path(&config_path));
    info!("Node identity: {}", node.identity());

    let started = node.start_auto_apps().await;
    info!("Auto-started {} applications", started);

    let gateway = Gateway::new(node.clone());
    let addr = server::start_server(gateway, &args.host, args.port, args.max_concurrent).await?;

    // Machine-readable line for supervisors
    println!("RPC_PORT={}", addr.port());

    info!("RPC server running on {}", addr);

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping processes");
    node.shutdown().await;

    Ok(())
}
