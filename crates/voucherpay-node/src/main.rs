//! Voucherpay node entry point.
//!
//! Starts the settlement node with configuration from a TOML file or defaults.

mod api;
mod config;
mod node;
mod seed;
mod state;
mod storage;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use config::VoucherpayConfig;
use node::VoucherpayNode;

/// Voucherpay Node
#[derive(Parser, Debug)]
#[command(name = "voucherpay-node", version, about = "Voucherpay settlement node")]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "voucherpay.toml")]
    config: PathBuf,

    /// Override the operator API port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Override the public API port.
    #[arg(long)]
    public_port: Option<u16>,

    /// Override the data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Load accounts, vouchers and plans from a TOML seed file at startup.
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Generate a default config file and exit.
    #[arg(long)]
    init: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = if args.init {
        VoucherpayConfig::default()
    } else {
        VoucherpayConfig::load(&args.config)?
    };
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    if config.json_logs() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    // Handle --init flag
    if args.init {
        config.save(&args.config)?;
        tracing::info!(path = %args.config.display(), "wrote default config");
        return Ok(());
    }

    // Apply CLI overrides
    if let Some(api_port) = args.api_port {
        config.api.port = api_port;
    }
    if let Some(public_port) = args.public_port {
        config.api.public_port = public_port;
    }
    if let Some(ref data_dir) = args.data_dir {
        config.storage.data_dir = data_dir.clone();
    }

    tracing::info!("Voucherpay Node v{}", env!("CARGO_PKG_VERSION"));

    // Create and start the node
    let mut node = VoucherpayNode::new(config)?.with_seed(args.seed);
    node.start().await?;

    // Set up graceful shutdown on SIGINT/SIGTERM
    let shutdown = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
        tracing::info!("received shutdown signal");
    };

    tokio::select! {
        result = node.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "API server exited");
            }
        }
        _ = shutdown => {
            tracing::info!("initiating graceful shutdown");
        }
    }

    node.shutdown().await?;
    tracing::info!("Voucherpay node exited cleanly");
    Ok(())
}
