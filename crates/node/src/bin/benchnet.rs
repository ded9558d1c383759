use anyhow::Context;
use benchnet_node::NodeConfig;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// VNF benchmark orchestration node.
#[derive(Debug, Parser)]
#[command(name = "benchnet", version, about)]
struct Cli {
    /// Path to the node TOML configuration.
    #[arg(long, short)]
    config: PathBuf,

    /// Log filter, e.g. "info" or "benchnet_node=debug".
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = NodeConfig::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    tokio::select! {
        result = benchnet_node::run(config) => result.context("node stopped with an error"),
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
            Ok(())
        }
    }
}
