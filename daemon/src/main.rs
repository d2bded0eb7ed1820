//! Quorum daemon: entry point for running a gossip node.

use anyhow::Context;
use clap::Parser;
use quorum_node::{init_logging, GossipNode, NodeConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quorum-daemon", about = "Committee gossip node daemon")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "QUORUM_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind the peer listener to.
    #[arg(long, env = "QUORUM_LISTEN")]
    listen: Option<String>,

    /// Address committee members know this node by.
    #[arg(long, env = "QUORUM_SELF_ADDRESS")]
    self_address: Option<String>,

    /// Committee member addresses (comma-separated: "10.0.0.2:7100,10.0.0.3:7100").
    #[arg(long, env = "QUORUM_COMMITTEE", value_delimiter = ',')]
    committee: Vec<String>,

    /// Enable Prometheus metrics sampling.
    #[arg(long, env = "QUORUM_ENABLE_METRICS")]
    metrics: bool,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "QUORUM_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "QUORUM_LOG_FORMAT")]
    log_format: Option<String>,

    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Node operations.
    #[command(name = "node")]
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },
    /// Configuration helpers.
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand)]
enum NodeAction {
    /// Run the node until SIGINT/SIGTERM.
    Run,
}

#[derive(clap::Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Default,
}

impl Cli {
    /// File (or default) configuration with CLI overrides applied.
    fn node_config(&self) -> anyhow::Result<NodeConfig> {
        let base = match &self.config {
            Some(path) => NodeConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => NodeConfig::default(),
        };

        let config = NodeConfig {
            listen_address: self.listen.clone().unwrap_or(base.listen_address),
            self_address: self.self_address.clone().unwrap_or(base.self_address),
            committee: if self.committee.is_empty() {
                base.committee
            } else {
                self.committee.clone()
            },
            enable_metrics: self.metrics || base.enable_metrics,
            log_level: self.log_level.clone().unwrap_or(base.log_level),
            log_format: self.log_format.clone().unwrap_or(base.log_format),
            ..base
        };
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.node_config()?;

    match cli.command {
        Command::Config {
            action: ConfigAction::Default,
        } => {
            print!("{}", config.to_toml_string()?);
        }
        Command::Node {
            action: NodeAction::Run,
        } => {
            init_logging(config.log_format()?, &config.log_level)?;
            tracing::info!(
                listen = %config.listen_address,
                self_address = %config.self_address,
                committee = config.committee.len(),
                metrics = config.enable_metrics,
                "starting quorum node"
            );

            let mut node = GossipNode::new(config)?;
            node.run_until_signal().await?;

            tracing::info!("quorum daemon exited cleanly");
        }
    }

    Ok(())
}
