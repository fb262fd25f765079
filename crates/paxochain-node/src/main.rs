//! PaxoChain node binary
//!
//! Entry point for running either a server replica or a client against a
//! fixed Paxos roster.

mod cli;
mod config;
mod node;

use anyhow::Result;
use cli::{Cli, Role};
use config::NodeConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!(role = ?cli.role, pid = cli.pid, "paxochain node starting");

    let config = NodeConfig::from_cli(&cli)?;

    match config.role {
        Role::Server => node::run_server(config).await?,
        Role::Client => node::run_client(config).await?,
    }

    Ok(())
}
