//! CLI argument parsing for paxochain-node.

use clap::{Parser, ValueEnum};

/// Whether this process runs a server replica or a client.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Role {
    /// A Paxos server replica.
    #[value(name = "server", alias = "s")]
    Server,
    /// A client issuing GET/PUT requests.
    #[value(name = "client", alias = "c")]
    Client,
}

/// A replicated, fault-tolerant key-value store over Multi-Paxos and a
/// hash-chained, proof-of-work-gated log.
#[derive(Parser, Debug, Clone)]
#[command(name = "paxochain")]
#[command(about = "PaxoChain replica or client")]
#[command(version)]
pub struct Cli {
    /// Whether to run as a server replica or a client.
    pub role: Role,

    /// This process's 0-based index into its roster (server or client,
    /// per `role`).
    pub pid: u32,

    /// Host address every peer in the roster is reachable at: a single
    /// shared host distinguished by port.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Number of server replicas in the roster. Must be odd.
    #[arg(long, default_value_t = paxochain_primitives::DEFAULT_N_SERVERS)]
    pub n_servers: u32,

    /// Number of clients in the roster.
    #[arg(long, default_value_t = paxochain_primitives::DEFAULT_N_CLIENTS)]
    pub n_clients: u32,

    /// Base TCP port for server replicas; replica `i` binds `base + i`.
    #[arg(long, default_value_t = paxochain_primitives::DEFAULT_SERVER_BASE_PORT)]
    pub server_base_port: u16,

    /// Base TCP port for clients; client `i` binds `base + i`.
    #[arg(long, default_value_t = paxochain_primitives::DEFAULT_CLIENT_BASE_PORT)]
    pub client_base_port: u16,

    /// Client-only: seconds to wait for a response before re-hinting a
    /// random server and retrying.
    #[arg(long, default_value_t = 30)]
    pub wait_time_secs: u64,

    /// Artificial per-send network delay, in milliseconds.
    #[arg(long, default_value_t = 2000)]
    pub send_delay_ms: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Parse CLI arguments from `std::env::args`.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
