//! Configuration assembly for paxochain-node: turns parsed CLI flags into
//! the [`Roster`] and per-role settings the rest of the process needs.

use std::time::Duration;

use paxochain_primitives::{Roster, RosterError};

use crate::cli::{Cli, Role};

/// Fully resolved configuration for one process, server or client.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Server or client.
    pub role: Role,
    /// This process's index into its roster.
    pub pid: u32,
    /// Host every roster peer is reachable at.
    pub host: String,
    /// The fixed server/client roster shared by the whole cluster.
    pub roster: Roster,
    /// Client-only: how long to wait for a response before re-hinting.
    pub wait_time: Duration,
    /// Artificial per-send network delay.
    pub send_delay: Duration,
    /// Log level string, passed straight to the tracing filter.
    pub log_level: String,
}

impl NodeConfig {
    /// Build a `NodeConfig` from parsed CLI flags, validating the roster
    /// shape (`n_servers` must be odd and nonzero).
    pub fn from_cli(cli: &Cli) -> Result<Self, RosterError> {
        let roster = Roster::new(cli.n_servers, cli.n_clients, cli.server_base_port, cli.client_base_port)?;
        Ok(NodeConfig {
            role: cli.role,
            pid: cli.pid,
            host: cli.host.clone(),
            roster,
            wait_time: Duration::from_secs(cli.wait_time_secs),
            send_delay: Duration::from_millis(cli.send_delay_ms),
            log_level: cli.log_level.clone(),
        })
    }

    /// Backup file path for this process's blockchain log.
    pub fn backup_path(&self) -> std::path::PathBuf {
        std::path::PathBuf::from(format!("blockchain_backup_{}.txt", self.pid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(role: Role, pid: u32) -> Cli {
        Cli {
            role,
            pid,
            host: "127.0.0.1".into(),
            n_servers: 5,
            n_clients: 3,
            server_base_port: 3201,
            client_base_port: 2201,
            wait_time_secs: 30,
            send_delay_ms: 2000,
            log_level: "info".into(),
        }
    }

    #[test]
    fn builds_config_from_defaults() {
        let config = NodeConfig::from_cli(&cli(Role::Server, 0)).unwrap();
        assert_eq!(config.roster.n_servers(), 5);
        assert_eq!(config.wait_time, Duration::from_secs(30));
        assert_eq!(config.backup_path().to_str().unwrap(), "blockchain_backup_0.txt");
    }

    #[test]
    fn rejects_even_server_count() {
        let mut c = cli(Role::Server, 0);
        c.n_servers = 4;
        assert!(NodeConfig::from_cli(&c).is_err());
    }
}
