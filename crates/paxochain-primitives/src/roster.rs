//! Cluster roster: replica/client counts, ports, and quorum math.
//!
//! Captured in a `Roster` value rather than module-level globals, so a
//! process's view of the cluster shape can be overridden for tests.

use thiserror::Error;

/// Default server count.
pub const DEFAULT_N_SERVERS: u32 = 5;
/// Default client count.
pub const DEFAULT_N_CLIENTS: u32 = 3;
/// Default base TCP port for server replicas; replica `i` binds `base + i`.
pub const DEFAULT_SERVER_BASE_PORT: u16 = 3201;
/// Default base TCP port for clients; client `i` binds `base + i`.
pub const DEFAULT_CLIENT_BASE_PORT: u16 = 2201;

/// Error constructing a [`Roster`].
#[derive(Debug, Error)]
pub enum RosterError {
    /// The quorum formula `ceil(n/2) - 1` is only specified for an odd
    /// server count; an even count would make "majority" ambiguous.
    #[error("server count must be odd, got {0}")]
    EvenServerCount(u32),
    /// A roster needs at least one server to make progress.
    #[error("server count must be at least 1")]
    ZeroServers,
}

/// Static shape of the cluster: how many servers and clients exist, and
/// which ports they listen on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Roster {
    n_servers: u32,
    n_clients: u32,
    server_base_port: u16,
    client_base_port: u16,
}

impl Roster {
    /// Build a roster, validating the server count is odd (required for the
    /// majority-quorum formula to pick out a unique threshold).
    pub fn new(
        n_servers: u32,
        n_clients: u32,
        server_base_port: u16,
        client_base_port: u16,
    ) -> Result<Self, RosterError> {
        if n_servers == 0 {
            return Err(RosterError::ZeroServers);
        }
        if n_servers % 2 == 0 {
            return Err(RosterError::EvenServerCount(n_servers));
        }
        Ok(Roster {
            n_servers,
            n_clients,
            server_base_port,
            client_base_port,
        })
    }

    /// Number of server replicas.
    pub fn n_servers(&self) -> u32 {
        self.n_servers
    }

    /// Number of clients.
    pub fn n_clients(&self) -> u32 {
        self.n_clients
    }

    /// TCP port a server replica listens on.
    pub fn server_port(&self, pid: u32) -> u16 {
        self.server_base_port + pid as u16
    }

    /// TCP port a client listens on.
    pub fn client_port(&self, pid: u32) -> u16 {
        self.client_base_port + pid as u16
    }

    /// Number of *peer* responses (beyond the replica's own vote) needed to
    /// reach majority: `ceil(n/2) - 1`.
    pub fn quorum_peer_threshold(&self) -> u32 {
        self.n_servers.div_ceil(2) - 1
    }
}

impl Default for Roster {
    fn default() -> Self {
        Roster::new(
            DEFAULT_N_SERVERS,
            DEFAULT_N_CLIENTS,
            DEFAULT_SERVER_BASE_PORT,
            DEFAULT_CLIENT_BASE_PORT,
        )
        .expect("default roster parameters are valid")
    }
}
