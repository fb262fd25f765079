//! # paxochain-e2e
//!
//! Black-box, multi-replica integration tests. Each scenario drives a real
//! cluster of [`paxochain_core::ReplicaDriver`]s and
//! [`paxochain_core::ClientEngine`]s wired together over loopback TCP via
//! [`paxochain_network::Messenger`], with a short send delay and wait time
//! so a scenario completes in milliseconds.

mod harness;

pub use harness::ClusterHarness;

/// Result type for harness setup/teardown failures.
pub type E2EResult<T> = Result<T, E2EError>;

/// Errors raised assembling or driving a [`ClusterHarness`].
#[derive(Debug, thiserror::Error)]
pub enum E2EError {
    /// The cluster's roster could not be constructed (e.g. an even server
    /// count).
    #[error("roster error: {0}")]
    Roster(#[from] paxochain_primitives::RosterError),

    /// A replica's backing log failed to open.
    #[error("storage error: {0}")]
    Storage(#[from] paxochain_storage::StorageError),

    /// A messenger failed to bind or connect.
    #[error("network error: {0}")]
    Network(#[from] paxochain_network::NetworkError),

    /// A scenario's expected condition (response, convergence) never
    /// happened within its timeout budget.
    #[error("timed out waiting for: {0}")]
    TimedOut(String),
}

#[cfg(test)]
mod scenarios;
