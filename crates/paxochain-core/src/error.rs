//! Core orchestration error types.

use thiserror::Error;

/// Errors raised wiring the [`crate::ReplicaDriver`] or [`crate::ClientEngine`]
/// to the network layer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The underlying Paxos state machine rejected a dispatch.
    #[error("consensus error: {0}")]
    Consensus(#[from] paxochain_consensus::ConsensusError),

    /// A send to a peer failed.
    #[error("network error: {0}")]
    Network(#[from] paxochain_network::NetworkError),
}

/// Result type for core orchestration operations.
pub type CoreResult<T> = Result<T, CoreError>;
