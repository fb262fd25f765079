//! Consensus error types.

use thiserror::Error;

/// Consensus operation error.
#[derive(Debug, Error)]
pub enum ConsensusError {
    /// The underlying log failed to append or update.
    #[error("storage error: {0}")]
    Storage(#[from] paxochain_storage::StorageError),
}

/// Result type for consensus operations.
pub type ConsensusResult<T> = Result<T, ConsensusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_display_is_wrapped() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: ConsensusError = paxochain_storage::StorageError::Io(io).into();
        assert!(format!("{err}").contains("disk full"));
    }
}
