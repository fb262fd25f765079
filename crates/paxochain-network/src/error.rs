//! Network error types.

use thiserror::Error;

/// Errors raised by the [`crate::Messenger`].
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Underlying socket I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame failed to encode or decode.
    #[error("codec error: {0}")]
    Codec(#[from] paxochain_types::CodecError),

    /// The peer has no live outbound slot and dialing it failed.
    #[error("peer unreachable: {0}")]
    Unreachable(String),

    /// The outbound channel to a peer's writer task has been closed.
    #[error("outbound channel closed")]
    ChannelClosed,
}

/// Result type for network operations.
pub type NetworkResult<T> = Result<T, NetworkError>;
