//! Storage error types.

use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O failure reading or writing the backing log file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A log record failed to encode or decode.
    #[error("codec error: {0}")]
    Codec(#[from] paxochain_types::CodecError),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
