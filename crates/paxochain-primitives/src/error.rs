//! Common error types for primitives.

use thiserror::Error;

use crate::hash::HashError;
use crate::roster::RosterError;

/// Primitive operation error.
#[derive(Debug, Error)]
pub enum PrimitiveError {
    /// Digest parsing error.
    #[error("hash error: {0}")]
    Hash(#[from] HashError),

    /// Roster construction error.
    #[error("roster error: {0}")]
    Roster(#[from] RosterError),
}
