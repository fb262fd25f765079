//! # paxochain-primitives
//!
//! Primitive types shared across the PaxoChain workspace: digests, the
//! genesis-aware hash pointer, process identifiers, and the cluster roster.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod hash;
mod ids;
mod roster;

pub use error::PrimitiveError;
pub use hash::{HashError, HashPointer, Sha256Digest};
pub use ids::{ClientId, NodeKind, ReplicaId};
pub use roster::{
    Roster, RosterError, DEFAULT_CLIENT_BASE_PORT, DEFAULT_N_CLIENTS, DEFAULT_N_SERVERS,
    DEFAULT_SERVER_BASE_PORT,
};
