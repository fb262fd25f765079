//! # paxochain-consensus
//!
//! The per-replica Multi-Paxos state machine: acceptor and proposer/leader
//! roles, sticky leadership, the client request queue, and recovery
//! catch-up, driven by feeding it inbound messages and draining its
//! outbound queue.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod outbound;
mod replica;

pub use error::{ConsensusError, ConsensusResult};
pub use outbound::{Outbound, Recipient};
pub use replica::Replica;
