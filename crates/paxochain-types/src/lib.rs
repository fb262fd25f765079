//! # paxochain-types
//!
//! Core wire and on-disk types for PaxoChain: client operations, the
//! hash-chained block, Multi-Paxos ballots, the message taxonomy, and a
//! versioned binary codec for both.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ballot;
pub mod block;
pub mod codec;
pub mod message;
pub mod operation;

pub use ballot::Ballot;
pub use block::Block;
pub use codec::{decode_block, decode_envelope, encode_block, encode_envelope, CodecError};
pub use message::{Envelope, Message, ProcessId};
pub use operation::{OpType, Operation};
