//! # paxochain-core
//!
//! Wires the networking-agnostic [`paxochain_consensus::Replica`] and the
//! client request lifecycle to a live [`paxochain_network::Messenger`].
//!
//! ## Architecture
//!
//! ```text
//! +----------------+        +-----------------+
//! |  ReplicaDriver  | <----> |    Messenger    |
//! +----------------+        +-----------------+
//!          |
//! +----------------+
//! |    Replica      |  <- Paxos state machine (paxochain-consensus)
//! +----------------+
//!
//! +----------------+        +-----------------+
//! |  ClientEngine   | <----> |    Messenger    |
//! +----------------+        +-----------------+
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod client_engine;
mod error;
mod replica_driver;

pub use client_engine::{ClientEngine, DEFAULT_WAIT_TIME};
pub use error::{CoreError, CoreResult};
pub use replica_driver::ReplicaDriver;
