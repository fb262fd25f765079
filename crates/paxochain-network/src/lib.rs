//! # paxochain-network
//!
//! The Messenger: per-peer TCP links to the fixed server/client roster,
//! length-prefixed envelope framing, and failed-link simulation for
//! partition testing.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod peer;
pub mod service;

pub use error::{NetworkError, NetworkResult};
pub use peer::{read_envelope, write_envelope};
pub use service::{Messenger, DEFAULT_SEND_DELAY};
