//! # paxochain-storage
//!
//! The hash-chained append-only block log (`Blockchain`) and the
//! deterministic key-value projection derived from it (`Dictionary`).

#![warn(missing_docs)]
#![warn(clippy::all)]

mod blockchain;
mod dictionary;
mod error;

pub use blockchain::Blockchain;
pub use dictionary::{Dictionary, NO_KEY};
pub use error::{StorageError, StorageResult};
