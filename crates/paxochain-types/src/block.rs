//! The hash-chained, proof-of-work-gated block.

use paxochain_crypto::{satisfies_pow, sha256};
use paxochain_primitives::HashPointer;
use serde::{Deserialize, Serialize};

use crate::operation::Operation;

/// One link in a replica's append-only log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    /// The operation this block commits.
    pub operation: Operation,
    /// Pointer to the predecessor block (or the genesis sentinel).
    pub hash_pointer: HashPointer,
    /// The mined proof-of-work nonce.
    pub nonce: String,
    /// `true` while this block is the tentatively-accepted (not yet
    /// decided) tail of the log.
    pub tentative: bool,
}

impl Block {
    /// Mine a new block committing `operation`, chained onto `predecessor`.
    pub fn new(operation: Operation, predecessor: HashPointer) -> Self {
        let nonce = paxochain_crypto::mine_nonce(&operation.render());
        Block {
            operation,
            hash_pointer: predecessor,
            nonce,
            tentative: false,
        }
    }

    /// Canonical text rendering of this block: the input hashed to produce
    /// the next block's hash pointer, and the value persisted to the log
    /// file. Deliberately excludes `tentative`.
    pub fn render(&self) -> String {
        format!("{}|{}|{}", self.operation.render(), self.hash_pointer, self.nonce)
    }

    /// The hash pointer the next block in the chain should carry.
    pub fn next_pointer(&self) -> HashPointer {
        HashPointer::Digest(sha256(self.render().as_bytes()))
    }

    /// Does this block's nonce actually satisfy the proof-of-work predicate
    /// for its operation? Used by an acceptor to validate an incoming
    /// proposal before appending it.
    pub fn has_valid_pow(&self) -> bool {
        satisfies_pow(&self.operation.render(), &self.nonce)
    }
}
