//! Multi-Paxos ballot numbers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A ballot, totally ordered lexicographically by `(depth, num, pid)`.
///
/// `depth` ties a ballot to the log slot it is trying to decide, so ballots
/// from different depths never need to compare beyond that field; `num` is
/// the proposer's monotonically increasing counter within a depth; `pid`
/// breaks ties between proposers that bumped `num` to the same value
/// concurrently, favoring the higher pid.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Ballot {
    /// Log depth this ballot is proposing for.
    pub depth: u64,
    /// Proposer-local monotonic counter.
    pub num: u64,
    /// Proposer's pid, used as a tiebreaker.
    pub pid: u32,
}

impl Ballot {
    /// The zero ballot `(0, 0, 0)` every replica starts with.
    pub const ZERO: Ballot = Ballot {
        depth: 0,
        num: 0,
        pid: 0,
    };

    /// Build a ballot.
    pub fn new(depth: u64, num: u64, pid: u32) -> Self {
        Ballot { depth, num, pid }
    }

    /// The next ballot a proposer at `pid` should use to supersede `self`
    /// at the given depth.
    pub fn bumped(&self, depth: u64, pid: u32) -> Self {
        Ballot {
            depth,
            num: self.num + 1,
            pid,
        }
    }
}

impl Default for Ballot {
    fn default() -> Self {
        Ballot::ZERO
    }
}

impl fmt::Display for Ballot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.depth, self.num, self.pid)
    }
}
