//! The in-memory key-value projection derived from a replica's log.

use std::collections::HashMap;

use paxochain_types::{Block, OpType};

/// Sentinel returned for a GET on a key that was never PUT.
pub const NO_KEY: &str = "NO_KEY";

/// A deterministic left-fold of every PUT operation decided so far.
///
/// `update` is idempotent: re-applying the same depth range twice (or
/// calling it with a depth no higher than what's already been folded) is a
/// no-op rather than double-applying values, which matters because a
/// replica's driver calls it after every `decide`, not just once per block.
#[derive(Default)]
pub struct Dictionary {
    data: HashMap<String, String>,
    latest_depth: u64,
}

impl Dictionary {
    /// An empty dictionary at depth 0.
    pub fn new() -> Self {
        Dictionary {
            data: HashMap::new(),
            latest_depth: 0,
        }
    }

    /// Look up a key, or [`NO_KEY`] if it was never PUT.
    pub fn get(&self, key: &str) -> String {
        self.data
            .get(key)
            .cloned()
            .unwrap_or_else(|| NO_KEY.to_string())
    }

    /// How many blocks this dictionary has folded so far.
    pub fn latest_depth(&self) -> u64 {
        self.latest_depth
    }

    /// Fold every PUT in `blocks[latest_depth..depth)` into the map, then
    /// advance `latest_depth` to `depth`. A `depth` not past the current
    /// `latest_depth` is a no-op.
    pub fn update(&mut self, blocks: &[Block], depth: u64) {
        if depth <= self.latest_depth {
            return;
        }
        let start = self.latest_depth as usize;
        let end = (depth as usize).min(blocks.len());
        for block in &blocks[start..end] {
            if block.operation.op == OpType::Put {
                if let Some(value) = &block.operation.value {
                    self.data.insert(block.operation.key.clone(), value.clone());
                }
            }
        }
        self.latest_depth = depth;
    }
}
