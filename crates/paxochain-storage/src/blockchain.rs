//! The hash-chained, proof-of-work-gated append-only block log.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use paxochain_primitives::HashPointer;
use paxochain_types::{decode_block, encode_block, Block, Operation};
use tracing::{info, warn};

use crate::error::StorageResult;

struct Inner {
    blocks: Vec<Block>,
    path: Option<PathBuf>,
}

/// A replica's local copy of the hash-chained log.
///
/// All mutation goes through a single mutex scoped to the instance, not a
/// module-level global, so multiple replicas can run in one process without
/// serializing on each other's appends.
pub struct Blockchain {
    inner: Mutex<Inner>,
}

impl Blockchain {
    /// Create an empty, in-memory-only blockchain.
    pub fn new() -> Self {
        Blockchain {
            inner: Mutex::new(Inner {
                blocks: Vec::new(),
                path: None,
            }),
        }
    }

    /// Create a blockchain backed by a log file, restoring any existing
    /// contents from it.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let blocks = Self::restore_from(&path)?;
        Ok(Blockchain {
            inner: Mutex::new(Inner {
                blocks,
                path: Some(path),
            }),
        })
    }

    fn restore_from(path: &Path) -> StorageResult<Vec<Block>> {
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        let mut blocks = Vec::new();
        let mut pos = 0;
        while pos + 4 <= buf.len() {
            let len = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap()) as usize;
            pos += 4;
            if pos + len > buf.len() {
                // Truncated trailing record from a torn write; stop here
                // rather than erroring the whole restore.
                warn!("truncated trailing log record in {:?}, stopping restore", path);
                break;
            }
            match decode_block(&buf[pos..pos + len]) {
                Ok(block) => blocks.push(block),
                Err(e) => {
                    warn!("failed to decode log record in {:?}: {e}, stopping restore", path);
                    break;
                }
            }
            pos += len;
        }
        Ok(blocks)
    }

    /// Current log depth (number of decided-or-tentative blocks).
    pub fn depth(&self) -> u64 {
        self.inner.lock().blocks.len() as u64
    }

    /// `true` if the tail block is still tentative (accepted but not yet
    /// decided).
    pub fn is_tentative(&self) -> bool {
        self.inner
            .lock()
            .blocks
            .last()
            .map(|b| b.tentative)
            .unwrap_or(false)
    }

    /// Clone the block at `depth` (0-indexed), if present.
    pub fn block_at(&self, depth: u64) -> Option<Block> {
        self.inner.lock().blocks.get(depth as usize).cloned()
    }

    /// Clone every block currently in the log.
    pub fn blocks(&self) -> Vec<Block> {
        self.inner.lock().blocks.clone()
    }

    /// Mine and build the next block for `operation`, chained onto the
    /// current tail (or [`HashPointer::Genesis`] if the log is empty).
    pub fn generate_next(&self, operation: Operation) -> Block {
        let predecessor = {
            let inner = self.inner.lock();
            match inner.blocks.last() {
                Some(tail) => tail.next_pointer(),
                None => HashPointer::Genesis,
            }
        };
        Block::new(operation, predecessor)
    }

    /// Append `block` to the log.
    ///
    /// Returns `Ok(true)` if the block was appended, `Ok(false)` if it was
    /// rejected as a duplicate, a hash-pointer mismatch, or an invalid
    /// proof-of-work. These are expected, non-exceptional outcomes, not
    /// errors.
    pub fn append(&self, block: Block) -> StorageResult<bool> {
        let mut inner = self.inner.lock();

        if let Some(tail) = inner.blocks.last() {
            if tail.hash_pointer == block.hash_pointer {
                warn!("duplicate block append ignored");
                return Ok(false);
            }
        }

        let expected_pointer = match inner.blocks.last() {
            Some(tail) => tail.next_pointer(),
            None => HashPointer::Genesis,
        };
        if block.hash_pointer != expected_pointer {
            warn!("block rejected: hash pointer does not match expected predecessor");
            return Ok(false);
        }

        if !block.has_valid_pow() {
            warn!("block rejected: invalid proof-of-work");
            return Ok(false);
        }

        inner.blocks.push(block);
        if let Some(path) = inner.path.clone() {
            let last = inner.blocks.last().unwrap().clone();
            append_record(&path, &last)?;
        }
        info!(depth = inner.blocks.len(), "block appended");
        Ok(true)
    }

    /// Replace the tail block in place (used to move a block from
    /// tentative to decided, or vice-versa) and rewrite the whole log file.
    pub fn update(&self, block: Block) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        if inner.blocks.is_empty() {
            inner.blocks.push(block);
        } else {
            let last = inner.blocks.len() - 1;
            inner.blocks[last] = block;
        }
        if let Some(path) = inner.path.clone() {
            rewrite_file(&path, &inner.blocks)?;
        }
        Ok(())
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Blockchain::new()
    }
}

fn append_record(path: &Path, block: &Block) -> StorageResult<()> {
    let bytes = encode_block(block)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(&(bytes.len() as u32).to_le_bytes())?;
    file.write_all(&bytes)?;
    Ok(())
}

fn rewrite_file(path: &Path, blocks: &[Block]) -> StorageResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    for block in blocks {
        let bytes = encode_block(block)?;
        file.write_all(&(bytes.len() as u32).to_le_bytes())?;
        file.write_all(&bytes)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "paxochain_blockchain_test_{}_{}.log",
            std::process::id(),
            rand_suffix()
        ));
        path
    }

    fn rand_suffix() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos() as u64
    }

    #[test]
    fn genesis_append_uses_literal_zero_pointer() {
        let chain = Blockchain::new();
        let block = chain.generate_next(Operation::get("k"));
        assert!(block.hash_pointer.is_genesis());
        assert!(chain.append(block).unwrap());
        assert_eq!(chain.depth(), 1);
    }

    #[test]
    fn second_block_chains_onto_first() {
        let chain = Blockchain::new();
        let b0 = chain.generate_next(Operation::get("k1"));
        chain.append(b0.clone()).unwrap();
        let b1 = chain.generate_next(Operation::get("k2"));
        assert_eq!(b1.hash_pointer, b0.next_pointer());
        assert!(chain.append(b1).unwrap());
        assert_eq!(chain.depth(), 2);
    }

    #[test]
    fn duplicate_append_is_noop() {
        let chain = Blockchain::new();
        let block = chain.generate_next(Operation::get("k"));
        assert!(chain.append(block.clone()).unwrap());
        assert!(!chain.append(block).unwrap());
        assert_eq!(chain.depth(), 1);
    }

    #[test]
    fn mismatched_pointer_is_rejected() {
        let chain = Blockchain::new();
        chain.append(chain.generate_next(Operation::get("k1"))).unwrap();
        // Mine a block whose predecessor is genesis even though the chain
        // has already advanced past depth 0.
        let bogus = Block::new(Operation::get("k2"), HashPointer::Genesis);
        assert!(!chain.append(bogus).unwrap());
        assert_eq!(chain.depth(), 1);
    }

    #[test]
    fn invalid_pow_is_rejected() {
        let chain = Blockchain::new();
        let mut block = chain.generate_next(Operation::get("k"));
        // Corrupt the nonce until it no longer satisfies the predicate.
        loop {
            block.nonce = "zzzzzzzzzz".to_string();
            if !block.has_valid_pow() {
                break;
            }
        }
        assert!(!chain.append(block).unwrap());
        assert_eq!(chain.depth(), 0);
    }

    #[test]
    fn update_replaces_tail_without_growing_depth() {
        let chain = Blockchain::new();
        let block = chain.generate_next(Operation::get("k"));
        chain.append(block.clone()).unwrap();
        let mut decided = block;
        decided.tentative = false;
        chain.update(decided).unwrap();
        assert_eq!(chain.depth(), 1);
        assert!(!chain.is_tentative());
    }

    #[test]
    fn is_tentative_reflects_tail_flag() {
        let chain = Blockchain::new();
        let mut block = chain.generate_next(Operation::get("k"));
        block.tentative = true;
        chain.append(block).unwrap();
        assert!(chain.is_tentative());
    }

    #[test]
    fn restore_round_trips_through_file() {
        let path = temp_path();
        {
            let chain = Blockchain::open(&path).unwrap();
            chain.append(chain.generate_next(Operation::get("a"))).unwrap();
            chain.append(chain.generate_next(Operation::put("b", "2"))).unwrap();
        }
        let restored = Blockchain::open(&path).unwrap();
        assert_eq!(restored.depth(), 2);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_restores_as_empty() {
        let path = temp_path();
        let chain = Blockchain::open(&path).unwrap();
        assert_eq!(chain.depth(), 0);
    }

    #[test]
    fn update_rewrites_whole_file() {
        let path = temp_path();
        {
            let chain = Blockchain::open(&path).unwrap();
            chain.append(chain.generate_next(Operation::get("a"))).unwrap();
            let mut tentative = chain.generate_next(Operation::put("b", "1"));
            tentative.tentative = true;
            chain.append(tentative.clone()).unwrap();
            tentative.tentative = false;
            chain.update(tentative).unwrap();
        }
        let restored = Blockchain::open(&path).unwrap();
        assert_eq!(restored.depth(), 2);
        assert!(!restored.is_tentative());
        std::fs::remove_file(&path).ok();
    }
}
