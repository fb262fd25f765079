//! SHA-256 digest type and the hash-pointer used to chain blocks together.

use std::fmt;
use thiserror::Error;

/// Hash parsing error
#[derive(Debug, Error)]
pub enum HashError {
    /// Invalid hex string
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
    /// Invalid length
    #[error("invalid digest length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },
}

/// A 256-bit SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sha256Digest([u8; 32]);

impl Sha256Digest {
    /// Size in bytes.
    pub const LEN: usize = 32;

    /// All-zero digest. Not used as the genesis sentinel (see [`HashPointer`]);
    /// only present for `Default`/testing convenience.
    pub const ZERO: Sha256Digest = Sha256Digest([0u8; 32]);

    /// Build a digest from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Sha256Digest(bytes)
    }

    /// Build a digest from a byte slice, checking its length.
    pub fn from_slice(slice: &[u8]) -> Result<Self, HashError> {
        if slice.len() != 32 {
            return Err(HashError::InvalidLength {
                expected: 32,
                got: slice.len(),
            });
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Ok(Sha256Digest(bytes))
    }

    /// Parse a digest from a hex string (with or without a `0x` prefix).
    pub fn from_hex(s: &str) -> Result<Self, HashError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| HashError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render as a lowercase hex string, unprefixed: the exact text that
    /// appears in a block's canonical rendering and in a `RecoveryData`
    /// payload.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256Digest({})", self.to_hex())
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for Sha256Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Sha256Digest(bytes)
    }
}

impl AsRef<[u8]> for Sha256Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// The predecessor pointer stored in a block.
///
/// Block 0's predecessor is the literal integer `0`, not a digest, rendered
/// as the bare text `0` rather than a 64-character hex string. Every later
/// block's proof-of-work and hash pointer are computed over the rendered
/// text of its predecessor, so reproducing this exactly is required for
/// chain validation to agree across replicas.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HashPointer {
    /// Predecessor of the genesis block.
    Genesis,
    /// Predecessor is a real, previously-mined block.
    Digest(Sha256Digest),
}

impl HashPointer {
    /// `true` for [`HashPointer::Genesis`].
    pub fn is_genesis(&self) -> bool {
        matches!(self, HashPointer::Genesis)
    }
}

impl fmt::Display for HashPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashPointer::Genesis => write!(f, "0"),
            HashPointer::Digest(d) => write!(f, "{d}"),
        }
    }
}
