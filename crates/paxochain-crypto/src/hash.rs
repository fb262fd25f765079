//! SHA-256 hashing.

use paxochain_primitives::Sha256Digest;
use sha2::{Digest, Sha256};

/// Compute the SHA-256 digest of the input data.
pub fn sha256(data: &[u8]) -> Sha256Digest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    Sha256Digest::from_bytes(result.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector_empty() {
        let hash = sha256(&[]);
        assert_eq!(
            hash.to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn sha256_known_vector_abc() {
        let hash = sha256(b"abc");
        assert_eq!(
            hash.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn sha256_deterministic() {
        let data = b"test data for determinism";
        assert_eq!(sha256(data), sha256(data));
    }

    #[test]
    fn sha256_different_inputs_differ() {
        assert_ne!(sha256(b"input1"), sha256(b"input2"));
    }

    #[test]
    fn sha256_output_length() {
        let hash = sha256(b"The quick brown fox jumps over the lazy dog");
        assert_eq!(hash.as_bytes().len(), 32);
    }

    #[test]
    fn sha256_avalanche_effect() {
        let a = sha256(&[0x00]);
        let b = sha256(&[0x01]);
        let diff = a
            .as_bytes()
            .iter()
            .zip(b.as_bytes().iter())
            .filter(|(x, y)| x != y)
            .count();
        assert!(diff > 20, "expected avalanche effect, only {diff} bytes differ");
    }
}
