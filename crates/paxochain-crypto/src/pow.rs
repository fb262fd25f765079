//! Proof-of-work nonce mining.
//!
//! A block is valid once `SHA256(rendered_operation ∥ nonce) mod 10 <= 2`
//! for some nonce. Mining draws uniformly random 10-character alphanumeric
//! strings until one satisfies the predicate.

use rand::Rng;

use crate::hash::sha256;

/// Length of a mined nonce.
pub const NONCE_LEN: usize = 10;

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Draw one random 10-character alphanumeric nonce candidate.
pub fn random_nonce() -> String {
    let mut rng = rand::thread_rng();
    (0..NONCE_LEN)
        .map(|_| ALPHANUMERIC[rng.gen_range(0..ALPHANUMERIC.len())] as char)
        .collect()
}

/// Does `text ∥ nonce` satisfy the proof-of-work predicate?
///
/// Reduces the digest's full big-endian value mod 10 via repeated remainder
/// folding, rather than counting leading zero bits.
pub fn satisfies_pow(text: &str, nonce: &str) -> bool {
    let mut payload = String::with_capacity(text.len() + nonce.len());
    payload.push_str(text);
    payload.push_str(nonce);
    let digest = sha256(payload.as_bytes());
    digest_mod10(digest.as_bytes()) <= 2
}

/// Mine a nonce for `text` by drawing random candidates until one satisfies
/// [`satisfies_pow`]. Returns the accepted nonce.
pub fn mine_nonce(text: &str) -> String {
    loop {
        let candidate = random_nonce();
        if satisfies_pow(text, &candidate) {
            return candidate;
        }
    }
}

/// `bytes` interpreted as a big-endian unsigned integer, reduced mod 10.
fn digest_mod10(bytes: &[u8; 32]) -> u8 {
    let mut remainder: u32 = 0;
    for &byte in bytes {
        remainder = (remainder * 256 + byte as u32) % 10;
    }
    remainder as u8
}
