//! The double-SHA-256 hash primitive
//!
//! `digest(challenge, nonce) = SHA256(SHA256(challenge ∥ ascii_decimal(nonce)))`,
//! challenge bytes first, nonce ASCII second, no separator. This function is
//! the single source of truth; the compute kernel in
//! `shaders/sha256d.wgsl` must produce bit-identical output for every
//! (challenge, nonce) pair.

use crate::core::{Challenge, Digest, Nonce};
use sha2::{Digest as _, Sha256};

/// Double SHA-256 of arbitrary bytes
pub fn sha256d(data: &[u8]) -> Digest {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    Digest::from_bytes(second.into())
}

/// The mining digest for one (challenge, nonce) pair
pub fn challenge_digest(challenge: &Challenge, nonce: Nonce) -> Digest {
    let (digits, len) = nonce.to_decimal_bytes();
    let mut hasher = Sha256::new();
    hasher.update(challenge.as_bytes());
    hasher.update(&digits[..len]);
    let first = hasher.finalize();
    Digest::from_bytes(Sha256::digest(first).into())
}
