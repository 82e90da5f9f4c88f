//! # UTXO PoW Miner
//!
//! A proof-of-work commitment engine that binds double-SHA-256 work to a
//! specific Bitcoin funding output. A client mines
//! `sha256d(challenge ∥ decimal-nonce)` where the challenge is the canonical
//! `"<txid>:<vout>"` encoding of the funding output, then submits the winning
//! `(nonce, digest)` pair as the proof that real computation was spent before
//! the output may mint a token.
//!
//! ## Features
//!
//! - **Sequential miner**: cooperative single-threaded nonce search with
//!   periodic checkpointing and resume
//! - **Parallel miner**: wgpu compute kernel evaluating large nonce batches,
//!   with a from-scratch SHA-256 and an atomic per-batch best reduction
//! - **Progress store** port with pluggable in-memory and file backends
//! - **Verifier** that re-derives and checks a submitted proof
//!
//! ## Architecture
//!
//! Both back-ends implement the `Miner` trait and share one hash primitive;
//! digests are bit-identical regardless of which back-end computed them. The
//! active miner owns its `MiningState` and persists through an injected
//! `ProgressStore`, so a long-running search survives interruption.

#![warn(
    missing_docs,
    rust_2018_idioms,
    unused_lifetimes,
    unused_qualifications,
    clippy::all
)]
#![forbid(unsafe_code)]

pub mod config;
pub mod core;
pub mod error;
pub mod store;
pub mod utils;
pub mod verify;
pub mod workers;

pub use crate::error::{Error, Result};
pub use config::Config;
pub use core::{Challenge, Difficulty, Digest, Nonce};
pub use workers::Miner;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        config::Config,
        core::{Challenge, Difficulty, Digest, MiningMode, Nonce},
        error::{Error, Result},
        store::{FileStore, MemoryStore, ProgressStore},
        verify::{VerifyOutcome, verify_proof},
        workers::{Miner, MiningOutcome},
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
