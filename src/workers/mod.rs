//! Miner implementations for the two execution back-ends
//!
//! This module provides the sequential (CPU) and parallel (GPU) miners.
//! Both implement the `Miner` trait, share the hash primitive in
//! `core::hash`, and persist through the injected progress store, so a
//! search can move between back-ends across restarts. Only one miner may be
//! active per challenge at a time; switching modes requires stopping the
//! active miner first.

pub mod cpu;
pub mod gpu;

pub use cpu::{CpuMiner, CpuMinerConfig};
pub use gpu::{GpuMiner, GpuMinerConfig};

use crate::core::{Challenge, Difficulty, Digest, MiningMode, MiningState, Nonce};
use crate::error::Result;
use crate::store::{CheckpointRecord, ProgressStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::watch;
use tracing::warn;

/// Accepted proof for a completed search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningOutcome {
    /// The winning nonce
    pub nonce: Nonce,
    /// The winning digest
    pub digest: Digest,
    /// Leading zero bits of the winning digest
    pub leading_zero_bits: u32,
}

/// Throttled progress snapshot
///
/// Published through a latest-value channel on a bounded cadence; consumers
/// must not rely on observing every intermediate nonce.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Most recently evaluated nonce
    pub nonce: u64,
    /// Digest of that nonce (parallel mode: best digest of the last batch)
    pub digest_hex: String,
    /// Measured hash rate since the previous snapshot
    pub hash_rate_per_second: u64,
    /// Best leading-zero-bit count so far
    pub best_leading_zero_bits: u32,
    /// Whether the target difficulty has been met
    pub target_met: bool,
}

/// Trait for all miner implementations
#[async_trait]
pub trait Miner: Send + Sync {
    /// Run the search until the difficulty is met or `stop` is called
    ///
    /// Returns `Ok(Some(outcome))` on completion, `Ok(None)` when stopped
    /// cooperatively (a final checkpoint has been persisted).
    async fn mine(
        &self,
        challenge: &Challenge,
        difficulty: Difficulty,
        resume: bool,
    ) -> Result<Option<MiningOutcome>>;

    /// Request a cooperative stop; observed at the next loop boundary
    async fn stop(&self) -> Result<()>;

    /// Which back-end this miner drives
    fn mode(&self) -> MiningMode;

    /// Subscribe to the throttled progress snapshots
    fn progress(&self) -> watch::Receiver<ProgressSnapshot>;

    /// Current hashrate (hashes per second)
    async fn hashrate(&self) -> u64;
}

/// Hash counter with a sliding measurement window
#[derive(Debug)]
pub(crate) struct HashRateMeter {
    count: AtomicU64,
    window_start: Mutex<Instant>,
}

impl HashRateMeter {
    pub(crate) fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            window_start: Mutex::new(Instant::now()),
        }
    }

    pub(crate) fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
        *self.window_start.lock() = Instant::now();
    }

    pub(crate) fn record(&self, hashes: u64) {
        self.count.fetch_add(hashes, Ordering::Relaxed);
    }

    /// Hashes per second over the current window, then start a new window
    pub(crate) fn rate(&self) -> u64 {
        let hashes = self.count.swap(0, Ordering::Relaxed);
        let mut start = self.window_start.lock();
        let elapsed = start.elapsed();
        *start = Instant::now();
        if elapsed.as_millis() == 0 {
            return 0;
        }
        (hashes as f64 / elapsed.as_secs_f64()) as u64
    }
}

/// Resolve the nonce and best-so-far a search should start from
///
/// Loads the challenge's checkpoint when resuming. The store only returns
/// checkpoints whose embedded challenge matches, so a checkpoint left behind
/// by a different challenge is ignored and the search restarts at nonce 0.
pub(crate) fn resume_point(
    store: &dyn ProgressStore,
    challenge: &Challenge,
    resume: bool,
) -> Result<Option<CheckpointRecord>> {
    if !resume {
        return Ok(None);
    }
    match store.load_checkpoint(challenge)? {
        Some(checkpoint) => Ok(Some(checkpoint)),
        None => {
            warn!(challenge = %challenge, "no checkpoint to resume from, starting at nonce 0");
            Ok(None)
        }
    }
}

/// Restore best-so-far fields from a checkpoint into a fresh state
pub(crate) fn restore_best(state: &mut MiningState, checkpoint: &CheckpointRecord) {
    if let Ok(digest) = Digest::from_hex(&checkpoint.best_digest_hex) {
        state.offer_best(
            Nonce::new(checkpoint.best_nonce),
            digest,
            checkpoint.best_leading_zero_bits,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_resume_point_ignores_other_challenge() {
        let store = MemoryStore::new();
        let x = Challenge::from_canonical("X:0");
        let y = Challenge::from_canonical("Y:0");

        let mut state = MiningState::new(x.clone(), MiningMode::Sequential, 0);
        state.is_active = true;
        state.advance_to(Nonce::new(9_999));
        let checkpoint = CheckpointRecord::from_state(
            &state,
            Difficulty::from_nibbles(2).unwrap(),
            None,
            0,
        );
        store.save_checkpoint(&checkpoint).unwrap();

        // requesting Y must not see X's progress
        assert!(resume_point(&store, &y, true).unwrap().is_none());
        // requesting X resumes where it left off
        let resumed = resume_point(&store, &x, true).unwrap().unwrap();
        assert_eq!(resumed.resume_nonce(), Nonce::new(9_999));
        // a fresh start ignores the checkpoint entirely
        assert!(resume_point(&store, &x, false).unwrap().is_none());
    }

    #[test]
    fn test_restore_best_skips_empty_digest() {
        let challenge = Challenge::from_canonical("abc123:0");
        let mut state = MiningState::new(challenge.clone(), MiningMode::Sequential, 0);
        let source = MiningState::new(challenge, MiningMode::Sequential, 0);
        let checkpoint = CheckpointRecord::from_state(
            &source,
            Difficulty::from_nibbles(1).unwrap(),
            None,
            0,
        );
        restore_best(&mut state, &checkpoint);
        assert!(state.best_digest.is_none());
    }

    #[tokio::test]
    async fn test_hash_rate_meter() {
        let meter = HashRateMeter::new();
        meter.record(500);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let rate = meter.rate();
        assert!(rate > 0);
        // the window resets after each measurement
        assert_eq!(meter.count.load(Ordering::Relaxed), 0);
    }
}
