//! Mining session state shared between the miners and progress reporting

use crate::core::{Challenge, Digest, Nonce};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which back-end is searching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MiningMode {
    /// Increment-and-hash loop on the CPU
    Sequential,
    /// Batched compute-kernel dispatches
    Parallel,
}

impl fmt::Display for MiningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiningMode::Sequential => write!(f, "sequential"),
            MiningMode::Parallel => write!(f, "parallel"),
        }
    }
}

/// Lifecycle of one mining session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinerPhase {
    /// Not yet started
    Idle,
    /// Actively searching
    Running,
    /// Stopped cooperatively; checkpoint persisted
    Paused,
    /// Target difficulty reached; result persisted
    Completed,
}

impl fmt::Display for MinerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MinerPhase::Idle => write!(f, "idle"),
            MinerPhase::Running => write!(f, "running"),
            MinerPhase::Paused => write!(f, "paused"),
            MinerPhase::Completed => write!(f, "completed"),
        }
    }
}

/// State of the search over one challenge
///
/// Owned exclusively by the active miner; one `MiningState` exists per
/// challenge at a time. `best_leading_zero_bits` never decreases and
/// `current_nonce` only moves forward while the state is active.
#[derive(Debug, Clone)]
pub struct MiningState {
    /// The challenge being mined
    pub challenge: Challenge,
    /// Back-end driving this state
    pub mode: MiningMode,
    /// Whether a miner is currently advancing this state
    pub is_active: bool,
    /// Next nonce to evaluate (sequential) or next batch start (parallel)
    pub current_nonce: Nonce,
    /// Nonce of the best digest seen so far
    pub best_nonce: Nonce,
    /// Best digest seen so far
    pub best_digest: Option<Digest>,
    /// Leading zero bits of the best digest
    pub best_leading_zero_bits: u32,
    /// Unix milliseconds when the session started
    pub started_at_ms: u64,
}

impl MiningState {
    /// Fresh state for a challenge at nonce 0
    pub fn new(challenge: Challenge, mode: MiningMode, started_at_ms: u64) -> Self {
        Self {
            challenge,
            mode,
            is_active: false,
            current_nonce: Nonce::new(0),
            best_nonce: Nonce::new(0),
            best_digest: None,
            best_leading_zero_bits: 0,
            started_at_ms,
        }
    }

    /// Offer a candidate best; returns true when it improves the running best
    ///
    /// The best only ever moves up, so `best_leading_zero_bits` is
    /// monotonically non-decreasing over the life of the state.
    pub fn offer_best(&mut self, nonce: Nonce, digest: Digest, leading_zero_bits: u32) -> bool {
        if leading_zero_bits > self.best_leading_zero_bits || self.best_digest.is_none() {
            self.best_nonce = nonce;
            self.best_digest = Some(digest);
            self.best_leading_zero_bits = leading_zero_bits;
            true
        } else {
            false
        }
    }

    /// Move the search cursor forward; ignored when inactive or regressing
    pub fn advance_to(&mut self, nonce: Nonce) {
        if self.is_active && nonce >= self.current_nonce {
            self.current_nonce = nonce;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::challenge_digest;

    fn state() -> MiningState {
        MiningState::new(
            Challenge::from_canonical("abc123:0"),
            MiningMode::Sequential,
            0,
        )
    }

    #[test]
    fn test_best_is_monotone() {
        let mut state = state();
        let challenge = state.challenge.clone();

        let d0 = challenge_digest(&challenge, Nonce::new(0));
        assert!(state.offer_best(Nonce::new(0), d0, d0.leading_zero_bits()));

        let d1 = challenge_digest(&challenge, Nonce::new(1));
        assert!(state.offer_best(Nonce::new(1), d1, d1.leading_zero_bits()));
        assert_eq!(state.best_leading_zero_bits, 4);

        // an equal or worse candidate must not displace the best
        assert!(!state.offer_best(Nonce::new(0), d0, d0.leading_zero_bits()));
        assert_eq!(state.best_nonce, Nonce::new(1));
        assert_eq!(state.best_leading_zero_bits, 4);
    }

    #[test]
    fn test_first_digest_always_recorded() {
        let mut state = state();
        let challenge = state.challenge.clone();
        let digest = challenge_digest(&challenge, Nonce::new(5));
        assert!(state.offer_best(Nonce::new(5), digest, 0));
        assert_eq!(state.best_digest, Some(digest));
    }

    #[test]
    fn test_cursor_only_advances_while_active() {
        let mut state = state();
        state.advance_to(Nonce::new(10));
        assert_eq!(state.current_nonce, Nonce::new(0));

        state.is_active = true;
        state.advance_to(Nonce::new(10));
        assert_eq!(state.current_nonce, Nonce::new(10));

        state.advance_to(Nonce::new(5));
        assert_eq!(state.current_nonce, Nonce::new(10));
    }
}
