//! Reward curve mapping proof-of-work quality to a token amount

use serde::{Deserialize, Serialize};

/// Base token denomination (smallest units per whole token)
const DENOMINATION: u64 = 100_000_000;

/// Days between reward halvings
const HALVING_PERIOD_DAYS: u64 = 14;

// Tue Sep  2 04:20:00 UTC 2025.
const START_TIME: u64 = 1_756_786_800;

/// Policy parameters for the reward curve
///
/// The curve is `denomination · bits² >> halvings(block_time)`: quadratic in
/// the leading-zero-bit count, halving every period after `start_time`. The
/// mining core only relies on the amount being monotonically non-decreasing
/// in the bit count; the exact shape is policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSchedule {
    /// Smallest units per whole token
    pub denomination: u64,
    /// Unix seconds at which the schedule starts
    pub start_time: u64,
    /// Seconds between halvings
    pub halving_period_secs: u64,
}

impl Default for RewardSchedule {
    fn default() -> Self {
        Self {
            denomination: DENOMINATION,
            start_time: START_TIME,
            halving_period_secs: HALVING_PERIOD_DAYS * 24 * 3600,
        }
    }
}

impl RewardSchedule {
    /// Token amount for a proof with the given leading-zero-bit count,
    /// minted at `block_time` (unix seconds)
    ///
    /// Times before `start_time` are clamped to the schedule start.
    pub fn amount(&self, leading_zero_bits: u32, block_time: u64) -> u64 {
        let block_time = block_time.max(self.start_time);
        let halvings = ((block_time - self.start_time) / self.halving_period_secs).min(63);
        let quality = leading_zero_bits as u64;
        self.denomination
            .saturating_mul(quality * quality)
            .wrapping_shr(halvings as u32)
    }
}
