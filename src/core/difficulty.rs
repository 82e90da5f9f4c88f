//! Mining difficulty expressed in leading zero hex nibbles
//!
//! The on-chain verification granularity is whole hex characters of the
//! digest, while the compute kernel reduces on leading zero bits. Bits are
//! the canonical unit everywhere inside the miner; the ×4 nibble conversion
//! happens only at this boundary.

use crate::core::Digest;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Required difficulty: a minimum count of leading zero hex nibbles
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Difficulty(u32);

impl Difficulty {
    /// Create a difficulty from a leading-zero-nibble count (1..=64)
    pub fn from_nibbles(nibbles: u32) -> Result<Self> {
        if nibbles == 0 || nibbles > 64 {
            return Err(Error::config(format!(
                "difficulty must be between 1 and 64 leading zero nibbles, got {}",
                nibbles
            )));
        }
        Ok(Self(nibbles))
    }

    /// The nibble count
    pub const fn nibbles(self) -> u32 {
        self.0
    }

    /// The equivalent leading-zero-bit count
    pub const fn bits(self) -> u32 {
        self.0 * 4
    }

    /// Whether a digest satisfies this difficulty
    pub fn is_met_by(self, digest: &Digest) -> bool {
        digest.leading_zero_bits() >= self.bits()
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} nibbles ({} bits)", self.0, self.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nibble_bit_conversion() {
        let difficulty = Difficulty::from_nibbles(4).unwrap();
        assert_eq!(difficulty.nibbles(), 4);
        assert_eq!(difficulty.bits(), 16);
    }

    #[test]
    fn test_bounds() {
        assert!(Difficulty::from_nibbles(0).is_err());
        assert!(Difficulty::from_nibbles(65).is_err());
        assert!(Difficulty::from_nibbles(64).is_ok());
    }

    #[test]
    fn test_is_met_by() {
        // 10 leading zero bits: meets 1 and 2 nibbles, not 3
        let digest =
            Digest::from_hex("002abd8b7b686c501e73668e19322a7a3794f33b56c4eb184dd1c00b663a1f22")
                .unwrap();
        assert!(Difficulty::from_nibbles(1).unwrap().is_met_by(&digest));
        assert!(Difficulty::from_nibbles(2).unwrap().is_met_by(&digest));
        assert!(!Difficulty::from_nibbles(3).unwrap().is_met_by(&digest));
    }
}
