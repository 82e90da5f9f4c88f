//! Challenge type binding a proof to one funding output

use crate::core::constants::TXID_HEX_LEN;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical challenge bytes for a funding output
///
/// The canonical form is the UTF-8 encoding of `"<funding-txid>:<vout>"`,
/// with no separator between the challenge and the nonce that is appended
/// during hashing. A challenge is immutable once mining starts and
/// identifies exactly one funding output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Challenge {
    canonical: String,
}

impl Challenge {
    /// Build a challenge from a funding transaction id and output index
    ///
    /// The txid must be exactly 64 hex characters. No other validation is
    /// performed; in particular the output is not checked for existence.
    pub fn new(txid: &str, vout: u32) -> Result<Self> {
        if txid.len() != TXID_HEX_LEN {
            return Err(Error::invalid_challenge(format!(
                "txid must be {} hex chars, got {}",
                TXID_HEX_LEN,
                txid.len()
            )));
        }
        if !txid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::invalid_challenge("txid contains non-hex characters"));
        }
        Ok(Self {
            canonical: format!("{}:{}", txid.to_ascii_lowercase(), vout),
        })
    }

    /// Re-hydrate a challenge from its canonical string form
    ///
    /// Used when loading persisted checkpoints/results, where the string was
    /// produced by [`Challenge::new`] in an earlier session. Performs no
    /// validation.
    pub fn from_canonical(canonical: impl Into<String>) -> Self {
        Self {
            canonical: canonical.into(),
        }
    }

    /// The canonical challenge bytes hashed by both back-ends
    pub fn as_bytes(&self) -> &[u8] {
        self.canonical.as_bytes()
    }

    /// The canonical `"<txid>:<vout>"` string
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Challenge length in bytes
    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    /// Whether the challenge is empty (only possible via `from_canonical`)
    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }

    /// Parse the embedded funding reference back out of the canonical form
    ///
    /// Returns `None` when the challenge was hydrated from a string that is
    /// not of the `"<txid>:<vout>"` shape.
    pub fn funding_ref(&self) -> Option<(&str, u32)> {
        let (txid, vout) = self.canonical.rsplit_once(':')?;
        Some((txid, vout.parse().ok()?))
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TXID: &str = "a1b2c3d4e5f6789012345678901234567890123456789012345678901234abcd";

    #[test]
    fn test_canonical_encoding() {
        let challenge = Challenge::new(TXID, 0).unwrap();
        assert_eq!(challenge.as_str(), format!("{}:0", TXID));
        assert_eq!(challenge.as_bytes(), format!("{}:0", TXID).as_bytes());
    }

    #[test]
    fn test_vout_encoded_in_decimal() {
        let challenge = Challenge::new(TXID, 17).unwrap();
        assert!(challenge.as_str().ends_with(":17"));
    }

    #[test]
    fn test_txid_normalized_to_lowercase() {
        let upper = TXID.to_ascii_uppercase();
        let challenge = Challenge::new(&upper, 0).unwrap();
        assert_eq!(challenge.as_str(), format!("{}:0", TXID));
    }

    #[test]
    fn test_rejects_bad_txid() {
        assert!(Challenge::new("abc123", 0).is_err());
        assert!(Challenge::new(&"g".repeat(64), 0).is_err());
        assert!(Challenge::new(&"0".repeat(63), 0).is_err());
        assert!(Challenge::new(&"0".repeat(65), 0).is_err());
    }

    #[test]
    fn test_funding_ref_round_trip() {
        let challenge = Challenge::new(TXID, 3).unwrap();
        assert_eq!(challenge.funding_ref(), Some((TXID, 3)));

        let raw = Challenge::from_canonical("not-a-funding-ref");
        assert_eq!(raw.funding_ref(), None);
    }

    #[test]
    fn test_serde_round_trip() {
        let challenge = Challenge::new(TXID, 1).unwrap();
        let json = serde_json::to_string(&challenge).unwrap();
        assert_eq!(json, format!("\"{}:1\"", TXID));
        let back: Challenge = serde_json::from_str(&json).unwrap();
        assert_eq!(back, challenge);
    }
}
