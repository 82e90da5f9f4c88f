//! Proof verification
//!
//! Re-derives and checks a submitted (challenge, nonce, digest) triple,
//! independent of which miner produced it. Verification is pure: the
//! spend-status of the funding output is a separate, additive check the
//! caller performs through an injected chain query.

use crate::core::hash::challenge_digest;
use crate::core::{Challenge, Difficulty, Nonce};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason code attached to every verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerifyOutcome {
    /// Digest matches and difficulty is satisfied
    Valid,
    /// Recomputed digest differs from the claimed digest
    InvalidProof,
    /// Digest matches but has too few leading zero nibbles
    DifficultyNotMet,
    /// Proof is sound but the funding output was already spent
    OutputSpent,
}

impl fmt::Display for VerifyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyOutcome::Valid => write!(f, "valid"),
            VerifyOutcome::InvalidProof => write!(f, "invalid proof"),
            VerifyOutcome::DifficultyNotMet => write!(f, "difficulty not met"),
            VerifyOutcome::OutputSpent => write!(f, "output spent"),
        }
    }
}

/// Result of checking one proof; computed on demand, never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    /// Whether the proof is accepted
    pub accepted: bool,
    /// Why
    pub outcome: VerifyOutcome,
}

impl Verification {
    fn rejected(outcome: VerifyOutcome) -> Self {
        Self {
            accepted: false,
            outcome,
        }
    }
}

/// Verify a submitted proof against a challenge and required difficulty
///
/// The claimed digest must match the recomputed
/// `sha256d(challenge ∥ ascii_decimal(nonce))` byte for byte, and the
/// recomputed digest's hex form must carry at least `difficulty` leading
/// `'0'` characters. A malformed claimed digest is an invalid proof, not an
/// error.
pub fn verify_proof(
    challenge: &Challenge,
    nonce: Nonce,
    claimed_digest_hex: &str,
    difficulty: Difficulty,
) -> Verification {
    let recomputed = challenge_digest(challenge, nonce);

    let claimed = claimed_digest_hex.to_ascii_lowercase();
    if claimed != recomputed.to_hex() {
        return Verification::rejected(VerifyOutcome::InvalidProof);
    }

    if recomputed.leading_zero_nibbles() < difficulty.nibbles() {
        return Verification::rejected(VerifyOutcome::DifficultyNotMet);
    }

    Verification {
        accepted: true,
        outcome: VerifyOutcome::Valid,
    }
}

/// Verify a proof and additionally require the funding output to be unspent
///
/// `is_output_spent` is the injected chain query. It is only consulted when
/// the pure checks pass, and it never changes their outcome: a spent output
/// downgrades an otherwise-valid proof to [`VerifyOutcome::OutputSpent`].
/// Challenges without a parseable funding reference are rejected as invalid
/// proofs before any query is made.
pub fn verify_proof_with_spend_check<F>(
    challenge: &Challenge,
    nonce: Nonce,
    claimed_digest_hex: &str,
    difficulty: Difficulty,
    is_output_spent: F,
) -> Verification
where
    F: Fn(&str, u32) -> bool,
{
    let pure = verify_proof(challenge, nonce, claimed_digest_hex, difficulty);
    if !pure.accepted {
        return pure;
    }
    let Some((txid, vout)) = challenge.funding_ref() else {
        return Verification::rejected(VerifyOutcome::InvalidProof);
    };
    if is_output_spent(txid, vout) {
        return Verification::rejected(VerifyOutcome::OutputSpent);
    }
    pure
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST_NONCE_1: &str = "08dac0ed0f498bf42ab5a4e6dbc1c7883fd34fb9ef593a3e8acae36e71f61d24";

    fn challenge() -> Challenge {
        Challenge::from_canonical("abc123:0")
    }

    fn difficulty(nibbles: u32) -> Difficulty {
        Difficulty::from_nibbles(nibbles).unwrap()
    }

    #[test]
    fn test_accepts_valid_proof() {
        let verification = verify_proof(&challenge(), Nonce::new(1), DIGEST_NONCE_1, difficulty(1));
        assert!(verification.accepted);
        assert_eq!(verification.outcome, VerifyOutcome::Valid);
    }

    #[test]
    fn test_claimed_digest_case_insensitive() {
        let upper = DIGEST_NONCE_1.to_ascii_uppercase();
        assert!(verify_proof(&challenge(), Nonce::new(1), &upper, difficulty(1)).accepted);
    }

    #[test]
    fn test_rejects_wrong_nonce() {
        let verification = verify_proof(&challenge(), Nonce::new(2), DIGEST_NONCE_1, difficulty(1));
        assert!(!verification.accepted);
        assert_eq!(verification.outcome, VerifyOutcome::InvalidProof);
    }

    #[test]
    fn test_rejects_single_bit_mutation() {
        // flip one bit in the last hex digit: 0x24 -> 0x25
        let mut mutated = DIGEST_NONCE_1.to_string();
        mutated.replace_range(63..64, "5");
        let verification = verify_proof(&challenge(), Nonce::new(1), &mutated, difficulty(1));
        assert_eq!(verification.outcome, VerifyOutcome::InvalidProof);
    }

    #[test]
    fn test_rejects_malformed_digest() {
        let verification = verify_proof(&challenge(), Nonce::new(1), "not-hex", difficulty(1));
        assert_eq!(verification.outcome, VerifyOutcome::InvalidProof);
    }

    #[test]
    fn test_rejects_insufficient_difficulty() {
        // digest for nonce 1 has exactly one leading zero nibble
        let verification = verify_proof(&challenge(), Nonce::new(1), DIGEST_NONCE_1, difficulty(2));
        assert!(!verification.accepted);
        assert_eq!(verification.outcome, VerifyOutcome::DifficultyNotMet);
    }

    #[test]
    fn test_spend_status_is_additive_only() {
        // sha256d("<txid>:0" + "0") = 0bdc2580..., one leading zero nibble
        let txid = "a1b2c3d4e5f6789012345678901234567890123456789012345678901234abcd";
        let challenge = Challenge::new(txid, 0).unwrap();
        let digest = challenge_digest(&challenge, Nonce::new(0)).to_hex();
        let lenient = Difficulty::from_nibbles(1).unwrap();

        let pure = verify_proof(&challenge, Nonce::new(0), &digest, lenient);
        assert!(pure.accepted);

        // a spent output must not change the pure digest/difficulty outcome,
        // only the final acceptance
        let spent = verify_proof_with_spend_check(
            &challenge,
            Nonce::new(0),
            &digest,
            lenient,
            |_, _| true,
        );
        assert!(!spent.accepted);
        assert_eq!(spent.outcome, VerifyOutcome::OutputSpent);

        let unspent = verify_proof_with_spend_check(
            &challenge,
            Nonce::new(0),
            &digest,
            lenient,
            |_, _| false,
        );
        assert_eq!(unspent, pure);
    }

    #[test]
    fn test_spend_query_not_consulted_on_invalid_proof() {
        let verification = verify_proof_with_spend_check(
            &challenge(),
            Nonce::new(2),
            DIGEST_NONCE_1,
            difficulty(1),
            |_, _| panic!("spend query must not run for an invalid proof"),
        );
        assert_eq!(verification.outcome, VerifyOutcome::InvalidProof);
    }
}
