//! Checkpoint and result persistence
//!
//! The progress store is the only resource shared across process restarts.
//! It is an abstract key-value port: records are serialized to JSON and
//! written under keys namespaced per challenge, and every write replaces the
//! whole value atomically. Corrupted stored data is logged, cleared, and
//! treated as absent; it never surfaces as a failure to the miner.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::core::{Challenge, Difficulty, Digest, MiningState, Nonce};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Resumable snapshot of an in-progress search
///
/// Overwritten every checkpoint interval. A checkpoint and a result for the
/// same challenge are mutually exclusive: completing the search writes the
/// result and clears the checkpoint in the same operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Canonical challenge string the snapshot belongs to
    pub challenge: String,
    /// Next nonce the search will evaluate
    pub nonce: u64,
    /// Most recent digest observed
    pub digest_hex: String,
    /// Required difficulty in leading zero nibbles
    pub difficulty: u32,
    /// Nonce of the best digest so far
    pub best_nonce: u64,
    /// Best digest so far (empty until one is recorded)
    pub best_digest_hex: String,
    /// Leading zero bits of the best digest
    pub best_leading_zero_bits: u32,
    /// Unix milliseconds at write time
    pub timestamp_ms: u64,
}

impl CheckpointRecord {
    /// Snapshot the live mining state
    pub fn from_state(
        state: &MiningState,
        difficulty: Difficulty,
        digest: Option<&Digest>,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            challenge: state.challenge.as_str().to_string(),
            nonce: state.current_nonce.value(),
            digest_hex: digest.map(Digest::to_hex).unwrap_or_default(),
            difficulty: difficulty.nibbles(),
            best_nonce: state.best_nonce.value(),
            best_digest_hex: state
                .best_digest
                .as_ref()
                .map(Digest::to_hex)
                .unwrap_or_default(),
            best_leading_zero_bits: state.best_leading_zero_bits,
            timestamp_ms,
        }
    }

    /// The nonce the search resumes from
    pub fn resume_nonce(&self) -> Nonce {
        Nonce::new(self.nonce)
    }
}

/// Terminal snapshot of a completed search
///
/// Written once, after which the checkpoint for the challenge is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Canonical challenge string the proof is bound to
    pub challenge: String,
    /// Winning nonce
    pub nonce: u64,
    /// Winning digest
    pub digest_hex: String,
    /// Required difficulty in leading zero nibbles
    pub difficulty: u32,
    /// Leading zero bits of the winning digest
    pub leading_zero_bits: u32,
    /// Unix milliseconds at completion
    pub timestamp_ms: u64,
    /// Always true; distinguishes results from checkpoints on disk
    pub completed: bool,
}

impl ResultRecord {
    /// Build the terminal record for a winning (nonce, digest) pair
    pub fn new(
        challenge: &Challenge,
        nonce: Nonce,
        digest: &Digest,
        difficulty: Difficulty,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            challenge: challenge.as_str().to_string(),
            nonce: nonce.value(),
            digest_hex: digest.to_hex(),
            difficulty: difficulty.nibbles(),
            leading_zero_bits: digest.leading_zero_bits(),
            timestamp_ms,
            completed: true,
        }
    }
}

/// Abstract checkpoint/result persistence with resume semantics
///
/// Keys are namespaced per challenge, so loading for one challenge can never
/// observe another challenge's progress. Implementations must treat
/// undecodable stored data as absent (log and clear, do not error) and make
/// each write an atomic replace of the whole value.
pub trait ProgressStore: Send + Sync {
    /// Persist (overwrite) the checkpoint for the record's challenge
    fn save_checkpoint(&self, checkpoint: &CheckpointRecord) -> Result<()>;

    /// Load the checkpoint for a challenge, if any survives validation
    fn load_checkpoint(&self, challenge: &Challenge) -> Result<Option<CheckpointRecord>>;

    /// Remove the checkpoint for a challenge
    fn clear_checkpoint(&self, challenge: &Challenge) -> Result<()>;

    /// Persist the terminal result and clear the challenge's checkpoint
    fn save_result(&self, result: &ResultRecord) -> Result<()>;

    /// Load the completed result for a challenge, if any
    fn load_result(&self, challenge: &Challenge) -> Result<Option<ResultRecord>>;

    /// Remove the result for a challenge
    fn clear_result(&self, challenge: &Challenge) -> Result<()>;
}

/// Storage key for a challenge's checkpoint
pub(crate) fn checkpoint_key(challenge: &Challenge) -> String {
    format!("checkpoint:{}", challenge.as_str())
}

/// Storage key for a challenge's result
pub(crate) fn result_key(challenge: &Challenge) -> String {
    format!("result:{}", challenge.as_str())
}

/// Decode a checkpoint, rejecting records whose embedded challenge does not
/// match the requested one (stale or tampered data is treated as corrupt)
pub(crate) fn decode_checkpoint(
    raw: &str,
    challenge: &Challenge,
) -> std::result::Result<CheckpointRecord, String> {
    let record: CheckpointRecord =
        serde_json::from_str(raw).map_err(|e| format!("undecodable checkpoint: {}", e))?;
    if record.challenge != challenge.as_str() {
        return Err(format!(
            "checkpoint challenge {:?} does not match {:?}",
            record.challenge,
            challenge.as_str()
        ));
    }
    Ok(record)
}

/// Decode a result, requiring the `completed` marker and a matching challenge
pub(crate) fn decode_result(
    raw: &str,
    challenge: &Challenge,
) -> std::result::Result<ResultRecord, String> {
    let record: ResultRecord =
        serde_json::from_str(raw).map_err(|e| format!("undecodable result: {}", e))?;
    if !record.completed {
        return Err("result record not marked completed".to_string());
    }
    if record.challenge != challenge.as_str() {
        return Err(format!(
            "result challenge {:?} does not match {:?}",
            record.challenge,
            challenge.as_str()
        ));
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MiningMode;

    fn sample_state() -> MiningState {
        let mut state = MiningState::new(
            Challenge::from_canonical("abc123:0"),
            MiningMode::Sequential,
            1_000,
        );
        state.is_active = true;
        state.advance_to(Nonce::new(20_000));
        state
    }

    #[test]
    fn test_checkpoint_from_state() {
        let difficulty = Difficulty::from_nibbles(2).unwrap();
        let checkpoint = CheckpointRecord::from_state(&sample_state(), difficulty, None, 5_000);
        assert_eq!(checkpoint.challenge, "abc123:0");
        assert_eq!(checkpoint.nonce, 20_000);
        assert_eq!(checkpoint.difficulty, 2);
        assert_eq!(checkpoint.resume_nonce(), Nonce::new(20_000));
    }

    #[test]
    fn test_decode_rejects_challenge_mismatch() {
        let difficulty = Difficulty::from_nibbles(2).unwrap();
        let checkpoint = CheckpointRecord::from_state(&sample_state(), difficulty, None, 0);
        let raw = serde_json::to_string(&checkpoint).unwrap();

        let same = Challenge::from_canonical("abc123:0");
        assert!(decode_checkpoint(&raw, &same).is_ok());

        let other = Challenge::from_canonical("ffffff:0");
        assert!(decode_checkpoint(&raw, &other).is_err());
    }

    #[test]
    fn test_decode_result_requires_completed_marker() {
        let challenge = Challenge::from_canonical("abc123:0");
        let digest = crate::core::hash::challenge_digest(&challenge, Nonce::new(1));
        let difficulty = Difficulty::from_nibbles(1).unwrap();
        let mut record = ResultRecord::new(&challenge, Nonce::new(1), &digest, difficulty, 0);
        assert!(decode_result(&serde_json::to_string(&record).unwrap(), &challenge).is_ok());

        record.completed = false;
        assert!(decode_result(&serde_json::to_string(&record).unwrap(), &challenge).is_err());
    }

    #[test]
    fn test_keys_are_namespaced_per_challenge() {
        let a = Challenge::from_canonical("X:0");
        let b = Challenge::from_canonical("Y:0");
        assert_ne!(checkpoint_key(&a), checkpoint_key(&b));
        assert_ne!(checkpoint_key(&a), result_key(&a));
    }
}
