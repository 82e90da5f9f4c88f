//! In-memory progress store for tests and ephemeral sessions

use crate::core::Challenge;
use crate::error::Result;
use crate::store::{
    CheckpointRecord, ProgressStore, ResultRecord, checkpoint_key, decode_checkpoint,
    decode_result, result_key,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::warn;

/// Progress store backed by a process-local key-value map
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a raw value, bypassing serialization (test helper for
    /// exercising corruption recovery)
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.write().insert(key.into(), value.into());
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl ProgressStore for MemoryStore {
    fn save_checkpoint(&self, checkpoint: &CheckpointRecord) -> Result<()> {
        let key = format!("checkpoint:{}", checkpoint.challenge);
        let value = serde_json::to_string(checkpoint)?;
        self.entries.write().insert(key, value);
        Ok(())
    }

    fn load_checkpoint(&self, challenge: &Challenge) -> Result<Option<CheckpointRecord>> {
        let key = checkpoint_key(challenge);
        let raw = match self.entries.read().get(&key) {
            Some(raw) => raw.clone(),
            None => return Ok(None),
        };
        match decode_checkpoint(&raw, challenge) {
            Ok(record) => Ok(Some(record)),
            Err(reason) => {
                warn!(%reason, "discarding corrupted checkpoint");
                self.entries.write().remove(&key);
                Ok(None)
            }
        }
    }

    fn clear_checkpoint(&self, challenge: &Challenge) -> Result<()> {
        self.entries.write().remove(&checkpoint_key(challenge));
        Ok(())
    }

    fn save_result(&self, result: &ResultRecord) -> Result<()> {
        let value = serde_json::to_string(result)?;
        let mut entries = self.entries.write();
        entries.insert(format!("result:{}", result.challenge), value);
        // completion and checkpoint removal are one atomic step
        entries.remove(&format!("checkpoint:{}", result.challenge));
        Ok(())
    }

    fn load_result(&self, challenge: &Challenge) -> Result<Option<ResultRecord>> {
        let key = result_key(challenge);
        let raw = match self.entries.read().get(&key) {
            Some(raw) => raw.clone(),
            None => return Ok(None),
        };
        match decode_result(&raw, challenge) {
            Ok(record) => Ok(Some(record)),
            Err(reason) => {
                warn!(%reason, "discarding corrupted result");
                self.entries.write().remove(&key);
                Ok(None)
            }
        }
    }

    fn clear_result(&self, challenge: &Challenge) -> Result<()> {
        self.entries.write().remove(&result_key(challenge));
        Ok(())
    }
}
