//! File-backed progress store
//!
//! One JSON file per key under a data directory. Writes go to a temporary
//! sibling and are renamed into place, so a reader never observes a partial
//! value. File names are derived from a digest of the key, keeping challenge
//! strings out of the filesystem namespace.

use crate::core::Challenge;
use crate::error::{Error, Result};
use crate::store::{
    CheckpointRecord, ProgressStore, ResultRecord, checkpoint_key, decode_checkpoint,
    decode_result, result_key,
};
use sha2::{Digest as _, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Progress store persisting each record as a JSON file
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(&digest[..12])))
    }

    fn read_raw(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::store(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn write_atomic(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::store(format!(
                "failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// The directory records are stored under
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ProgressStore for FileStore {
    fn save_checkpoint(&self, checkpoint: &CheckpointRecord) -> Result<()> {
        let key = format!("checkpoint:{}", checkpoint.challenge);
        self.write_atomic(&key, &serde_json::to_string(checkpoint)?)
    }

    fn load_checkpoint(&self, challenge: &Challenge) -> Result<Option<CheckpointRecord>> {
        let key = checkpoint_key(challenge);
        let raw = match self.read_raw(&key)? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        match decode_checkpoint(&raw, challenge) {
            Ok(record) => Ok(Some(record)),
            Err(reason) => {
                warn!(%reason, "discarding corrupted checkpoint file");
                self.remove(&key)?;
                Ok(None)
            }
        }
    }

    fn clear_checkpoint(&self, challenge: &Challenge) -> Result<()> {
        self.remove(&checkpoint_key(challenge))
    }

    fn save_result(&self, result: &ResultRecord) -> Result<()> {
        let result_key = format!("result:{}", result.challenge);
        self.write_atomic(&result_key, &serde_json::to_string(result)?)?;
        // completion clears the checkpoint; result landed first so a crash
        // between the two steps can only leave a stale checkpoint behind
        self.remove(&format!("checkpoint:{}", result.challenge))
    }

    fn load_result(&self, challenge: &Challenge) -> Result<Option<ResultRecord>> {
        let key = result_key(challenge);
        let raw = match self.read_raw(&key)? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        match decode_result(&raw, challenge) {
            Ok(record) => Ok(Some(record)),
            Err(reason) => {
                warn!(%reason, "discarding corrupted result file");
                self.remove(&key)?;
                Ok(None)
            }
        }
    }

    fn clear_result(&self, challenge: &Challenge) -> Result<()> {
        self.remove(&result_key(challenge))
    }
}
