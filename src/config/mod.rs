//! Configuration management for the mining client

use crate::core::Difficulty;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Mining configuration
    pub mining: MiningConfig,

    /// Progress store configuration
    pub store: StoreConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Mining configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningConfig {
    /// Required difficulty in leading zero hex nibbles
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,

    /// Worker back-end ("cpu" or "gpu")
    #[serde(default = "default_worker")]
    pub worker: String,

    /// Nonces between checkpoint writes (0 = back-end default)
    #[serde(default)]
    pub checkpoint_interval: u64,
}

/// Progress store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory checkpoint and result records are written under
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (plain, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_difficulty() -> u32 {
    4
}

fn default_worker() -> String {
    "cpu".to_string()
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(".utxo-pow-miner")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "plain".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&contents)
            .map_err(|e| Error::config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        Difficulty::from_nibbles(self.mining.difficulty)?;

        match self.mining.worker.as_str() {
            "cpu" | "gpu" => {}
            other => {
                return Err(Error::config(format!("Unknown worker type: {}", other)));
            }
        }

        if self.store.dir.as_os_str().is_empty() {
            return Err(Error::config("Store directory must not be empty"));
        }

        Ok(())
    }

    /// The configured difficulty
    pub fn difficulty(&self) -> Result<Difficulty> {
        Difficulty::from_nibbles(self.mining.difficulty)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mining: MiningConfig {
                difficulty: default_difficulty(),
                worker: default_worker(),
                checkpoint_interval: 0,
            },
            store: StoreConfig {
                dir: default_store_dir(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
        }
    }
}
