//! Error types for the mining client
//!
//! This module provides the error handling system using `thiserror`
//! for automatic error trait implementations.

use thiserror::Error;

/// Main error type for the mining client
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed funding reference (txid/output index)
    #[error("Invalid challenge: {0}")]
    InvalidChallenge(String),

    /// The parallel accelerator is not available on this host
    #[error("Accelerator unsupported: {0}")]
    AcceleratorUnsupported(String),

    /// GPU device or kernel failure
    #[error("GPU error: {0}")]
    Gpu(String),

    /// The 64-bit nonce counter would overflow
    #[error("Nonce range exhausted at {0}")]
    NonceRangeExhausted(u64),

    /// Malformed digest encoding
    #[error("Invalid digest: {0}")]
    InvalidDigest(String),

    /// Progress store failures (checkpoint/result persistence)
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Worker errors
    #[error("Worker error: {0}")]
    Worker(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the mining client
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid challenge error
    pub fn invalid_challenge(msg: impl Into<String>) -> Self {
        Self::InvalidChallenge(msg.into())
    }

    /// Create an accelerator-unsupported error
    pub fn accelerator_unsupported(msg: impl Into<String>) -> Self {
        Self::AcceleratorUnsupported(msg.into())
    }

    /// Create an invalid digest error
    pub fn invalid_digest(msg: impl Into<String>) -> Self {
        Self::InvalidDigest(msg.into())
    }

    /// Create a GPU error
    pub fn gpu(msg: impl Into<String>) -> Self {
        Self::Gpu(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a worker error
    pub fn worker(msg: impl Into<String>) -> Self {
        Self::Worker(msg.into())
    }

    /// Whether the caller should fall back to the sequential miner
    pub fn is_accelerator_failure(&self) -> bool {
        matches!(self, Self::AcceleratorUnsupported(_) | Self::Gpu(_))
    }
}
