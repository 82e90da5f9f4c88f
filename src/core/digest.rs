//! Digest type and leading-zero difficulty metric

use crate::core::constants::DIGEST_SIZE;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 32-byte output of double SHA-256
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest(pub [u8; DIGEST_SIZE]);

impl Digest {
    /// Create a digest from raw bytes
    pub const fn from_bytes(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a digest from its 64-character hex encoding
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str).map_err(|e| Error::invalid_digest(e.to_string()))?;
        if bytes.len() != DIGEST_SIZE {
            return Err(Error::invalid_digest(format!(
                "expected {} bytes, got {}",
                DIGEST_SIZE,
                bytes.len()
            )));
        }
        let mut array = [0u8; DIGEST_SIZE];
        array.copy_from_slice(&bytes);
        Ok(Self(array))
    }

    /// Get the digest bytes
    pub const fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    /// Lowercase hex encoding
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Count consecutive zero bits from the most significant bit, 0..=256
    pub fn leading_zero_bits(&self) -> u32 {
        match self.0.iter().enumerate().find(|(_, b)| **b != 0) {
            Some((i, b)) => i as u32 * 8 + b.leading_zeros(),
            None => DIGEST_SIZE as u32 * 8,
        }
    }

    /// Count leading zero hex nibbles (4-bit groups), the on-chain granularity
    pub fn leading_zero_nibbles(&self) -> u32 {
        self.leading_zero_bits() / 4
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex_str = String::deserialize(deserializer)?;
        Self::from_hex(&hex_str).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        let hex = "08dac0ed0f498bf42ab5a4e6dbc1c7883fd34fb9ef593a3e8acae36e71f61d24";
        let digest = Digest::from_hex(hex).unwrap();
        assert_eq!(digest.to_hex(), hex);
    }

    #[test]
    fn test_invalid_hex() {
        assert!(Digest::from_hex("zz").is_err());
        assert!(Digest::from_hex("00").is_err());
        assert!(Digest::from_hex(&"00".repeat(33)).is_err());
    }

    #[test]
    fn test_leading_zero_bits() {
        let mut bytes = [0xFFu8; DIGEST_SIZE];
        assert_eq!(Digest::from_bytes(bytes).leading_zero_bits(), 0);

        bytes[0] = 0x00;
        bytes[1] = 0x80;
        assert_eq!(Digest::from_bytes(bytes).leading_zero_bits(), 8);

        bytes[1] = 0x08;
        assert_eq!(Digest::from_bytes(bytes).leading_zero_bits(), 12);

        assert_eq!(Digest::from_bytes([0u8; DIGEST_SIZE]).leading_zero_bits(), 256);
    }

    #[test]
    fn test_leading_zero_nibbles() {
        let digest =
            Digest::from_hex("002abd8b7b686c501e73668e19322a7a3794f33b56c4eb184dd1c00b663a1f22")
                .unwrap();
        assert_eq!(digest.leading_zero_bits(), 10);
        // 10 bits round down to 2 whole nibbles
        assert_eq!(digest.leading_zero_nibbles(), 2);
    }

    #[test]
    fn test_serde_as_hex_string() {
        let hex = "67878e91ce95acc9010559c97f11352bfa42ec3e65c8ae30706f80172eff3dc5";
        let digest = Digest::from_hex(hex).unwrap();
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", hex));
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
    }
}
