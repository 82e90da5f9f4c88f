//! Nonce type for mining operations

use crate::core::constants::MAX_NONCE_DIGITS;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a 64-bit nonce used in mining
///
/// Nonces are hashed as their base-10 ASCII encoding with no leading zeros
/// (nonce 0 encodes as the single byte `'0'`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Nonce(pub u64);

impl Nonce {
    /// Create a new Nonce
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the inner value
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Increment by 1, failing at the top of the 64-bit range
    pub fn checked_increment(self) -> Result<Self> {
        self.0
            .checked_add(1)
            .map(Self)
            .ok_or(Error::NonceRangeExhausted(self.0))
    }

    /// Split into the (lo, hi) 32-bit word pair used by the compute kernel
    pub const fn to_words(self) -> NonceWords {
        NonceWords {
            lo: self.0 as u32,
            hi: (self.0 >> 32) as u32,
        }
    }

    /// Encode as base-10 ASCII into a stack buffer, returning (buffer, length)
    ///
    /// The digits occupy `buf[..len]` with no leading zeros.
    pub fn to_decimal_bytes(self) -> ([u8; MAX_NONCE_DIGITS], usize) {
        let mut buf = [0u8; MAX_NONCE_DIGITS];
        let mut n = self.0;
        let mut i = MAX_NONCE_DIGITS;
        loop {
            i -= 1;
            buf[i] = b'0' + (n % 10) as u8;
            n /= 10;
            if n == 0 {
                break;
            }
        }
        let len = MAX_NONCE_DIGITS - i;
        buf.copy_within(i.., 0);
        (buf, len)
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Nonce {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Nonce> for u64 {
    fn from(nonce: Nonce) -> Self {
        nonce.0
    }
}

/// A 64-bit nonce as two 32-bit lanes, mirroring the compute kernel
///
/// The kernel cannot assume native 64-bit integers, so it carries the nonce
/// as a (lo, hi) pair with explicit add-with-carry and base-10 long division.
/// This type implements the same operations on the host so the emulation is
/// testable without a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceWords {
    /// Low 32 bits
    pub lo: u32,
    /// High 32 bits
    pub hi: u32,
}

impl NonceWords {
    /// Reassemble the 64-bit value
    pub const fn to_nonce(self) -> Nonce {
        Nonce(((self.hi as u64) << 32) | self.lo as u64)
    }

    /// Add a 32-bit offset with carry into the high word, wrapping at 2^64
    pub const fn wrapping_add_u32(self, add: u32) -> Self {
        let (lo, carry) = self.lo.overflowing_add(add);
        Self {
            lo,
            hi: self.hi.wrapping_add(carry as u32),
        }
    }

    /// Divide by 10, returning the quotient and the remainder digit
    ///
    /// Long division in base 2^16 so every intermediate fits in 32 bits,
    /// exactly as the kernel performs it.
    pub const fn divmod10(self) -> (Self, u32) {
        let q_hi = self.hi / 10;
        let r_hi = self.hi - q_hi * 10;

        let lo_hi16 = (self.lo >> 16) & 0xFFFF;
        let x1 = (r_hi << 16) | lo_hi16;
        let q1 = x1 / 10;
        let r1 = x1 - q1 * 10;

        let lo_lo16 = self.lo & 0xFFFF;
        let x2 = (r1 << 16) | lo_lo16;
        let q2 = x2 / 10;
        let r2 = x2 - q2 * 10;

        (
            Self {
                lo: (q1 << 16) | q2,
                hi: q_hi,
            },
            r2,
        )
    }

    /// Decimal ASCII encoding via repeated [`NonceWords::divmod10`]
    ///
    /// Mirrors the kernel's in-lane conversion; must agree byte-for-byte
    /// with [`Nonce::to_decimal_bytes`].
    pub fn to_decimal_bytes(self) -> ([u8; MAX_NONCE_DIGITS], usize) {
        let mut digits = [0u8; MAX_NONCE_DIGITS];
        if self.lo == 0 && self.hi == 0 {
            digits[0] = b'0';
            return (digits, 1);
        }
        let mut rev = [0u8; MAX_NONCE_DIGITS];
        let mut len = 0usize;
        let mut q = self;
        while !(q.lo == 0 && q.hi == 0) {
            let (next, rem) = q.divmod10();
            rev[len] = b'0' + rem as u8;
            len += 1;
            q = next;
        }
        for (i, d) in digits.iter_mut().take(len).enumerate() {
            *d = rev[len - 1 - i];
        }
        (digits, len)
    }
}
