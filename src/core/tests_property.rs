//! Property-based tests for the core mining data structures
//!
//! These tests verify basic invariants using proptest

use super::*;
use proptest::prelude::*;

proptest! {
    #[test]
    fn nonce_creation_consistency(value in any::<u64>()) {
        let nonce = Nonce::new(value);
        prop_assert_eq!(nonce.value(), value);
    }

    #[test]
    fn nonce_decimal_roundtrip(value in any::<u64>()) {
        let (buf, len) = Nonce::new(value).to_decimal_bytes();
        let text = std::str::from_utf8(&buf[..len]).unwrap();
        prop_assert_eq!(text.parse::<u64>().unwrap(), value);
        // no leading zeros for any nonce
        prop_assert!(value == 0 || !text.starts_with('0'));
    }

    #[test]
    fn nonce_decimal_matches_display(value in any::<u64>()) {
        let (buf, len) = Nonce::new(value).to_decimal_bytes();
        let display = Nonce::new(value).to_string();
        prop_assert_eq!(&buf[..len], display.as_bytes());
    }

    #[test]
    fn nonce_word_split_roundtrip(value in any::<u64>()) {
        prop_assert_eq!(Nonce::new(value).to_words().to_nonce().value(), value);
    }

    #[test]
    fn emulated_divmod_matches_native(value in any::<u64>()) {
        let (quotient, remainder) = Nonce::new(value).to_words().divmod10();
        prop_assert_eq!(quotient.to_nonce().value(), value / 10);
        prop_assert_eq!(remainder as u64, value % 10);
    }

    #[test]
    fn emulated_encoding_matches_native(value in any::<u64>()) {
        let nonce = Nonce::new(value);
        prop_assert_eq!(nonce.to_words().to_decimal_bytes(), nonce.to_decimal_bytes());
    }

    #[test]
    fn emulated_add_carries(value in any::<u64>(), add in any::<u32>()) {
        let sum = Nonce::new(value).to_words().wrapping_add_u32(add);
        prop_assert_eq!(sum.to_nonce().value(), value.wrapping_add(add as u64));
    }

    #[test]
    fn digest_hex_roundtrip(bytes in prop::array::uniform32(any::<u8>())) {
        let digest = Digest::from_bytes(bytes);
        let parsed = Digest::from_hex(&digest.to_hex()).unwrap();
        prop_assert_eq!(parsed, digest);
    }

    #[test]
    fn leading_zero_bits_matches_naive(bytes in prop::array::uniform32(any::<u8>())) {
        let digest = Digest::from_bytes(bytes);
        let mut naive = 0u32;
        'outer: for byte in bytes {
            for bit in (0..8).rev() {
                if (byte >> bit) & 1 == 1 {
                    break 'outer;
                }
                naive += 1;
            }
        }
        prop_assert_eq!(digest.leading_zero_bits(), naive);
        prop_assert_eq!(digest.leading_zero_nibbles(), naive / 4);
    }

    #[test]
    fn digest_hex_prefix_agrees_with_nibbles(bytes in prop::array::uniform32(any::<u8>())) {
        let digest = Digest::from_bytes(bytes);
        let hex = digest.to_hex();
        let hex_zeros = hex.chars().take_while(|c| *c == '0').count() as u32;
        // the nibble count is exactly the number of leading '0' hex chars
        prop_assert_eq!(digest.leading_zero_nibbles(), hex_zeros);
    }

    #[test]
    fn hash_primitive_deterministic(nonce in any::<u64>()) {
        let challenge = Challenge::from_canonical("abc123:0");
        let a = hash::challenge_digest(&challenge, Nonce::new(nonce));
        let b = hash::challenge_digest(&challenge, Nonce::new(nonce));
        prop_assert_eq!(a, b);
    }

    #[test]
    fn reward_monotone(bits_a in 0u32..=256, bits_b in 0u32..=256, time in any::<u32>()) {
        let schedule = RewardSchedule::default();
        let (lo, hi) = if bits_a <= bits_b { (bits_a, bits_b) } else { (bits_b, bits_a) };
        prop_assert!(schedule.amount(lo, time as u64) <= schedule.amount(hi, time as u64));
    }
}
