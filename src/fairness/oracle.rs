//! Crash Point Oracle
//!
//! Maps `(secret, sequence number)` to a crash multiplier with HMAC-SHA256.
//!
//! ```text
//! digest     = HMAC-SHA256(key = secret text, msg = decimal(sequence_number))
//! v          = u32::from_be_bytes(digest[0..4])
//! normalized = v / (2^32 - 1)
//! multiplier = 1 + normalized * 9
//! ```
//!
//! The byte order and the `2^32 - 1` denominator are part of the published
//! verification procedure and must never change, or historical rounds stop
//! verifying.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Lowest possible crash multiplier.
pub const MIN_CRASH_MULTIPLIER: f64 = 1.0;

/// Exclusive upper bound on the crash multiplier.
pub const MAX_CRASH_MULTIPLIER: f64 = 10.0;

/// Width of the multiplier range.
const MULTIPLIER_SPAN: f64 = MAX_CRASH_MULTIPLIER - MIN_CRASH_MULTIPLIER;

/// Denominator used to normalize the 32-bit sample.
const NORMALIZER: f64 = u32::MAX as f64;

/// Compute the crash multiplier for a round.
///
/// Pure and deterministic: identical inputs give bit-identical output.
/// The result lies in `[1, 10)`.
pub fn compute_crash_multiplier(secret: &[u8], sequence_number: u64) -> f64 {
    let mut mac = HmacSha256::new_from_slice(secret)
        .expect("HMAC accepts keys of any length");
    mac.update(sequence_number.to_string().as_bytes());
    let digest = mac.finalize().into_bytes();

    let sample = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    multiplier_from_sample(sample)
}

/// Scale a 32-bit sample into the multiplier range.
///
/// `u32::MAX` normalizes to exactly 1.0; that single sample is pinned to the
/// largest float below 10 so the range stays half-open. It still verifies
/// within the published tolerance.
pub fn multiplier_from_sample(sample: u32) -> f64 {
    let normalized = sample as f64 / NORMALIZER;
    let multiplier = MIN_CRASH_MULTIPLIER + normalized * MULTIPLIER_SPAN;
    if multiplier >= MAX_CRASH_MULTIPLIER {
        f64::from_bits(MAX_CRASH_MULTIPLIER.to_bits() - 1)
    } else {
        multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_secret_round_one() {
        let secret = [0u8; 32];
        let first = compute_crash_multiplier(&secret, 1);
        let second = compute_crash_multiplier(&secret, 1);

        assert_eq!(first.to_bits(), second.to_bits());
        // HMAC-SHA256(0^32, "1") starts with 41e0a944
        assert_eq!(first, 1.0 + (0x41e0a944u32 as f64 / 4294967295.0) * 9.0);
        assert!((first - 3.316008770446295).abs() < 1e-12);
    }

    #[test]
    fn test_sequence_number_changes_outcome() {
        let secret = [0u8; 32];
        let one = compute_crash_multiplier(&secret, 1);
        let two = compute_crash_multiplier(&secret, 2);
        assert_ne!(one, two);
        assert!((two - 7.242024348639423).abs() < 1e-12);
    }

    #[test]
    fn test_secret_changes_outcome() {
        let a = compute_crash_multiplier(&[0u8; 32], 7);
        let b = compute_crash_multiplier(&[1u8; 32], 7);
        assert_ne!(a, b);
        assert!((b - 5.267972672886208).abs() < 1e-12);
    }

    #[test]
    fn test_hex_text_key() {
        // the revealed form of an all-zero draw
        let key = "0".repeat(64);
        let m = compute_crash_multiplier(key.as_bytes(), 1);
        assert_eq!(m, 1.0 + (0x847926d8u32 as f64 / 4294967295.0) * 9.0);
        assert!((m - 5.657262659784701).abs() < 1e-12);
        assert!((compute_crash_multiplier(key.as_bytes(), 2) - 8.133037738300171).abs() < 1e-12);
    }

    #[test]
    fn test_sample_bounds() {
        assert_eq!(multiplier_from_sample(0), MIN_CRASH_MULTIPLIER);
        let top = multiplier_from_sample(u32::MAX);
        assert!(top < MAX_CRASH_MULTIPLIER);
        assert!(MAX_CRASH_MULTIPLIER - top < 0.01);
        assert!(multiplier_from_sample(u32::MAX - 1) < MAX_CRASH_MULTIPLIER);
    }

    proptest! {
        #[test]
        fn prop_multiplier_in_range(secret in proptest::collection::vec(any::<u8>(), 0..64), seq in any::<u64>()) {
            let m = compute_crash_multiplier(&secret, seq);
            prop_assert!(m >= MIN_CRASH_MULTIPLIER);
            prop_assert!(m < MAX_CRASH_MULTIPLIER);
        }

        #[test]
        fn prop_deterministic(secret in any::<[u8; 32]>(), seq in any::<u64>()) {
            let a = compute_crash_multiplier(&secret, seq);
            let b = compute_crash_multiplier(&secret, seq);
            prop_assert_eq!(a.to_bits(), b.to_bits());
        }
    }
}
