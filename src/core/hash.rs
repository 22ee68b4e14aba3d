//! Hashing Helpers
//!
//! SHA-256 wrappers used by the fairness commitment and by verifiers.
//! Digests travel over the wire as lowercase hex.

use sha2::{Sha256, Digest};

/// Hash output type (256 bits / 32 bytes)
pub type Digest32 = [u8; 32];

/// Compute a plain SHA-256 of arbitrary data.
///
/// No domain separator is mixed in: external verifiers must be able to
/// reproduce the digest with any stock SHA-256 tool.
pub fn sha256(data: &[u8]) -> Digest32 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Encode a digest as lowercase hex.
pub fn to_hex(digest: &[u8]) -> String {
    hex::encode(digest)
}

/// Decode a 64-character hex string into a 32-byte digest.
pub fn digest_from_hex(s: &str) -> Option<Digest32> {
    let bytes = hex::decode(s.trim()).ok()?;
    if bytes.len() != 32 {
        return None;
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Some(out)
}

/// Constant-time equality for digests.
///
/// Comparison time does not depend on where the first differing byte is.
pub fn digests_equal(a: &Digest32, b: &Digest32) -> bool {
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256("abc")
        let digest = sha256(b"abc");
        assert_eq!(
            to_hex(&digest),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha256_determinism() {
        assert_eq!(sha256(&[7u8; 32]), sha256(&[7u8; 32]));
        assert_ne!(sha256(&[7u8; 32]), sha256(&[8u8; 32]));
    }

    #[test]
    fn test_hex_digest_parse() {
        let digest = sha256(b"round");
        let hex = to_hex(&digest);
        assert_eq!(digest_from_hex(&hex), Some(digest));
        assert_eq!(digest_from_hex(&format!("  {}\n", hex)), Some(digest));
    }

    #[test]
    fn test_hex_digest_rejects_wrong_length() {
        assert_eq!(digest_from_hex("abcd"), None);
        assert_eq!(digest_from_hex("zz"), None);
        assert_eq!(digest_from_hex(&"00".repeat(33)), None);
    }

    #[test]
    fn test_digests_equal() {
        let a = sha256(b"a");
        let mut b = a;
        assert!(digests_equal(&a, &b));
        b[31] ^= 1;
        assert!(!digests_equal(&a, &b));
    }
}
