//! Round Commitment Protocol
//!
//! Commit to a fresh secret before the round is playable.
//! Reveal the secret at crash so anyone can check `SHA-256(secret)`
//! against the hash that was published during the waiting phase.
//!
//! The secret is the 64-character lowercase hex text of 32 random bytes.
//! That text, byte for byte as revealed, is both the SHA-256 input and the
//! HMAC key, so `sha256sum` over the revealed string reproduces the
//! commitment.

use std::fmt;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::core::hash::{digest_from_hex, digests_equal, sha256, to_hex, Digest32};

/// Random bytes drawn per secret (256 bits of entropy).
pub const SECRET_LEN: usize = 32;

/// Per-round secret. Private until the round crashes.
///
/// Holds the hex text, not the raw draw. `Debug` is redacted so the secret
/// cannot leak through logging.
#[derive(Clone, PartialEq, Eq)]
pub struct RoundSecret(String);

impl RoundSecret {
    /// Build the secret for a known draw (used by tests and fixtures).
    pub fn from_bytes(bytes: [u8; SECRET_LEN]) -> Self {
        Self(to_hex(&bytes))
    }

    /// The secret text as revealed at crash.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Bytes fed to SHA-256 and used as the HMAC key.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Commitment hash for this secret.
    pub fn commitment(&self) -> CommitmentHash {
        CommitmentHash(sha256(self.as_bytes()))
    }
}

impl fmt::Debug for RoundSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RoundSecret(<redacted>)")
    }
}

/// Published SHA-256 of a round secret.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommitmentHash(pub Digest32);

impl CommitmentHash {
    /// Parse from the hex form clients receive.
    pub fn from_hex(s: &str) -> Option<Self> {
        digest_from_hex(s).map(Self)
    }

    /// Hex form sent to clients.
    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &Digest32 {
        &self.0
    }
}

impl fmt::Debug for CommitmentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitmentHash({})", self.to_hex())
    }
}

impl fmt::Display for CommitmentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for CommitmentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CommitmentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        CommitmentHash::from_hex(&s)
            .ok_or_else(|| serde::de::Error::custom("commitment hash must be 64 hex characters"))
    }
}

/// Errors raised while generating a commitment.
#[derive(Debug, Error)]
pub enum FairnessError {
    /// The OS random source failed. The round must not start.
    #[error("entropy source unavailable: {0}")]
    EntropyUnavailable(#[from] rand::Error),
}

/// Generate a fresh secret and its commitment from the OS CSPRNG.
///
/// Call exactly once per round, before the hash is shown to anyone.
/// There is deliberately no fallback RNG: failure halts the round.
pub fn new_round_secret() -> Result<(RoundSecret, CommitmentHash), FairnessError> {
    new_round_secret_from(&mut OsRng)
}

/// Generate a secret from an explicit cryptographic RNG.
pub fn new_round_secret_from<R>(rng: &mut R) -> Result<(RoundSecret, CommitmentHash), FairnessError>
where
    R: RngCore + CryptoRng,
{
    let mut bytes = [0u8; SECRET_LEN];
    rng.try_fill_bytes(&mut bytes)?;
    let secret = RoundSecret::from_bytes(bytes);
    let hash = secret.commitment();
    Ok((secret, hash))
}

/// Recompute `SHA-256(secret)` and compare against a commitment.
pub fn verify(secret: &[u8], commitment: &CommitmentHash) -> bool {
    digests_equal(&sha256(secret), commitment.as_bytes())
}
