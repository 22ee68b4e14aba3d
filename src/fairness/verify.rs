//! Verification API
//!
//! The procedure any participant runs after a crash:
//!
//! 1. `SHA-256(revealed_secret)` must equal the commitment hash published
//!    while the round was waiting.
//! 2. `compute_crash_multiplier(revealed_secret, sequence_number)` must equal
//!    the announced crash multiplier within [`MULTIPLIER_TOLERANCE`].
//!
//! A failure here is never a user error. It means the server produced an
//! inconsistent round and must be treated as a correctness defect.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::commitment::{verify as verify_commitment, CommitmentHash};
use super::oracle::compute_crash_multiplier;

/// Allowed drift between the announced and recomputed multiplier.
pub const MULTIPLIER_TOLERANCE: f64 = 0.01;

/// Everything a verifier needs about one finished round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundReveal {
    /// Round sequence number.
    pub sequence_number: u64,
    /// Hash published at the start of the waiting phase.
    pub commitment_hash: CommitmentHash,
    /// Secret revealed at crash, hashed and keyed exactly as written.
    pub revealed_secret: String,
    /// Multiplier announced at crash.
    pub crash_multiplier: f64,
}

/// Verification outcome for a successful check.
#[derive(Clone, Debug, PartialEq)]
pub struct VerificationReport {
    /// Multiplier recomputed from the revealed secret.
    pub recomputed_multiplier: f64,
    /// Absolute difference from the announced multiplier.
    pub drift: f64,
}

/// Errors that can occur during verification.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VerificationError {
    /// No secret was revealed.
    #[error("revealed secret is empty")]
    EmptySecret,

    /// `SHA-256(secret)` differs from the published commitment.
    #[error("commitment mismatch: SHA-256 of revealed secret is {computed}, published {published}")]
    CommitmentMismatch {
        /// Hash recomputed from the secret.
        computed: String,
        /// Hash published before the round.
        published: String,
    },

    /// Recomputed multiplier differs from the announced one.
    #[error("crash multiplier mismatch: announced {announced}, recomputed {recomputed}")]
    MultiplierMismatch {
        /// Multiplier announced at crash.
        announced: f64,
        /// Multiplier recomputed from the secret.
        recomputed: f64,
    },
}

impl RoundReveal {
    /// Run the full verification procedure.
    pub fn verify(&self) -> Result<VerificationReport, VerificationError> {
        let secret = self.revealed_secret.trim();
        if secret.is_empty() {
            return Err(VerificationError::EmptySecret);
        }
        verify_round(secret.as_bytes(), self.sequence_number, &self.commitment_hash, self.crash_multiplier)
    }
}

/// Verify a round from the revealed secret's bytes.
pub fn verify_round(
    secret: &[u8],
    sequence_number: u64,
    commitment: &CommitmentHash,
    announced_multiplier: f64,
) -> Result<VerificationReport, VerificationError> {
    if !verify_commitment(secret, commitment) {
        return Err(VerificationError::CommitmentMismatch {
            computed: hex::encode(crate::core::hash::sha256(secret)),
            published: commitment.to_hex(),
        });
    }

    let recomputed = compute_crash_multiplier(secret, sequence_number);
    let drift = (recomputed - announced_multiplier).abs();
    if drift.is_nan() || drift > MULTIPLIER_TOLERANCE {
        return Err(VerificationError::MultiplierMismatch {
            announced: announced_multiplier,
            recomputed,
        });
    }

    Ok(VerificationReport {
        recomputed_multiplier: recomputed,
        drift,
    })
}
