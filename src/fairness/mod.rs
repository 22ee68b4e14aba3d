//! Provable Fairness
//!
//! Commit-reveal for crash points:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    FAIRNESS                                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  commitment.rs - Per-round secret + SHA-256 commitment      │
//! │  oracle.rs     - HMAC-SHA256 crash multiplier in [1, 10)    │
//! │  verify.rs     - Reveal verification for any third party    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod commitment;
pub mod oracle;
pub mod verify;

// Re-export key types
pub use commitment::{
    new_round_secret, new_round_secret_from, CommitmentHash, FairnessError, RoundSecret,
};
pub use oracle::{compute_crash_multiplier, MAX_CRASH_MULTIPLIER, MIN_CRASH_MULTIPLIER};
pub use verify::{verify_round, RoundReveal, VerificationError, VerificationReport};
