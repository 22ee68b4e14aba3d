//! Round Record
//!
//! The single mutable round and its phase transitions.
//!
//! ```text
//!            countdown hits 0            multiplier >= crash
//!  Waiting ─────────────────▶ Running ─────────────────────▶ Crashed
//!     ▲                                                         │
//!     └────────────── new Round (next sequence number) ─────────┘
//! ```
//!
//! A `Round` is created on entry to Waiting and discarded on the next
//! Waiting entry; it never moves backwards. The crash multiplier is derived
//! exactly once, on the Waiting → Running edge.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::fairness::commitment::{CommitmentHash, RoundSecret};
use crate::fairness::oracle::compute_crash_multiplier;
use crate::fairness::verify::RoundReveal;

/// Starting value of the running multiplier.
pub const START_MULTIPLIER: f64 = 1.0;

/// Round phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// Accepting bets, counting down.
    Waiting,
    /// Multiplier climbing, cash-outs accepted.
    Running,
    /// Round over, secret revealed.
    Crashed,
}

/// Result of one multiplier tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MultiplierTick {
    /// Still running at this multiplier.
    Climbing(f64),
    /// Reached the crash point; multiplier frozen at this value.
    Crashed(f64),
}

/// Illegal transition attempts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoundError {
    /// Operation not valid in the current phase.
    #[error("expected phase {expected:?}, round is {actual:?}")]
    WrongPhase {
        /// Phase the operation requires.
        expected: RoundPhase,
        /// Phase the round is in.
        actual: RoundPhase,
    },

    /// Tried to start running before the countdown finished.
    #[error("countdown still has {0}s remaining")]
    CountdownNotFinished(u32),
}

/// The current round.
#[derive(Debug, Clone)]
pub struct Round {
    sequence_number: u64,
    phase: RoundPhase,
    secret: RoundSecret,
    commitment_hash: CommitmentHash,
    crash_multiplier: Option<f64>,
    current_multiplier: f64,
    countdown_remaining: u32,
    ticks: u64,
}

impl Round {
    /// Create a round in the waiting phase.
    ///
    /// `commitment_hash` must be `SHA-256(secret)`; it is what clients see.
    pub fn new(
        sequence_number: u64,
        secret: RoundSecret,
        commitment_hash: CommitmentHash,
        countdown_secs: u32,
    ) -> Self {
        debug_assert_eq!(secret.commitment(), commitment_hash);

        Self {
            sequence_number,
            phase: RoundPhase::Waiting,
            secret,
            commitment_hash,
            crash_multiplier: None,
            current_multiplier: START_MULTIPLIER,
            countdown_remaining: countdown_secs,
            ticks: 0,
        }
    }

    /// Decrement the countdown by one second. Returns the remaining count.
    pub fn countdown_tick(&mut self) -> Result<u32, RoundError> {
        self.expect_phase(RoundPhase::Waiting)?;
        self.countdown_remaining = self.countdown_remaining.saturating_sub(1);
        Ok(self.countdown_remaining)
    }

    /// Waiting → Running. Derives the crash multiplier from the committed
    /// secret. Returns the (still private) crash multiplier.
    pub fn start_running(&mut self) -> Result<f64, RoundError> {
        self.expect_phase(RoundPhase::Waiting)?;
        if self.countdown_remaining > 0 {
            return Err(RoundError::CountdownNotFinished(self.countdown_remaining));
        }

        let crash = compute_crash_multiplier(self.secret.as_bytes(), self.sequence_number);
        self.crash_multiplier = Some(crash);
        self.current_multiplier = START_MULTIPLIER;
        self.ticks = 0;
        self.phase = RoundPhase::Running;
        Ok(crash)
    }

    /// Advance the multiplier by one tick of `step`.
    ///
    /// The multiplier is computed from the tick count rather than summed, so
    /// it never drifts. Reaching the crash point freezes it at exactly the
    /// crash multiplier and moves the round to Crashed.
    pub fn advance(&mut self, step: f64) -> Result<MultiplierTick, RoundError> {
        self.expect_phase(RoundPhase::Running)?;
        let crash = match self.crash_multiplier {
            Some(crash) => crash,
            None => return Err(RoundError::WrongPhase {
                expected: RoundPhase::Running,
                actual: self.phase,
            }),
        };

        self.ticks += 1;
        let next = START_MULTIPLIER + self.ticks as f64 * step;

        if next >= crash {
            self.current_multiplier = crash;
            self.phase = RoundPhase::Crashed;
            Ok(MultiplierTick::Crashed(crash))
        } else {
            // max() keeps the sequence non-decreasing even for a zero step
            self.current_multiplier = next.max(self.current_multiplier);
            Ok(MultiplierTick::Climbing(self.current_multiplier))
        }
    }

    /// Reveal data, available only once the round has crashed.
    pub fn reveal(&self) -> Option<RoundReveal> {
        if self.phase != RoundPhase::Crashed {
            return None;
        }
        Some(RoundReveal {
            sequence_number: self.sequence_number,
            commitment_hash: self.commitment_hash,
            revealed_secret: self.secret.as_str().to_owned(),
            crash_multiplier: self.crash_multiplier?,
        })
    }

    fn expect_phase(&self, expected: RoundPhase) -> Result<(), RoundError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(RoundError::WrongPhase { expected, actual: self.phase })
        }
    }

    /// Sequence number.
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /// Current phase.
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Published commitment.
    pub fn commitment_hash(&self) -> CommitmentHash {
        self.commitment_hash
    }

    /// Current multiplier (1.0 while waiting).
    pub fn current_multiplier(&self) -> f64 {
        self.current_multiplier
    }

    /// Crash multiplier, visible to callers only after the crash.
    pub fn revealed_crash_multiplier(&self) -> Option<f64> {
        match self.phase {
            RoundPhase::Crashed => self.crash_multiplier,
            _ => None,
        }
    }

    /// Seconds left in the countdown.
    pub fn countdown_remaining(&self) -> u32 {
        self.countdown_remaining
    }

    /// Multiplier ticks since Running began.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
