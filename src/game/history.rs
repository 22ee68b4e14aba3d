//! Recent Outcomes
//!
//! Bounded FIFO of finished rounds. Clients get the multipliers; the full
//! reveal is kept so the last few rounds can be re-verified on demand.

use std::collections::VecDeque;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::fairness::commitment::CommitmentHash;
use crate::fairness::verify::RoundReveal;

/// A finished round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundOutcome {
    /// Round sequence number.
    pub sequence_number: u64,
    /// Crash multiplier.
    pub crash_multiplier: f64,
    /// Commitment published during waiting.
    pub commitment_hash: CommitmentHash,
    /// Secret revealed at crash (hex).
    pub revealed_secret: String,
    /// Wall-clock crash time.
    pub crashed_at: DateTime<Utc>,
}

impl RoundOutcome {
    /// Verification input for this round.
    pub fn to_reveal(&self) -> RoundReveal {
        RoundReveal {
            sequence_number: self.sequence_number,
            commitment_hash: self.commitment_hash,
            revealed_secret: self.revealed_secret.clone(),
            crash_multiplier: self.crash_multiplier,
        }
    }
}

/// Last N round outcomes, oldest first.
#[derive(Debug, Clone)]
pub struct RecentOutcomes {
    outcomes: VecDeque<RoundOutcome>,
    capacity: usize,
}

impl RecentOutcomes {
    /// Create an empty window holding at most `capacity` outcomes.
    pub fn new(capacity: usize) -> Self {
        Self {
            outcomes: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an outcome, evicting the oldest beyond capacity.
    pub fn record(&mut self, outcome: RoundOutcome) {
        if self.capacity == 0 {
            return;
        }
        while self.outcomes.len() >= self.capacity {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(outcome);
    }

    /// Crash multipliers, oldest first.
    pub fn snapshot(&self) -> Vec<f64> {
        self.outcomes.iter().map(|o| o.crash_multiplier).collect()
    }

    /// Full outcomes, oldest first.
    pub fn outcomes(&self) -> impl Iterator<Item = &RoundOutcome> {
        self.outcomes.iter()
    }

    /// Outcome for a given round, if still in the window.
    pub fn find(&self, sequence_number: u64) -> Option<&RoundOutcome> {
        self.outcomes.iter().find(|o| o.sequence_number == sequence_number)
    }

    /// Number of outcomes held.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Is the window empty?
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Maximum number of outcomes held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
