//! Bet Ledger
//!
//! Active wagers for the current round only. Cleared on every entry into
//! the waiting phase.
//!
//! Money moves immediately: the wager is debited at placement and winnings
//! are credited at cash-out. Settlement only reads the ledger.

use std::collections::BTreeMap;
use thiserror::Error;

use crate::core::money::Amount;
use crate::game::participant::{Participant, ParticipantId};

/// A single participant's wager for this round.
#[derive(Debug, Clone, PartialEq)]
pub struct Bet {
    /// Amount debited at placement.
    pub wager: Amount,
    /// Multiplier at cash-out, `None` while the bet is still riding.
    pub cash_out_multiplier: Option<f64>,
    /// Amount credited at cash-out.
    pub winnings: Option<Amount>,
}

impl Bet {
    fn new(wager: Amount) -> Self {
        Self {
            wager,
            cash_out_multiplier: None,
            winnings: None,
        }
    }

    /// Has this bet been cashed out?
    pub fn is_cashed_out(&self) -> bool {
        self.cash_out_multiplier.is_some()
    }
}

/// Result of a successful cash-out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CashOutReceipt {
    /// Multiplier locked in.
    pub multiplier: f64,
    /// Amount credited.
    pub winnings: Amount,
    /// Balance after the credit.
    pub balance: Amount,
}

/// Rejected bet placement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BetError {
    /// Bets are only accepted while the round is waiting.
    #[error("bets are only accepted during the countdown")]
    WrongPhase,

    /// Participant already has a bet this round.
    #[error("already placed a bet this round")]
    DuplicateBet,

    /// Wager is zero, negative or not a number.
    #[error("wager must be a positive amount")]
    InvalidAmount,

    /// Wager exceeds balance.
    #[error("insufficient balance")]
    InsufficientBalance,

    /// Display name must be set first.
    #[error("set a name before betting")]
    NameRequired,

    /// No such participant.
    #[error("unknown participant")]
    UnknownParticipant,
}

/// Rejected cash-out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CashOutError {
    /// Cash-out only while the multiplier is running.
    #[error("cash-out is only possible while the round is running")]
    WrongPhase,

    /// Participant has no bet this round.
    #[error("no active bet")]
    NoActiveBet,

    /// Bet was already cashed out.
    #[error("already cashed out")]
    AlreadyCashedOut,

    /// No such participant.
    #[error("unknown participant")]
    UnknownParticipant,
}

/// Active bets keyed by participant.
#[derive(Debug, Default)]
pub struct BetLedger {
    bets: BTreeMap<ParticipantId, Bet>,
}

impl BetLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a bet, debiting the participant immediately.
    ///
    /// At most one bet per participant per round; a second call is
    /// rejected without touching the balance.
    pub fn place(&mut self, participant: &mut Participant, wager: Amount) -> Result<&Bet, BetError> {
        if wager.is_zero() {
            return Err(BetError::InvalidAmount);
        }
        if self.bets.contains_key(&participant.id) {
            return Err(BetError::DuplicateBet);
        }

        participant.balance = participant.balance
            .checked_sub(wager)
            .ok_or(BetError::InsufficientBalance)?;

        Ok(self.bets.entry(participant.id).or_insert_with(|| Bet::new(wager)))
    }

    /// Cash out at `multiplier`, crediting winnings immediately.
    pub fn cash_out(
        &mut self,
        participant: &mut Participant,
        multiplier: f64,
    ) -> Result<CashOutReceipt, CashOutError> {
        let bet = self.bets.get_mut(&participant.id).ok_or(CashOutError::NoActiveBet)?;
        if bet.is_cashed_out() {
            return Err(CashOutError::AlreadyCashedOut);
        }

        let winnings = bet.wager.payout(multiplier);
        bet.cash_out_multiplier = Some(multiplier);
        bet.winnings = Some(winnings);
        participant.balance = participant.balance.saturating_add(winnings);

        Ok(CashOutReceipt {
            multiplier,
            winnings,
            balance: participant.balance,
        })
    }

    /// Drop every bet. Called when a new round begins.
    pub fn clear(&mut self) {
        self.bets.clear();
    }

    /// Get a participant's bet.
    pub fn get(&self, id: &ParticipantId) -> Option<&Bet> {
        self.bets.get(id)
    }

    /// Does the participant have a bet this round?
    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.bets.contains_key(id)
    }

    /// Number of bets.
    pub fn len(&self) -> usize {
        self.bets.len()
    }

    /// Is the ledger empty?
    pub fn is_empty(&self) -> bool {
        self.bets.is_empty()
    }

    /// Iterate bets in participant order.
    pub fn iter(&self) -> impl Iterator<Item = (&ParticipantId, &Bet)> {
        self.bets.iter()
    }
}
