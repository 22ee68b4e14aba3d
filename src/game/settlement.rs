//! Settlement
//!
//! Builds the leaderboard from the ledger at crash time. Balances were
//! already adjusted at placement and cash-out, so nothing is paid here:
//!
//! - cashed out: `result = cash-out multiplier`, `money = winnings`
//! - still riding at crash: `result = CRASHED`, `money = 0`

use serde::{Serialize, Serializer};

use crate::core::money::Amount;
use crate::game::ledger::{Bet, BetLedger};
use crate::game::participant::{ParticipantId, ParticipantRegistry, ANONYMOUS_NAME};

/// Label used for bets lost to the crash.
pub const CRASHED_LABEL: &str = "CRASHED";

/// How a bet ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BetOutcome {
    /// Cashed out at this multiplier.
    CashedOut(f64),
    /// Lost to the crash.
    Crashed,
}

impl BetOutcome {
    /// Outcome of a bet as seen at crash time.
    pub fn of(bet: &Bet) -> Self {
        match bet.cash_out_multiplier {
            Some(m) => BetOutcome::CashedOut(m),
            None => BetOutcome::Crashed,
        }
    }

    /// Display label, e.g. `2.50x` or `CRASHED`.
    pub fn label(&self) -> String {
        match self {
            BetOutcome::CashedOut(m) => format!("{:.2}x", m),
            BetOutcome::Crashed => CRASHED_LABEL.to_string(),
        }
    }
}

impl Serialize for BetOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    /// Participant who placed the bet.
    #[serde(skip)]
    pub participant: ParticipantId,
    /// Display name.
    pub name: String,
    /// Outcome label.
    pub result: BetOutcome,
    /// Amount won (0 for crashed bets).
    pub money: Amount,
}

/// Full leaderboard for a crashed round: every bet in the ledger.
///
/// Winners first by money, then crashed bets; ties keep participant order.
pub fn settle(ledger: &BetLedger, participants: &ParticipantRegistry) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = ledger.iter()
        .map(|(id, bet)| entry_for(id, bet, participants))
        .collect();
    rank(&mut entries);
    entries
}

/// Leaderboard while the round is still running: cashed-out bets only.
pub fn live_leaderboard(ledger: &BetLedger, participants: &ParticipantRegistry) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = ledger.iter()
        .filter(|(_, bet)| bet.is_cashed_out())
        .map(|(id, bet)| entry_for(id, bet, participants))
        .collect();
    rank(&mut entries);
    entries
}

fn entry_for(id: &ParticipantId, bet: &Bet, participants: &ParticipantRegistry) -> LeaderboardEntry {
    let name = participants.get(id)
        .map(|p| p.leaderboard_name().to_string())
        .unwrap_or_else(|| ANONYMOUS_NAME.to_string());

    LeaderboardEntry {
        participant: *id,
        name,
        result: BetOutcome::of(bet),
        money: bet.winnings.unwrap_or(Amount::ZERO),
    }
}

fn rank(entries: &mut [LeaderboardEntry]) {
    // stable sort: equal money keeps ledger (participant id) order
    entries.sort_by(|a, b| b.money.cmp(&a.money));
}
