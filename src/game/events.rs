//! Round Events
//!
//! Outbound events produced by the state machine. Each transition returns
//! the events it caused, in emission order; the network shell turns them
//! into wire messages and fans them out.

use serde::Serialize;

use crate::core::money::Amount;
use crate::fairness::commitment::CommitmentHash;
use crate::game::participant::ParticipantId;
use crate::game::round::RoundPhase;
use crate::game::settlement::LeaderboardEntry;

/// Who an event is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every connected participant.
    All,
    /// A single participant.
    Participant(ParticipantId),
}

/// State sent to a participant on connect and on `syncRequest`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    /// Current phase.
    pub phase: RoundPhase,
    /// Current round.
    pub sequence_number: u64,
    /// Seconds left in the countdown (0 outside Waiting).
    pub countdown: u32,
    /// Current multiplier.
    pub current_multiplier: f64,
    /// Commitment for the current round.
    pub commitment_hash: CommitmentHash,
    /// Recipient's balance.
    pub balance: Amount,
    /// Recipient's display name, if set.
    pub name: Option<String>,
    /// Recent crash multipliers, oldest first.
    pub recent_outcomes: Vec<f64>,
    /// Recipient's wager this round, if any.
    pub active_bet: Option<Amount>,
}

/// Event emitted by the round core.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundEvent {
    /// Entered Waiting with a fresh commitment.
    WaitingPhase {
        sequence_number: u64,
        countdown_remaining: u32,
        commitment_hash: CommitmentHash,
    },

    /// One second of countdown elapsed.
    CountdownUpdate { countdown_remaining: u32 },

    /// Entered Running.
    GameStarted { sequence_number: u64 },

    /// Multiplier advanced.
    MultiplierUpdate { current_multiplier: f64 },

    /// Entered Crashed; secret revealed.
    GameCrashed {
        sequence_number: u64,
        crash_multiplier: f64,
        revealed_secret: String,
    },

    /// Leaderboard for the current round.
    LeaderboardUpdate { entries: Vec<LeaderboardEntry> },

    /// Recent crash multipliers, oldest first.
    RecentOutcomesUpdate { outcomes: Vec<f64> },

    /// A participant's balance changed.
    BalanceUpdate { participant: ParticipantId, balance: Amount },

    /// A participant's profile changed.
    UserUpdate {
        participant: ParticipantId,
        balance: Amount,
        name: Option<String>,
    },

    /// A bet was accepted.
    BetPlaced { participant: ParticipantId, name: String, amount: Amount },

    /// Cash-out receipt for the participant who cashed out.
    CashOutSuccess {
        participant: ParticipantId,
        multiplier: f64,
        winnings: Amount,
    },

    /// Someone cashed out.
    PlayerCashedOut { participant: ParticipantId, name: String, multiplier: f64 },

    /// Full state for one participant.
    Snapshot { participant: ParticipantId, snapshot: GameSnapshot },
}

impl RoundEvent {
    /// Who should receive this event.
    pub fn recipient(&self) -> Recipient {
        match self {
            RoundEvent::BalanceUpdate { participant, .. }
            | RoundEvent::UserUpdate { participant, .. }
            | RoundEvent::CashOutSuccess { participant, .. }
            | RoundEvent::Snapshot { participant, .. } => Recipient::Participant(*participant),
            _ => Recipient::All,
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            RoundEvent::WaitingPhase { .. } => "waitingPhase",
            RoundEvent::CountdownUpdate { .. } => "countdownUpdate",
            RoundEvent::GameStarted { .. } => "gameStarted",
            RoundEvent::MultiplierUpdate { .. } => "multiplierUpdate",
            RoundEvent::GameCrashed { .. } => "gameCrashed",
            RoundEvent::LeaderboardUpdate { .. } => "leaderboardUpdate",
            RoundEvent::RecentOutcomesUpdate { .. } => "recentOutcomesUpdate",
            RoundEvent::BalanceUpdate { .. } => "balanceUpdate",
            RoundEvent::UserUpdate { .. } => "userUpdate",
            RoundEvent::BetPlaced { .. } => "betPlaced",
            RoundEvent::CashOutSuccess { .. } => "cashOutSuccess",
            RoundEvent::PlayerCashedOut { .. } => "playerCashedOut",
            RoundEvent::Snapshot { .. } => "gameUpdate",
        }
    }
}
