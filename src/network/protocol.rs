//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every message is a JSON object with a `type` tag.

use serde::{Serialize, Deserialize};

use crate::core::money::Amount;
use crate::fairness::commitment::CommitmentHash;
use crate::game::events::{GameSnapshot, RoundEvent};
use crate::game::ledger::{BetError, CashOutError};
use crate::game::participant::{NameError, ParticipantId};
use crate::game::settlement::LeaderboardEntry;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Choose a display name (once per connection).
    SetName { name: String },

    /// Wager on the upcoming round.
    PlaceBet { amount: f64 },

    /// Cash out the active bet at the current multiplier.
    CashOut,

    /// Request the current state again.
    SyncRequest,

    /// Ping for latency measurement.
    Ping { timestamp: u64 },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Full state for this client.
    GameUpdate(GameSnapshot),

    /// New round accepting bets.
    #[serde(rename_all = "camelCase")]
    WaitingPhase {
        sequence_number: u64,
        countdown_remaining: u32,
        commitment_hash: CommitmentHash,
    },

    /// Countdown tick.
    #[serde(rename_all = "camelCase")]
    CountdownUpdate { countdown_remaining: u32 },

    /// Multiplier started climbing.
    #[serde(rename_all = "camelCase")]
    GameStarted { sequence_number: u64 },

    /// Multiplier tick.
    #[serde(rename_all = "camelCase")]
    MultiplierUpdate { current_multiplier: f64 },

    /// Round crashed; secret revealed for verification.
    #[serde(rename_all = "camelCase")]
    GameCrashed {
        sequence_number: u64,
        crash_multiplier: f64,
        revealed_secret: String,
    },

    /// Leaderboard for the current round.
    LeaderboardUpdate { leaderboard: Vec<LeaderboardEntry> },

    /// Recent crash multipliers, oldest first.
    #[serde(rename_all = "camelCase")]
    RecentOutcomesUpdate { recent_outcomes: Vec<f64> },

    /// This client's balance.
    BalanceUpdate { balance: Amount },

    /// This client's profile.
    UserUpdate { balance: Amount, name: Option<String> },

    /// Someone placed a bet.
    BetPlaced { participant: ParticipantId, name: String, amount: Amount },

    /// This client's cash-out went through.
    CashOutSuccess { multiplier: f64, winnings: Amount },

    /// Someone cashed out.
    PlayerCashedOut { participant: ParticipantId, name: String, multiplier: f64 },

    /// Request refused.
    Rejected(ServerError),

    /// Pong response.
    #[serde(rename_all = "camelCase")]
    Pong { timestamp: u64, server_time: u64 },

    /// Server is shutting down.
    Shutdown { reason: String },
}

impl From<RoundEvent> for ServerMessage {
    fn from(event: RoundEvent) -> Self {
        match event {
            RoundEvent::WaitingPhase { sequence_number, countdown_remaining, commitment_hash } => {
                ServerMessage::WaitingPhase { sequence_number, countdown_remaining, commitment_hash }
            }
            RoundEvent::CountdownUpdate { countdown_remaining } => {
                ServerMessage::CountdownUpdate { countdown_remaining }
            }
            RoundEvent::GameStarted { sequence_number } => ServerMessage::GameStarted { sequence_number },
            RoundEvent::MultiplierUpdate { current_multiplier } => {
                ServerMessage::MultiplierUpdate { current_multiplier }
            }
            RoundEvent::GameCrashed { sequence_number, crash_multiplier, revealed_secret } => {
                ServerMessage::GameCrashed { sequence_number, crash_multiplier, revealed_secret }
            }
            RoundEvent::LeaderboardUpdate { entries } => ServerMessage::LeaderboardUpdate { leaderboard: entries },
            RoundEvent::RecentOutcomesUpdate { outcomes } => {
                ServerMessage::RecentOutcomesUpdate { recent_outcomes: outcomes }
            }
            RoundEvent::BalanceUpdate { balance, .. } => ServerMessage::BalanceUpdate { balance },
            RoundEvent::UserUpdate { balance, name, .. } => ServerMessage::UserUpdate { balance, name },
            RoundEvent::BetPlaced { participant, name, amount } => {
                ServerMessage::BetPlaced { participant, name, amount }
            }
            RoundEvent::CashOutSuccess { multiplier, winnings, .. } => {
                ServerMessage::CashOutSuccess { multiplier, winnings }
            }
            RoundEvent::PlayerCashedOut { participant, name, multiplier } => {
                ServerMessage::PlayerCashedOut { participant, name, multiplier }
            }
            RoundEvent::Snapshot { snapshot, .. } => ServerMessage::GameUpdate(snapshot),
        }
    }
}

/// Rejection sent back to the requesting client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ServerError {
    /// Create a rejection.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Action not allowed in the current phase.
    WrongPhase,
    /// Already bet this round.
    DuplicateBet,
    /// Wager not a positive amount.
    InvalidAmount,
    /// Wager exceeds balance.
    InsufficientBalance,
    /// Nothing to cash out.
    NoActiveBet,
    /// Bet already cashed out.
    AlreadyCashedOut,
    /// Name must be set before betting.
    NameRequired,
    /// Name rejected.
    InvalidName,
    /// Malformed or unknown request.
    InvalidInput,
    /// Server at connection capacity.
    ServerOverloaded,
}

impl From<BetError> for ServerError {
    fn from(e: BetError) -> Self {
        let code = match e {
            BetError::WrongPhase => ErrorCode::WrongPhase,
            BetError::DuplicateBet => ErrorCode::DuplicateBet,
            BetError::InvalidAmount => ErrorCode::InvalidAmount,
            BetError::InsufficientBalance => ErrorCode::InsufficientBalance,
            BetError::NameRequired => ErrorCode::NameRequired,
            BetError::UnknownParticipant => ErrorCode::InvalidInput,
        };
        ServerError::new(code, e.to_string())
    }
}

impl From<CashOutError> for ServerError {
    fn from(e: CashOutError) -> Self {
        let code = match e {
            CashOutError::WrongPhase => ErrorCode::WrongPhase,
            CashOutError::NoActiveBet => ErrorCode::NoActiveBet,
            CashOutError::AlreadyCashedOut => ErrorCode::AlreadyCashedOut,
            CashOutError::UnknownParticipant => ErrorCode::InvalidInput,
        };
        ServerError::new(code, e.to_string())
    }
}

impl From<NameError> for ServerError {
    fn from(e: NameError) -> Self {
        let code = match e {
            NameError::UnknownParticipant => ErrorCode::InvalidInput,
            NameError::Empty | NameError::TooLong | NameError::AlreadySet => ErrorCode::InvalidName,
        };
        ServerError::new(code, e.to_string())
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
