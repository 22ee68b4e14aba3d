//! Game Logic Module
//!
//! The authoritative round core. Synchronous and free of I/O; time only
//! enters through `RoundStateMachine::on_timer`.
//!
//! ## Module Structure
//!
//! - `round`: Round record and phase transitions
//! - `participant`: Balances, names, connection state
//! - `ledger`: Bets for the current round
//! - `settlement`: Leaderboard at crash
//! - `history`: Recent crash outcomes
//! - `events`: Outbound events and their recipients
//! - `machine`: Phase gating and orchestration

pub mod round;
pub mod participant;
pub mod ledger;
pub mod settlement;
pub mod history;
pub mod events;
pub mod machine;

// Re-export key types
pub use round::{Round, RoundPhase, RoundError};
pub use participant::{Participant, ParticipantId, ParticipantRegistry, NameError};
pub use ledger::{Bet, BetLedger, BetError, CashOutError};
pub use settlement::{LeaderboardEntry, BetOutcome};
pub use history::{RecentOutcomes, RoundOutcome};
pub use events::{RoundEvent, Recipient, GameSnapshot};
pub use machine::{GameConfig, RoundStateMachine, SecretSource, TimerOutcome};
