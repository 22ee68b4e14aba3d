//! # Crash Round Server
//!
//! Provably-fair crash game rounds over WebSocket.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CRASH ROUND SERVER                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Pure primitives                          │
//! │  ├── hash.rs     - SHA-256 and hex helpers                  │
//! │  └── money.rs    - Fixed-point amounts and payouts          │
//! │                                                             │
//! │  fairness/       - Commit-reveal                            │
//! │  ├── commitment.rs - Round secret + SHA-256 commitment      │
//! │  ├── oracle.rs   - HMAC-SHA256 crash multiplier             │
//! │  └── verify.rs   - Third-party verification                 │
//! │                                                             │
//! │  game/           - Round core (synchronous, no I/O)         │
//! │  ├── round.rs    - Round record and transitions             │
//! │  ├── participant.rs - Balances and names                    │
//! │  ├── ledger.rs   - Bets for the current round               │
//! │  ├── settlement.rs - Leaderboard at crash                   │
//! │  ├── history.rs  - Last 10 outcomes                         │
//! │  ├── events.rs   - Outbound events                          │
//! │  └── machine.rs  - Phase gating and orchestration           │
//! │                                                             │
//! │  network/        - Networking (non-deterministic)           │
//! │  ├── protocol.rs - JSON message types                       │
//! │  ├── engine.rs   - Single-writer actor + phase timer        │
//! │  └── server.rs   - WebSocket server                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Fairness Guarantee
//!
//! Before a round accepts bets the server publishes `SHA-256(secret)`.
//! The crash multiplier is `HMAC-SHA256(secret, sequence_number)` mapped
//! into `[1, 10)`. After the crash the secret is revealed, and anyone can
//! recompute both values with [`fairness::verify_round`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod fairness;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::money::Amount;
pub use fairness::{compute_crash_multiplier, verify_round, CommitmentHash, RoundReveal, RoundSecret};
pub use game::{GameConfig, ParticipantId, RoundPhase, RoundStateMachine};
pub use network::{GameServer, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Countdown before each round (seconds)
pub const COUNTDOWN_SECS: u32 = 10;

/// Number of past crash multipliers kept
pub const RECENT_OUTCOMES: usize = 10;
