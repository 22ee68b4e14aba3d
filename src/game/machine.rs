//! Round State Machine
//!
//! Owns the round, the participants, the ledger and the recent outcomes.
//! Every mutation goes through `&mut self`, so whoever holds the machine is
//! the single writer. Nothing here sleeps or does I/O: the caller drives
//! time by calling [`RoundStateMachine::on_timer`] once per
//! [`RoundStateMachine::timer_period`].
//!
//! ```text
//! on_timer()
//!   Waiting  ── countdown -1 ──▶ countdownUpdate
//!            └─ reached 0 ─────▶ countdownUpdate(0), gameStarted     → Running
//!   Running  ── climb ─────────▶ multiplierUpdate
//!            └─ >= crash ──────▶ gameCrashed, leaderboard, outcomes  → Crashed
//!   Crashed  ── delay over ────▶ waitingPhase, empty leaderboard     → Waiting
//! ```

use std::time::Duration;
use chrono::Utc;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use tracing::error;

use crate::core::money::Amount;
use crate::fairness::commitment::{new_round_secret_from, CommitmentHash, FairnessError, RoundSecret};
use crate::game::events::{GameSnapshot, RoundEvent};
use crate::game::history::{RecentOutcomes, RoundOutcome};
use crate::game::ledger::{BetError, BetLedger, CashOutError};
use crate::game::participant::{NameError, ParticipantId, ParticipantRegistry};
use crate::game::round::{MultiplierTick, Round, RoundPhase};
use crate::game::settlement::{live_leaderboard, settle};

/// Countdown cadence while waiting.
pub const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Round timing and economy settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    /// Seconds of countdown before each round runs.
    pub countdown_secs: u32,
    /// Interval between multiplier ticks.
    pub multiplier_tick: Duration,
    /// Multiplier increase per tick.
    pub multiplier_step: f64,
    /// Pause between crash and the next waiting phase.
    pub crash_delay: Duration,
    /// Balance credited to new participants.
    pub starting_balance: Amount,
    /// Number of recent outcomes kept.
    pub history_capacity: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            countdown_secs: crate::COUNTDOWN_SECS,
            multiplier_tick: Duration::from_millis(100),
            multiplier_step: 0.01,
            crash_delay: Duration::from_secs(5),
            starting_balance: Amount::from_whole(1000),
            history_capacity: crate::RECENT_OUTCOMES,
        }
    }
}

// =============================================================================
// SECRET SOURCE
// =============================================================================

/// Where round secrets come from.
pub trait SecretSource: Send {
    /// Produce a fresh secret and its commitment.
    fn next_secret(&mut self) -> Result<(RoundSecret, CommitmentHash), FairnessError>;
}

impl<R> SecretSource for R
where
    R: RngCore + CryptoRng + Send,
{
    fn next_secret(&mut self) -> Result<(RoundSecret, CommitmentHash), FairnessError> {
        new_round_secret_from(self)
    }
}

/// Events from one timer firing.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerOutcome {
    /// Events to deliver, in order.
    pub events: Vec<RoundEvent>,
    /// The phase changed, so the timer period may have changed too.
    pub phase_changed: bool,
}

// =============================================================================
// STATE MACHINE
// =============================================================================

/// The authoritative round core.
pub struct RoundStateMachine {
    config: GameConfig,
    source: Box<dyn SecretSource>,
    round: Round,
    last_sequence: u64,
    participants: ParticipantRegistry,
    ledger: BetLedger,
    history: RecentOutcomes,
}

impl RoundStateMachine {
    /// Start the first round using the OS random source.
    pub fn new(config: GameConfig) -> Result<(Self, Vec<RoundEvent>), FairnessError> {
        Self::new_with_source(config, Box::new(OsRng))
    }

    /// Start the first round with an explicit secret source.
    pub fn new_with_source(
        config: GameConfig,
        mut source: Box<dyn SecretSource>,
    ) -> Result<(Self, Vec<RoundEvent>), FairnessError> {
        let (secret, commitment_hash) = source.next_secret()?;
        let round = Round::new(1, secret, commitment_hash, config.countdown_secs);

        let machine = Self {
            participants: ParticipantRegistry::new(config.starting_balance),
            ledger: BetLedger::new(),
            history: RecentOutcomes::new(config.history_capacity),
            last_sequence: 1,
            round,
            source,
            config,
        };
        let events = machine.waiting_events();
        Ok((machine, events))
    }

    /// How long until the next [`on_timer`](Self::on_timer) call.
    pub fn timer_period(&self) -> Duration {
        match self.round.phase() {
            RoundPhase::Waiting => COUNTDOWN_TICK,
            RoundPhase::Running => self.config.multiplier_tick,
            RoundPhase::Crashed => self.config.crash_delay,
        }
    }

    /// Advance the current phase by one timer firing.
    ///
    /// Fails only when a new round cannot get a secret. The machine then
    /// stays in Crashed and must not be driven further.
    pub fn on_timer(&mut self) -> Result<TimerOutcome, FairnessError> {
        match self.round.phase() {
            RoundPhase::Waiting => Ok(self.countdown()),
            RoundPhase::Running => Ok(self.climb()),
            RoundPhase::Crashed => {
                let events = self.begin_waiting()?;
                Ok(TimerOutcome { events, phase_changed: true })
            }
        }
    }

    fn countdown(&mut self) -> TimerOutcome {
        let mut events = Vec::new();

        if self.round.countdown_remaining() > 0 {
            if let Ok(remaining) = self.round.countdown_tick() {
                events.push(RoundEvent::CountdownUpdate { countdown_remaining: remaining });
            }
        }

        let phase_changed = self.round.countdown_remaining() == 0 && self.round.start_running().is_ok();
        if phase_changed {
            events.push(RoundEvent::GameStarted { sequence_number: self.round.sequence_number() });
        }

        TimerOutcome { events, phase_changed }
    }

    fn climb(&mut self) -> TimerOutcome {
        match self.round.advance(self.config.multiplier_step) {
            Ok(MultiplierTick::Climbing(current_multiplier)) => TimerOutcome {
                events: vec![RoundEvent::MultiplierUpdate { current_multiplier }],
                phase_changed: false,
            },
            Ok(MultiplierTick::Crashed(crash_multiplier)) => TimerOutcome {
                events: self.crash(crash_multiplier),
                phase_changed: true,
            },
            Err(_) => TimerOutcome { events: Vec::new(), phase_changed: false },
        }
    }

    /// Settle, reveal and record the round that just crashed.
    fn crash(&mut self, crash_multiplier: f64) -> Vec<RoundEvent> {
        let leaderboard = settle(&self.ledger, &self.participants);

        let mut events = Vec::with_capacity(3);
        if let Some(reveal) = self.round.reveal() {
            if let Err(e) = reveal.verify() {
                error!(
                    sequence = reveal.sequence_number,
                    error = %e,
                    "revealed round failed its own verification"
                );
            }

            self.history.record(RoundOutcome {
                sequence_number: reveal.sequence_number,
                crash_multiplier,
                commitment_hash: reveal.commitment_hash,
                revealed_secret: reveal.revealed_secret.clone(),
                crashed_at: Utc::now(),
            });

            events.push(RoundEvent::GameCrashed {
                sequence_number: reveal.sequence_number,
                crash_multiplier,
                revealed_secret: reveal.revealed_secret,
            });
        }
        events.push(RoundEvent::LeaderboardUpdate { entries: leaderboard });
        events.push(RoundEvent::RecentOutcomesUpdate { outcomes: self.history.snapshot() });

        // every bet is settled now; departed participants can go
        self.participants.prune_disconnected(|_| false);

        events
    }

    /// Crashed → Waiting with a fresh commitment.
    ///
    /// The secret is drawn before anything changes, so a failed draw leaves
    /// the previous round untouched and no sequence number is consumed.
    fn begin_waiting(&mut self) -> Result<Vec<RoundEvent>, FairnessError> {
        let (secret, commitment_hash) = self.source.next_secret()?;

        self.last_sequence += 1;
        self.round = Round::new(self.last_sequence, secret, commitment_hash, self.config.countdown_secs);
        self.ledger.clear();
        self.participants.prune_disconnected(|_| false);

        Ok(self.waiting_events())
    }

    fn waiting_events(&self) -> Vec<RoundEvent> {
        vec![
            RoundEvent::WaitingPhase {
                sequence_number: self.round.sequence_number(),
                countdown_remaining: self.round.countdown_remaining(),
                commitment_hash: self.round.commitment_hash(),
            },
            RoundEvent::LeaderboardUpdate { entries: Vec::new() },
        ]
    }

    // =========================================================================
    // PARTICIPANT REQUESTS
    // =========================================================================

    /// Register a connection and send it the current state.
    pub fn connect(&mut self, id: ParticipantId) -> Vec<RoundEvent> {
        self.participants.register(id);
        self.snapshot_for(&id)
            .map(|snapshot| vec![RoundEvent::Snapshot { participant: id, snapshot }])
            .unwrap_or_default()
    }

    /// Detach a connection. An open bet stays and settles as a loss.
    ///
    /// Returns true if the participant was removed right away.
    pub fn disconnect(&mut self, id: &ParticipantId) -> bool {
        if !self.participants.mark_disconnected(id) {
            return false;
        }
        if self.ledger.contains(id) {
            return false;
        }
        self.participants.remove(id).is_some()
    }

    /// Set a display name.
    pub fn set_name(&mut self, id: &ParticipantId, name: &str) -> Result<Vec<RoundEvent>, NameError> {
        let participant = self.participants.set_name(id, name)?;
        Ok(vec![RoundEvent::UserUpdate {
            participant: participant.id,
            balance: participant.balance,
            name: participant.display_name.clone(),
        }])
    }

    /// Place a wager for the current round.
    ///
    /// Checked in order: phase, participant, name, amount, duplicate, balance.
    pub fn place_bet(&mut self, id: &ParticipantId, amount: f64) -> Result<Vec<RoundEvent>, BetError> {
        if self.round.phase() != RoundPhase::Waiting {
            return Err(BetError::WrongPhase);
        }

        let participant = self.participants.get_mut(id).ok_or(BetError::UnknownParticipant)?;
        let name = participant.display_name.clone().ok_or(BetError::NameRequired)?;
        let wager = Amount::from_units_exact(amount)
            .filter(|a| !a.is_zero())
            .ok_or(BetError::InvalidAmount)?;

        self.ledger.place(participant, wager)?;

        Ok(vec![
            RoundEvent::BalanceUpdate { participant: *id, balance: participant.balance },
            RoundEvent::BetPlaced { participant: *id, name, amount: wager },
        ])
    }

    /// Cash out at the current multiplier.
    pub fn cash_out(&mut self, id: &ParticipantId) -> Result<Vec<RoundEvent>, CashOutError> {
        if self.round.phase() != RoundPhase::Running {
            return Err(CashOutError::WrongPhase);
        }

        let multiplier = self.round.current_multiplier();
        let participant = self.participants.get_mut(id).ok_or(CashOutError::UnknownParticipant)?;
        let receipt = self.ledger.cash_out(participant, multiplier)?;
        let name = participant.leaderboard_name().to_string();

        Ok(vec![
            RoundEvent::CashOutSuccess {
                participant: *id,
                multiplier: receipt.multiplier,
                winnings: receipt.winnings,
            },
            RoundEvent::BalanceUpdate { participant: *id, balance: receipt.balance },
            RoundEvent::PlayerCashedOut { participant: *id, name, multiplier: receipt.multiplier },
            RoundEvent::LeaderboardUpdate {
                entries: live_leaderboard(&self.ledger, &self.participants),
            },
        ])
    }

    /// Current state as seen by one participant.
    pub fn snapshot_for(&self, id: &ParticipantId) -> Option<GameSnapshot> {
        let participant = self.participants.get(id)?;
        let countdown = match self.round.phase() {
            RoundPhase::Waiting => self.round.countdown_remaining(),
            _ => 0,
        };

        Some(GameSnapshot {
            phase: self.round.phase(),
            sequence_number: self.round.sequence_number(),
            countdown,
            current_multiplier: self.round.current_multiplier(),
            commitment_hash: self.round.commitment_hash(),
            balance: participant.balance,
            name: participant.display_name.clone(),
            recent_outcomes: self.history.snapshot(),
            active_bet: self.ledger.get(id).map(|bet| bet.wager),
        })
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Current round.
    pub fn round(&self) -> &Round {
        &self.round
    }

    /// Current phase.
    pub fn phase(&self) -> RoundPhase {
        self.round.phase()
    }

    /// Participants.
    pub fn participants(&self) -> &ParticipantRegistry {
        &self.participants
    }

    /// Bets for the current round.
    pub fn ledger(&self) -> &BetLedger {
        &self.ledger
    }

    /// Recent outcomes.
    pub fn history(&self) -> &RecentOutcomes {
        &self.history
    }

    /// Configuration.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }
}

impl std::fmt::Debug for RoundStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundStateMachine")
            .field("round", &self.round)
            .field("participants", &self.participants.len())
            .field("bets", &self.ledger.len())
            .field("history", &self.history.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fairness::oracle::compute_crash_multiplier;
    use crate::game::settlement::BetOutcome;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Yields all-zero secrets until `remaining` runs out, then fails.
    struct ZeroRng {
        remaining: usize,
    }

    impl RngCore for ZeroRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            if self.remaining == 0 {
                return Err(rand::Error::new(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "entropy exhausted",
                )));
            }
            self.remaining -= 1;
            dest.fill(0);
            Ok(())
        }
    }

    impl CryptoRng for ZeroRng {}

    fn seeded(config: GameConfig) -> RoundStateMachine {
        let (machine, _) = RoundStateMachine::new_with_source(
            config,
            Box::new(StdRng::seed_from_u64(7)),
        ).unwrap();
        machine
    }

    fn zero_secret(config: GameConfig, secrets: usize) -> RoundStateMachine {
        let (machine, _) = RoundStateMachine::new_with_source(
            config,
            Box::new(ZeroRng { remaining: secrets }),
        ).unwrap();
        machine
    }

    fn quick_config() -> GameConfig {
        GameConfig { countdown_secs: 2, ..GameConfig::default() }
    }

    fn join(machine: &mut RoundStateMachine, byte: u8, name: &str) -> ParticipantId {
        let id = ParticipantId::from_bytes([byte; 16]);
        machine.connect(id);
        machine.set_name(&id, name).unwrap();
        id
    }

    fn run_countdown(machine: &mut RoundStateMachine) -> Vec<RoundEvent> {
        let mut events = Vec::new();
        while machine.phase() == RoundPhase::Waiting {
            events.extend(machine.on_timer().unwrap().events);
        }
        events
    }

    fn run_to_crash(machine: &mut RoundStateMachine) -> Vec<RoundEvent> {
        let mut events = Vec::new();
        while machine.phase() == RoundPhase::Running {
            events.extend(machine.on_timer().unwrap().events);
        }
        events
    }

    fn balance(machine: &RoundStateMachine, id: &ParticipantId) -> Amount {
        machine.participants().get(id).unwrap().balance
    }

    #[test]
    fn test_initial_waiting_events() {
        let (machine, events) = RoundStateMachine::new(GameConfig::default()).unwrap();
        assert_eq!(machine.phase(), RoundPhase::Waiting);
        assert_eq!(machine.round().sequence_number(), 1);
        assert_eq!(machine.timer_period(), COUNTDOWN_TICK);

        match &events[0] {
            RoundEvent::WaitingPhase { sequence_number, countdown_remaining, commitment_hash } => {
                assert_eq!(*sequence_number, 1);
                assert_eq!(*countdown_remaining, 10);
                assert_eq!(*commitment_hash, machine.round().commitment_hash());
            }
            other => panic!("expected waitingPhase, got {:?}", other),
        }
        assert_eq!(events[1], RoundEvent::LeaderboardUpdate { entries: Vec::new() });
    }

    #[test]
    fn test_countdown_then_start() {
        let mut machine = seeded(quick_config());

        let first = machine.on_timer().unwrap();
        assert_eq!(first.events, vec![RoundEvent::CountdownUpdate { countdown_remaining: 1 }]);
        assert!(!first.phase_changed);

        let second = machine.on_timer().unwrap();
        assert_eq!(second.events, vec![
            RoundEvent::CountdownUpdate { countdown_remaining: 0 },
            RoundEvent::GameStarted { sequence_number: 1 },
        ]);
        assert!(second.phase_changed);
        assert_eq!(machine.phase(), RoundPhase::Running);
        assert_eq!(machine.timer_period(), Duration::from_millis(100));
    }

    #[test]
    fn test_zero_secret_round_crashes_at_oracle_value() {
        let mut machine = zero_secret(quick_config(), 2);
        run_countdown(&mut machine);

        let events = run_to_crash(&mut machine);
        let expected = compute_crash_multiplier("0".repeat(64).as_bytes(), 1);
        assert!((expected - 5.657262659784701).abs() < 1e-12);

        let mut last = 1.0;
        for event in &events {
            if let RoundEvent::MultiplierUpdate { current_multiplier } = event {
                assert!(*current_multiplier >= last);
                assert!(*current_multiplier < expected);
                last = *current_multiplier;
            }
        }

        let crashed = events.iter().find_map(|e| match e {
            RoundEvent::GameCrashed { crash_multiplier, revealed_secret, sequence_number } => {
                Some((*crash_multiplier, revealed_secret.clone(), *sequence_number))
            }
            _ => None,
        }).unwrap();
        assert_eq!(crashed.0, expected);
        assert_eq!(crashed.1, "0".repeat(64));
        assert_eq!(crashed.2, 1);
        assert_eq!(
            crate::core::hash::sha256(crashed.1.as_bytes()),
            *machine.round().commitment_hash().as_bytes()
        );
        assert_eq!(machine.round().current_multiplier(), expected);
        assert_eq!(machine.history().snapshot(), vec![expected]);
        assert!(machine.history().find(1).unwrap().to_reveal().verify().is_ok());
    }

    #[test]
    fn test_crash_event_order() {
        let mut machine = seeded(quick_config());
        run_countdown(&mut machine);
        let events = run_to_crash(&mut machine);

        let tail: Vec<&str> = events.iter().rev().take(3).rev().map(|e| e.kind()).collect();
        assert_eq!(tail, vec!["gameCrashed", "leaderboardUpdate", "recentOutcomesUpdate"]);
        assert_eq!(machine.timer_period(), Duration::from_secs(5));
    }

    #[test]
    fn test_next_round_has_new_sequence_and_empty_ledger() {
        let mut machine = seeded(quick_config());
        let id = join(&mut machine, 1, "alice");
        machine.place_bet(&id, 10.0).unwrap();
        let first_hash = machine.round().commitment_hash();

        run_countdown(&mut machine);
        run_to_crash(&mut machine);
        let outcome = machine.on_timer().unwrap();

        assert!(outcome.phase_changed);
        assert_eq!(machine.phase(), RoundPhase::Waiting);
        assert_eq!(machine.round().sequence_number(), 2);
        assert_ne!(machine.round().commitment_hash(), first_hash);
        assert!(machine.ledger().is_empty());
        assert!(matches!(outcome.events[0], RoundEvent::WaitingPhase { sequence_number: 2, .. }));
    }

    #[test]
    fn test_entropy_failure_halts_in_crashed() {
        let mut machine = zero_secret(quick_config(), 1);
        run_countdown(&mut machine);
        run_to_crash(&mut machine);

        let result = machine.on_timer();
        assert!(matches!(result, Err(FairnessError::EntropyUnavailable(_))));
        assert_eq!(machine.phase(), RoundPhase::Crashed);
        assert_eq!(machine.round().sequence_number(), 1);
    }

    #[test]
    fn test_entropy_failure_at_startup() {
        let result = RoundStateMachine::new_with_source(
            GameConfig::default(),
            Box::new(ZeroRng { remaining: 0 }),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_bet_then_duplicate() {
        let mut machine = seeded(quick_config());
        let id = join(&mut machine, 1, "alice");

        let events = machine.place_bet(&id, 100.0).unwrap();
        assert_eq!(balance(&machine, &id), Amount::from_whole(900));
        assert_eq!(events[0], RoundEvent::BalanceUpdate {
            participant: id,
            balance: Amount::from_whole(900),
        });
        assert!(matches!(events[1], RoundEvent::BetPlaced { .. }));

        assert_eq!(machine.place_bet(&id, 100.0).unwrap_err(), BetError::DuplicateBet);
        assert_eq!(balance(&machine, &id), Amount::from_whole(900));
    }

    #[test]
    fn test_bet_validation_order() {
        let mut machine = seeded(quick_config());
        let ghost = ParticipantId::from_bytes([9; 16]);
        assert_eq!(machine.place_bet(&ghost, 10.0).unwrap_err(), BetError::UnknownParticipant);

        let id = ParticipantId::from_bytes([1; 16]);
        machine.connect(id);
        assert_eq!(machine.place_bet(&id, 10.0).unwrap_err(), BetError::NameRequired);

        machine.set_name(&id, "bob").unwrap();
        assert_eq!(machine.place_bet(&id, 0.0).unwrap_err(), BetError::InvalidAmount);
        assert_eq!(machine.place_bet(&id, -5.0).unwrap_err(), BetError::InvalidAmount);
        assert_eq!(machine.place_bet(&id, f64::NAN).unwrap_err(), BetError::InvalidAmount);
        assert_eq!(machine.place_bet(&id, 1000.01).unwrap_err(), BetError::InsufficientBalance);
        assert!(machine.ledger().is_empty());

        run_countdown(&mut machine);
        assert_eq!(machine.place_bet(&id, 10.0).unwrap_err(), BetError::WrongPhase);
    }

    #[test]
    fn test_bet_above_balance_by_fraction_rejected() {
        let mut machine = seeded(quick_config());
        let id = join(&mut machine, 1, "alice");

        assert_eq!(machine.place_bet(&id, 1000.004).unwrap_err(), BetError::InvalidAmount);
        assert_eq!(machine.place_bet(&id, 0.005).unwrap_err(), BetError::InvalidAmount);
        assert_eq!(balance(&machine, &id), Amount::from_whole(1000));
        assert!(machine.ledger().is_empty());

        machine.place_bet(&id, 1000.0).unwrap();
        assert_eq!(balance(&machine, &id), Amount::ZERO);
    }

    #[test]
    fn test_cash_out_credits_at_current_multiplier() {
        let mut machine = zero_secret(quick_config(), 2);
        let id = join(&mut machine, 1, "alice");
        machine.place_bet(&id, 100.0).unwrap();

        assert_eq!(machine.cash_out(&id).unwrap_err(), CashOutError::WrongPhase);
        run_countdown(&mut machine);

        // climb to 1.50 (crash is ~5.66)
        for _ in 0..50 {
            machine.on_timer().unwrap();
        }
        let multiplier = machine.round().current_multiplier();
        let events = machine.cash_out(&id).unwrap();

        let expected = Amount::from_whole(100).payout(multiplier);
        assert_eq!(events[0], RoundEvent::CashOutSuccess {
            participant: id,
            multiplier,
            winnings: expected,
        });
        assert_eq!(balance(&machine, &id), Amount::from_whole(900) + expected);
        assert!(matches!(&events[3], RoundEvent::LeaderboardUpdate { entries } if entries.len() == 1));

        assert_eq!(machine.cash_out(&id).unwrap_err(), CashOutError::AlreadyCashedOut);
    }

    #[test]
    fn test_cash_out_without_bet() {
        let mut machine = seeded(quick_config());
        let id = join(&mut machine, 1, "alice");
        run_countdown(&mut machine);
        assert_eq!(machine.cash_out(&id).unwrap_err(), CashOutError::NoActiveBet);
    }

    #[test]
    fn test_uncashed_bet_crashes_with_no_further_debit() {
        let mut machine = seeded(quick_config());
        let id = join(&mut machine, 1, "alice");
        machine.place_bet(&id, 100.0).unwrap();

        run_countdown(&mut machine);
        let events = run_to_crash(&mut machine);

        let board = events.iter().find_map(|e| match e {
            RoundEvent::LeaderboardUpdate { entries } => Some(entries.clone()),
            _ => None,
        }).unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].result, BetOutcome::Crashed);
        assert_eq!(board[0].money, Amount::ZERO);
        assert_eq!(balance(&machine, &id), Amount::from_whole(900));
    }

    #[test]
    fn test_disconnect_with_bet_settles_as_loss() {
        let mut machine = seeded(quick_config());
        let stays = join(&mut machine, 1, "alice");
        let leaves = join(&mut machine, 2, "bob");
        machine.place_bet(&leaves, 50.0).unwrap();

        assert!(!machine.disconnect(&leaves));
        assert!(machine.participants().get(&leaves).is_some());

        run_countdown(&mut machine);
        let events = run_to_crash(&mut machine);
        let board = events.iter().find_map(|e| match e {
            RoundEvent::LeaderboardUpdate { entries } => Some(entries.clone()),
            _ => None,
        }).unwrap();
        assert_eq!(board[0].name, "bob");
        assert_eq!(board[0].result, BetOutcome::Crashed);

        assert!(machine.participants().get(&leaves).is_none());
        assert!(machine.participants().get(&stays).is_some());
    }

    #[test]
    fn test_disconnect_without_bet_removes_immediately() {
        let mut machine = seeded(quick_config());
        let id = join(&mut machine, 1, "alice");
        assert!(machine.disconnect(&id));
        assert!(machine.participants().is_empty());
        assert!(!machine.disconnect(&id));
    }

    #[test]
    fn test_snapshot_for_participant() {
        let mut machine = seeded(quick_config());
        let id = ParticipantId::from_bytes([1; 16]);
        let events = machine.connect(id);

        match &events[0] {
            RoundEvent::Snapshot { participant, snapshot } => {
                assert_eq!(*participant, id);
                assert_eq!(snapshot.phase, RoundPhase::Waiting);
                assert_eq!(snapshot.countdown, 2);
                assert_eq!(snapshot.balance, Amount::from_whole(1000));
                assert!(snapshot.name.is_none());
                assert!(snapshot.active_bet.is_none());
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_set_name_emits_user_update() {
        let mut machine = seeded(quick_config());
        let id = ParticipantId::from_bytes([1; 16]);
        machine.connect(id);

        let events = machine.set_name(&id, " carol ").unwrap();
        assert_eq!(events, vec![RoundEvent::UserUpdate {
            participant: id,
            balance: Amount::from_whole(1000),
            name: Some("carol".to_string()),
        }]);
        assert_eq!(machine.set_name(&id, "dave").unwrap_err(), NameError::AlreadySet);
    }

    #[test]
    fn test_zero_countdown_starts_on_first_tick() {
        let mut machine = seeded(GameConfig { countdown_secs: 0, ..GameConfig::default() });
        let outcome = machine.on_timer().unwrap();
        assert_eq!(outcome.events, vec![RoundEvent::GameStarted { sequence_number: 1 }]);
        assert_eq!(machine.phase(), RoundPhase::Running);
    }

    #[test]
    fn test_history_keeps_last_ten_rounds() {
        let mut machine = seeded(GameConfig {
            countdown_secs: 0,
            multiplier_step: 1.0,
            ..GameConfig::default()
        });

        for _ in 0..12 {
            run_countdown(&mut machine);
            run_to_crash(&mut machine);
            machine.on_timer().unwrap();
        }

        assert_eq!(machine.history().len(), 10);
        let sequences: Vec<u64> = machine.history().outcomes().map(|o| o.sequence_number).collect();
        assert_eq!(sequences, (3..=12).collect::<Vec<u64>>());
        for outcome in machine.history().outcomes() {
            assert!(outcome.to_reveal().verify().is_ok());
        }
    }
}
