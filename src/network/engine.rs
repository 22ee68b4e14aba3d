//! Round Engine
//!
//! The single writer. One task owns the [`RoundStateMachine`], drains the
//! command queue and drives the phase timer. Connection tasks never touch
//! round state; they submit commands and receive [`ServerMessage`]s on their
//! own channel.
//!
//! ```text
//!  connection tasks ──EngineCommand──▶ ┌──────────────┐
//!                                      │ RoundEngine  │──try_send──▶ client channels
//!  phase timer ──────────tick────────▶ │ (one task)   │
//!                                      └──────────────┘
//! ```

use std::collections::BTreeMap;
use std::time::Duration;
use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::fairness::commitment::FairnessError;
use crate::game::events::{Recipient, RoundEvent};
use crate::game::machine::RoundStateMachine;
use crate::game::participant::ParticipantId;
use crate::network::protocol::{ClientMessage, ErrorCode, ServerError, ServerMessage};

/// Work submitted to the engine.
#[derive(Debug)]
pub enum EngineCommand {
    /// A connection opened.
    Connect {
        participant: ParticipantId,
        sender: mpsc::Sender<ServerMessage>,
    },
    /// A connection closed.
    Disconnect { participant: ParticipantId },
    /// A request from a connected client.
    Client {
        participant: ParticipantId,
        message: ClientMessage,
    },
}

/// The engine task is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("round engine stopped")]
pub struct EngineStopped;

/// Cloneable handle for submitting commands.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    /// Register a connection and its outbound channel.
    pub async fn connect(
        &self,
        participant: ParticipantId,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<(), EngineStopped> {
        self.send(EngineCommand::Connect { participant, sender }).await
    }

    /// Report a closed connection.
    pub async fn disconnect(&self, participant: ParticipantId) -> Result<(), EngineStopped> {
        self.send(EngineCommand::Disconnect { participant }).await
    }

    /// Forward a client request.
    pub async fn submit(&self, participant: ParticipantId, message: ClientMessage) -> Result<(), EngineStopped> {
        self.send(EngineCommand::Client { participant, message }).await
    }

    async fn send(&self, command: EngineCommand) -> Result<(), EngineStopped> {
        self.commands.send(command).await.map_err(|_| EngineStopped)
    }
}

// =============================================================================
// PHASE TIMER
// =============================================================================

/// The one active timer. Replacing it drops the previous phase's schedule.
struct PhaseTimer {
    interval: Interval,
}

impl PhaseTimer {
    fn new(period: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }

    fn reschedule(&mut self, period: Duration) {
        *self = Self::new(period);
    }

    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

// =============================================================================
// OUTBOX
// =============================================================================

/// Per-client outbound channels.
///
/// Sends never wait: a full or closed channel loses the message and the
/// round carries on. A stalled client is logged once when its queue fills
/// and once when it drains again.
#[derive(Default)]
struct Outbox {
    clients: BTreeMap<ParticipantId, ClientSlot>,
}

struct ClientSlot {
    sender: mpsc::Sender<ServerMessage>,
    /// Messages lost since the queue last accepted one.
    dropped: u64,
}

impl ClientSlot {
    /// Returns false once the channel is closed.
    fn try_deliver(&mut self, id: &ParticipantId, message: ServerMessage) -> bool {
        match self.sender.try_send(message) {
            Ok(()) => {
                if self.dropped > 0 {
                    info!(participant = %id.short(), dropped = self.dropped, "client queue drained");
                    self.dropped = 0;
                }
                true
            }
            Err(TrySendError::Full(_)) => {
                if self.dropped == 0 {
                    warn!(participant = %id.short(), "client queue full, dropping messages");
                }
                self.dropped += 1;
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

impl Outbox {
    fn attach(&mut self, participant: ParticipantId, sender: mpsc::Sender<ServerMessage>) {
        self.clients.insert(participant, ClientSlot { sender, dropped: 0 });
    }

    fn detach(&mut self, participant: &ParticipantId) {
        self.clients.remove(participant);
    }

    fn deliver(&mut self, events: Vec<RoundEvent>) {
        for event in events {
            let recipient = event.recipient();
            let message = ServerMessage::from(event);
            match recipient {
                Recipient::All => self.broadcast(&message),
                Recipient::Participant(id) => self.send_to(&id, message),
            }
        }
    }

    fn broadcast(&mut self, message: &ServerMessage) {
        let mut closed = Vec::new();
        for (id, slot) in self.clients.iter_mut() {
            if !slot.try_deliver(id, message.clone()) {
                closed.push(*id);
            }
        }
        for id in closed {
            self.clients.remove(&id);
        }
    }

    fn send_to(&mut self, participant: &ParticipantId, message: ServerMessage) {
        let open = match self.clients.get_mut(participant) {
            Some(slot) => slot.try_deliver(participant, message),
            None => return,
        };
        if !open {
            self.clients.remove(participant);
        }
    }

    fn len(&self) -> usize {
        self.clients.len()
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Owns the round state and serializes every mutation.
pub struct RoundEngine {
    machine: RoundStateMachine,
    commands: mpsc::Receiver<EngineCommand>,
    outbox: Outbox,
    timer: PhaseTimer,
    shutdown: broadcast::Receiver<()>,
}

impl RoundEngine {
    /// Spawn the engine task.
    ///
    /// The task ends with `Ok` on shutdown or when every handle is dropped,
    /// and with `Err` if a new round could not get a secret.
    pub fn spawn(
        machine: RoundStateMachine,
        queue_depth: usize,
        shutdown: broadcast::Receiver<()>,
    ) -> (EngineHandle, JoinHandle<Result<(), FairnessError>>) {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let timer = PhaseTimer::new(machine.timer_period());

        info!(
            sequence = machine.round().sequence_number(),
            commitment = %machine.round().commitment_hash(),
            "round engine started"
        );

        let engine = Self {
            machine,
            commands: rx,
            outbox: Outbox::default(),
            timer,
            shutdown,
        };
        let task = tokio::spawn(engine.run());

        (EngineHandle { commands: tx }, task)
    }

    async fn run(mut self) -> Result<(), FairnessError> {
        loop {
            // The timer outranks commands: a busy queue must not hold back
            // a due phase transition.
            tokio::select! {
                biased;

                _ = self.shutdown.recv() => {
                    info!("round engine shutting down");
                    return Ok(());
                }
                _ = self.timer.tick() => {
                    self.on_timer()?;
                }
                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command),
                        None => {
                            debug!("all engine handles dropped");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    fn on_timer(&mut self) -> Result<(), FairnessError> {
        let outcome = match self.machine.on_timer() {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "cannot start a new round, halting");
                return Err(e);
            }
        };

        if outcome.phase_changed {
            self.timer.reschedule(self.machine.timer_period());
            self.log_phase();
        }

        #[cfg(feature = "debug-tracing")]
        debug!(
            phase = ?self.machine.phase(),
            multiplier = self.machine.round().current_multiplier(),
            events = outcome.events.len(),
            "timer tick"
        );

        self.outbox.deliver(outcome.events);
        Ok(())
    }

    fn log_phase(&self) {
        let round = self.machine.round();
        match round.revealed_crash_multiplier() {
            Some(crash) => info!(
                sequence = round.sequence_number(),
                crash_multiplier = crash,
                bets = self.machine.ledger().len(),
                "round crashed"
            ),
            None => info!(
                sequence = round.sequence_number(),
                phase = ?round.phase(),
                commitment = %round.commitment_hash(),
                "phase changed"
            ),
        }
    }

    fn handle_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Connect { participant, sender } => {
                self.outbox.attach(participant, sender);
                let events = self.machine.connect(participant);
                self.outbox.deliver(events);
                debug!(participant = %participant.short(), clients = self.outbox.len(), "participant joined");
            }
            EngineCommand::Disconnect { participant } => {
                self.outbox.detach(&participant);
                let removed = self.machine.disconnect(&participant);
                debug!(participant = %participant.short(), removed, "participant left");
            }
            EngineCommand::Client { participant, message } => {
                self.handle_client(participant, message);
            }
        }
    }

    fn handle_client(&mut self, participant: ParticipantId, message: ClientMessage) {
        let result = match message {
            ClientMessage::SetName { name } => {
                self.machine.set_name(&participant, &name).map_err(ServerError::from)
            }
            ClientMessage::PlaceBet { amount } => {
                self.machine.place_bet(&participant, amount).map_err(ServerError::from)
            }
            ClientMessage::CashOut => {
                self.machine.cash_out(&participant).map_err(ServerError::from)
            }
            ClientMessage::SyncRequest => match self.machine.snapshot_for(&participant) {
                Some(snapshot) => {
                    self.outbox.send_to(&participant, ServerMessage::GameUpdate(snapshot));
                    Ok(Vec::new())
                }
                None => Err(ServerError::new(ErrorCode::InvalidInput, "not connected")),
            },
            ClientMessage::Ping { timestamp } => {
                let server_time = Utc::now().timestamp_millis().max(0) as u64;
                self.outbox.send_to(&participant, ServerMessage::Pong { timestamp, server_time });
                Ok(Vec::new())
            }
        };

        match result {
            Ok(events) => self.outbox.deliver(events),
            Err(rejection) => {
                debug!(participant = %participant.short(), code = ?rejection.code, "request rejected");
                self.outbox.send_to(&participant, ServerMessage::Rejected(rejection));
            }
        }
    }
}
