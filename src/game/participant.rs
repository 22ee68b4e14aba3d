//! Participant Registry
//!
//! One entry per connection. Balances persist across rounds; bets do not
//! live here (see `ledger`).
//! Uses BTreeMap for deterministic iteration order.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::money::Amount;

/// Longest display name accepted, in characters.
pub const MAX_NAME_LEN: usize = 32;

/// Fallback shown on the leaderboard for a participant without a name.
pub const ANONYMOUS_NAME: &str = "Anonymous";

// =============================================================================
// PARTICIPANT ID
// =============================================================================

/// Connection-scoped participant identifier.
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(uuid::Uuid);

impl ParticipantId {
    /// Fresh random identifier for a new connection.
    pub fn new_v4() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(uuid::Uuid::from_bytes(bytes))
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.as_bytes()[..4])
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// PARTICIPANT
// =============================================================================

/// Whether the participant's connection is still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connection open.
    Connected,
    /// Connection closed; kept until any open bet settles.
    Disconnected,
}

/// A participant and their persistent state.
#[derive(Debug, Clone)]
pub struct Participant {
    /// Participant identifier.
    pub id: ParticipantId,
    /// Current balance. Never negative.
    pub balance: Amount,
    /// Display name, required before betting.
    pub display_name: Option<String>,
    /// Connection state.
    pub connection: ConnectionState,
}

impl Participant {
    /// Create a connected participant.
    pub fn new(id: ParticipantId, balance: Amount) -> Self {
        Self {
            id,
            balance,
            display_name: None,
            connection: ConnectionState::Connected,
        }
    }

    /// Check if participant is connected.
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    /// Name for leaderboards.
    pub fn leaderboard_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(ANONYMOUS_NAME)
    }
}

/// Errors from `setName`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    /// No such participant.
    #[error("unknown participant")]
    UnknownParticipant,

    /// Name is blank after trimming.
    #[error("name must not be empty")]
    Empty,

    /// Name exceeds the length limit.
    #[error("name longer than {} characters", MAX_NAME_LEN)]
    TooLong,

    /// A name was already chosen for this connection.
    #[error("name already set")]
    AlreadySet,
}

// =============================================================================
// REGISTRY
// =============================================================================

/// All known participants.
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    participants: BTreeMap<ParticipantId, Participant>,
    starting_balance: Amount,
}

impl ParticipantRegistry {
    /// Create a registry that credits `starting_balance` to new participants.
    pub fn new(starting_balance: Amount) -> Self {
        Self {
            participants: BTreeMap::new(),
            starting_balance,
        }
    }

    /// Register a connection. Re-registering an existing id reconnects it.
    pub fn register(&mut self, id: ParticipantId) -> &Participant {
        let starting_balance = self.starting_balance;
        let participant = self.participants
            .entry(id)
            .or_insert_with(|| Participant::new(id, starting_balance));
        participant.connection = ConnectionState::Connected;
        participant
    }

    /// Get a participant.
    pub fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.get(id)
    }

    /// Get a participant mutably.
    pub fn get_mut(&mut self, id: &ParticipantId) -> Option<&mut Participant> {
        self.participants.get_mut(id)
    }

    /// Set a display name once. Whitespace is trimmed.
    pub fn set_name(&mut self, id: &ParticipantId, name: &str) -> Result<&Participant, NameError> {
        let participant = self.participants.get_mut(id).ok_or(NameError::UnknownParticipant)?;

        if participant.display_name.is_some() {
            return Err(NameError::AlreadySet);
        }

        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(NameError::Empty);
        }
        if trimmed.chars().count() > MAX_NAME_LEN {
            return Err(NameError::TooLong);
        }

        participant.display_name = Some(trimmed.to_string());
        Ok(&*participant)
    }

    /// Mark a participant as disconnected. Returns true if found.
    pub fn mark_disconnected(&mut self, id: &ParticipantId) -> bool {
        match self.participants.get_mut(id) {
            Some(participant) => {
                participant.connection = ConnectionState::Disconnected;
                true
            }
            None => false,
        }
    }

    /// Remove a participant entirely.
    pub fn remove(&mut self, id: &ParticipantId) -> Option<Participant> {
        self.participants.remove(id)
    }

    /// Drop disconnected participants unless `keep` says otherwise.
    /// Returns the removed ids.
    pub fn prune_disconnected<F>(&mut self, keep: F) -> Vec<ParticipantId>
    where
        F: Fn(&ParticipantId) -> bool,
    {
        let removed: Vec<ParticipantId> = self.participants.values()
            .filter(|p| !p.is_connected() && !keep(&p.id))
            .map(|p| p.id)
            .collect();

        for id in &removed {
            self.participants.remove(id);
        }

        removed
    }

    /// Number of participants (connected or not).
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Is the registry empty?
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Iterate participants in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ParticipantRegistry {
        ParticipantRegistry::new(Amount::from_whole(1000))
    }

    #[test]
    fn test_register_credits_starting_balance() {
        let mut reg = registry();
        let id = ParticipantId::from_bytes([1; 16]);
        let p = reg.register(id);
        assert_eq!(p.balance, Amount::from_whole(1000));
        assert!(p.display_name.is_none());
        assert!(p.is_connected());
    }

    #[test]
    fn test_reregister_keeps_balance() {
        let mut reg = registry();
        let id = ParticipantId::from_bytes([1; 16]);
        reg.register(id);
        reg.get_mut(&id).unwrap().balance = Amount::from_whole(5);
        reg.mark_disconnected(&id);

        let p = reg.register(id);
        assert_eq!(p.balance, Amount::from_whole(5));
        assert!(p.is_connected());
    }

    #[test]
    fn test_set_name_once() {
        let mut reg = registry();
        let id = ParticipantId::from_bytes([1; 16]);
        reg.register(id);

        let p = reg.set_name(&id, "  alice  ").unwrap();
        assert_eq!(p.display_name.as_deref(), Some("alice"));
        assert_eq!(reg.set_name(&id, "bob").unwrap_err(), NameError::AlreadySet);
    }

    #[test]
    fn test_set_name_validation() {
        let mut reg = registry();
        let id = ParticipantId::from_bytes([1; 16]);
        reg.register(id);

        assert_eq!(reg.set_name(&id, "   ").unwrap_err(), NameError::Empty);
        assert_eq!(reg.set_name(&id, &"x".repeat(MAX_NAME_LEN + 1)).unwrap_err(), NameError::TooLong);
        assert_eq!(
            reg.set_name(&ParticipantId::from_bytes([9; 16]), "ghost").unwrap_err(),
            NameError::UnknownParticipant
        );
    }

    #[test]
    fn test_prune_disconnected() {
        let mut reg = registry();
        let a = ParticipantId::from_bytes([1; 16]);
        let b = ParticipantId::from_bytes([2; 16]);
        let c = ParticipantId::from_bytes([3; 16]);
        reg.register(a);
        reg.register(b);
        reg.register(c);
        reg.mark_disconnected(&a);
        reg.mark_disconnected(&b);

        // b still has an open bet
        let removed = reg.prune_disconnected(|id| *id == b);
        assert_eq!(removed, vec![a]);
        assert_eq!(reg.len(), 2);
        assert!(reg.get(&b).is_some());
        assert!(reg.get(&c).is_some());
    }

    #[test]
    fn test_anonymous_fallback() {
        let p = Participant::new(ParticipantId::from_bytes([1; 16]), Amount::ZERO);
        assert_eq!(p.leaderboard_name(), ANONYMOUS_NAME);
    }
}
