//! Datentypen für Gruppenanrufe
//!
//! Identitäten, Mute- und Verbindungszustände sowie das Ergebnis
//! einer Einladung.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

// ============================================================================
// IDENTITIES
// ============================================================================

/// Eindeutige Benutzer-ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Eindeutige ID eines Gruppenanrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ein Benutzer, wie ihn der Anruf sieht
///
/// Gleichheit und Hash laufen ausschließlich über die ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub is_self: bool,
    pub is_bot: bool,
}

impl User {
    /// Normaler (menschlicher) Benutzer
    pub fn new(id: u64, first_name: impl Into<String>) -> Self {
        Self {
            id: UserId(id),
            first_name: first_name.into(),
            is_self: false,
            is_bot: false,
        }
    }

    /// Der lokale Benutzer
    pub fn myself(id: u64, first_name: impl Into<String>) -> Self {
        Self {
            is_self: true,
            ..Self::new(id, first_name)
        }
    }

    pub fn bot(id: u64, first_name: impl Into<String>) -> Self {
        Self {
            is_bot: true,
            ..Self::new(id, first_name)
        }
    }

    /// Kann dieser Benutzer überhaupt eingeladen werden?
    pub fn is_invitable(&self) -> bool {
        !self.is_self && !self.is_bot
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for User {}

impl Hash for User {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// ============================================================================
// CALL STATE
// ============================================================================

/// Mute-Status des lokalen Teilnehmers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MuteState {
    Active,
    Muted,
    /// Vom Server erzwungen, lokal nicht aufhebbar
    ForceMuted,
}

/// Verbindungsphase des Anrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionPhase {
    Creating,
    Joining,
    Connecting,
    Joined,
    HangingUp,
    Failed,
    Ended,
}

impl ConnectionPhase {
    /// Medienpfad steht noch nicht
    pub fn is_connecting(self) -> bool {
        matches!(
            self,
            ConnectionPhase::Creating | ConnectionPhase::Joining | ConnectionPhase::Connecting
        )
    }

    pub fn is_finished(self) -> bool {
        matches!(self, ConnectionPhase::Failed | ConnectionPhase::Ended)
    }
}

/// Audio-Level eines Teilnehmers (0.0 - 1.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelUpdate {
    pub user_id: UserId,
    pub is_self: bool,
    pub value: f32,
}

/// Ein Teilnehmer im Anruf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub user: User,
    /// Von einem Admin stummgeschaltet
    pub muted: bool,
}

impl Participant {
    pub fn new(user: User) -> Self {
        Self { user, muted: false }
    }
}

/// Was der Anruf über seinen Kanal weiß
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub members_count: usize,
    pub can_manage_call: bool,
    /// Der aktuell laufende Anruf des Kanals
    pub active_call: Option<CallId>,
}

// ============================================================================
// INVITE OUTCOME
// ============================================================================

/// Ergebnis einer Einladung
///
/// `SingleUser` wird nur geliefert wenn genau ein Benutzer eingeladen wurde,
/// damit die Bestätigung den Namen nennen kann.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum InviteOutcome {
    Count(usize),
    SingleUser(User),
}

impl InviteOutcome {
    /// Anzahl der eingeladenen Benutzer
    pub fn invited_count(&self) -> usize {
        match self {
            InviteOutcome::Count(count) => *count,
            InviteOutcome::SingleUser(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_user_identity_is_by_id() {
        let a = User::new(7, "Alice");
        let renamed = User::new(7, "Alicia");

        let mut set = HashSet::new();
        set.insert(a.clone());
        assert!(!set.insert(renamed.clone()));
        assert_eq!(a, renamed);
    }

    #[test]
    fn test_connecting_phases() {
        assert!(ConnectionPhase::Creating.is_connecting());
        assert!(ConnectionPhase::Joining.is_connecting());
        assert!(ConnectionPhase::Connecting.is_connecting());
        assert!(!ConnectionPhase::Joined.is_connecting());
        assert!(!ConnectionPhase::Ended.is_connecting());
    }

    #[test]
    fn test_invitable() {
        assert!(User::new(1, "Bob").is_invitable());
        assert!(!User::myself(2, "Me").is_invitable());
        assert!(!User::bot(3, "Helper").is_invitable());
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_value(InviteOutcome::Count(3)).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "count", "value": 3 }));
    }
}
