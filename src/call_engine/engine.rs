//! Group Call Engine
//!
//! Die Schnittstelle, über die Panel, Einladungsdialog und Mute-Button
//! den Anruf beobachten, plus eine In-Process-Implementierung.
//!
//! Nur die Engine verändert ihren eigenen Mute- und Verbindungszustand.
//! Alle anderen Komponenten lesen und reagieren auf Änderungen.

use super::types::{
    CallId, ChannelInfo, ConnectionPhase, InviteOutcome, LevelUpdate, MuteState, Participant,
    User, UserId,
};
use crate::database::{DatabaseError, InvitesDatabase};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, watch};

/// Kapazität des Level-Streams
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum CallEngineError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Call has already ended")]
    CallEnded,

    #[error("User {0} is not a participant")]
    NotAParticipant(UserId),
}

// ============================================================================
// ENGINE INTERFACE
// ============================================================================

/// Was Panel, Einladungsdialog und Mute-Button vom Anruf brauchen
pub trait GroupCallEngine: Send + Sync {
    fn id(&self) -> CallId;

    /// Momentaufnahme des Kanals, zu dem der Anruf gehört
    fn channel(&self) -> ChannelInfo;

    fn self_user(&self) -> User;

    /// Aktuelle Teilnehmer (ohne den lokalen Benutzer)
    fn participants(&self) -> Vec<Participant>;

    /// Eingeladene, aber noch nicht beigetretene Benutzer
    fn invited_to_call_users(&self) -> Vec<User>;

    /// Anzahl der Benutzer im Anruf oder eingeladen
    fn full_count(&self) -> usize;

    /// Lädt Benutzer ein
    ///
    /// Das Ergebnis kommt asynchron. Es gibt keine Wiederholungen.
    fn invite_users(&self, users: Vec<User>) -> BoxFuture<'static, InviteOutcome>;

    fn muted(&self) -> MuteState;

    fn set_muted(&self, mute: MuteState);

    /// Mute-Status als Stream (mit aktuellem Wert)
    fn muted_value(&self) -> watch::Receiver<MuteState>;

    fn state(&self) -> ConnectionPhase;

    /// Verbindungsphase als Stream (mit aktuellem Wert)
    fn state_value(&self) -> watch::Receiver<ConnectionPhase>;

    fn level_updates(&self) -> broadcast::Receiver<LevelUpdate>;

    /// Schaltet einen anderen Teilnehmer stumm (Admin)
    fn toggle_mute(&self, user: &User, mute: bool);

    /// Beendet den Anruf für alle
    fn discard(&self);

    /// Verlässt den Anruf lokal
    fn hangup(&self);
}

// ============================================================================
// GROUP CALL
// ============================================================================

struct CallInner {
    channel: ChannelInfo,
    participants: Vec<Participant>,
}

/// In-Process Gruppenanruf
pub struct GroupCall {
    id: CallId,
    self_user: User,
    inner: Arc<Mutex<CallInner>>,
    database: Arc<InvitesDatabase>,
    mute_tx: watch::Sender<MuteState>,
    state_tx: watch::Sender<ConnectionPhase>,
    level_tx: broadcast::Sender<LevelUpdate>,
}

impl GroupCall {
    /// Erstellt einen neuen Anruf im Kanal
    pub fn new(self_user: User, channel: ChannelInfo, database: Arc<InvitesDatabase>) -> Self {
        Self::with_event_capacity(self_user, channel, database, DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_event_capacity(
        self_user: User,
        channel: ChannelInfo,
        database: Arc<InvitesDatabase>,
        event_capacity: usize,
    ) -> Self {
        let id = CallId::new();
        let (mute_tx, _) = watch::channel(MuteState::Active);
        let (state_tx, _) = watch::channel(ConnectionPhase::Creating);
        let (level_tx, _) = broadcast::channel(event_capacity.max(1));

        tracing::info!("Creating group call {}", id);

        Self {
            id,
            self_user,
            inner: Arc::new(Mutex::new(CallInner {
                channel: ChannelInfo {
                    active_call: Some(id),
                    ..channel
                },
                participants: Vec::new(),
            })),
            database,
            mute_tx,
            state_tx,
            level_tx,
        }
    }

    // ========================================================================
    // ENGINE-SEITIGE EINGÄNGE
    // ========================================================================

    /// Aktualisiert die Verbindungsphase
    pub fn set_state(&self, phase: ConnectionPhase) {
        tracing::debug!("Group call {} state: {:?}", self.id, phase);
        self.state_tx.send_replace(phase);
    }

    /// Ein Benutzer ist beigetreten
    ///
    /// Seine offene Einladung wird dabei entfernt. Der lokale Benutzer
    /// wird nie als Teilnehmer geführt.
    pub fn add_participant(&self, user: User) -> Result<(), CallEngineError> {
        if self.state().is_finished() {
            return Err(CallEngineError::CallEnded);
        }
        if user.id == self.self_user.id {
            tracing::debug!("Ignoring self as participant of group call {}", self.id);
            return Ok(());
        }

        self.database.remove_invited(&self.id, user.id)?;

        let mut inner = self.inner.lock();
        if !inner.participants.iter().any(|p| p.user == user) {
            tracing::info!("User {} joined group call {}", user.id, self.id);
            inner.participants.push(Participant::new(user));
        }
        Ok(())
    }

    /// Ein Teilnehmer hat den Anruf verlassen
    pub fn remove_participant(&self, user_id: UserId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.participants.len();
        inner.participants.retain(|p| p.user.id != user_id);
        before != inner.participants.len()
    }

    /// Neuer Audio-Level
    pub fn push_level(&self, update: LevelUpdate) {
        // Ohne Empfänger schlägt send fehl, das ist in Ordnung
        let _ = self.level_tx.send(update);
    }

    /// Server schaltet den lokalen Benutzer zwangsweise stumm
    pub fn force_mute(&self) {
        tracing::info!("Group call {}: force muted by server", self.id);
        self.mute_tx.send_replace(MuteState::ForceMuted);
    }

    /// Server hebt die Zwangs-Stummschaltung auf
    pub fn lift_force_mute(&self) {
        self.mute_tx.send_if_modified(|mute| {
            if *mute == MuteState::ForceMuted {
                *mute = MuteState::Muted;
                true
            } else {
                false
            }
        });
    }

    /// Ersetzt die Kanal-Informationen
    pub fn set_channel(&self, channel: ChannelInfo) {
        self.inner.lock().channel = channel;
    }

    /// Admin-Mute eines Teilnehmers
    pub fn set_participant_muted(&self, user_id: UserId, mute: bool) -> Result<(), CallEngineError> {
        let mut inner = self.inner.lock();
        let participant = inner
            .participants
            .iter_mut()
            .find(|p| p.user.id == user_id)
            .ok_or(CallEngineError::NotAParticipant(user_id))?;
        participant.muted = mute;
        Ok(())
    }
}

impl GroupCallEngine for GroupCall {
    fn id(&self) -> CallId {
        self.id
    }

    fn channel(&self) -> ChannelInfo {
        self.inner.lock().channel.clone()
    }

    fn self_user(&self) -> User {
        self.self_user.clone()
    }

    fn participants(&self) -> Vec<Participant> {
        self.inner.lock().participants.clone()
    }

    fn invited_to_call_users(&self) -> Vec<User> {
        match self.database.invited_users(&self.id) {
            Ok(users) => users,
            Err(e) => {
                tracing::error!("Failed to load invited users: {}", e);
                Vec::new()
            }
        }
    }

    fn full_count(&self) -> usize {
        // Teilnehmer ∪ Eingeladene ∪ {self}
        let mut users: HashSet<UserId> = self
            .inner
            .lock()
            .participants
            .iter()
            .map(|p| p.user.id)
            .collect();
        users.extend(self.invited_to_call_users().iter().map(|u| u.id));
        users.insert(self.self_user.id);
        users.len()
    }

    fn invite_users(&self, users: Vec<User>) -> BoxFuture<'static, InviteOutcome> {
        let call_id = self.id;
        let database = Arc::clone(&self.database);

        Box::pin(async move {
            // Antwort kommt als späteres Event, nie synchron
            tokio::task::yield_now().await;

            for user in &users {
                if let Err(e) = database.register_invited(&call_id, user) {
                    tracing::error!("Failed to invite user {}: {}", user.id, e);
                    return InviteOutcome::Count(0);
                }
            }

            tracing::info!("Invited {} user(s) to group call {}", users.len(), call_id);

            let mut users = users;
            if users.len() == 1 {
                match users.pop() {
                    Some(user) => InviteOutcome::SingleUser(user),
                    None => InviteOutcome::Count(0),
                }
            } else {
                InviteOutcome::Count(users.len())
            }
        })
    }

    fn muted(&self) -> MuteState {
        *self.mute_tx.borrow()
    }

    fn set_muted(&self, mute: MuteState) {
        if mute == MuteState::ForceMuted {
            tracing::warn!("Force mute can only be set by the server");
            return;
        }
        self.mute_tx.send_if_modified(|current| match *current {
            MuteState::ForceMuted => {
                tracing::warn!("Ignoring mute change while force muted");
                false
            }
            state if state == mute => false,
            _ => {
                tracing::debug!("Group call mute: {:?}", mute);
                *current = mute;
                true
            }
        });
    }

    fn muted_value(&self) -> watch::Receiver<MuteState> {
        self.mute_tx.subscribe()
    }

    fn state(&self) -> ConnectionPhase {
        *self.state_tx.borrow()
    }

    fn state_value(&self) -> watch::Receiver<ConnectionPhase> {
        self.state_tx.subscribe()
    }

    fn level_updates(&self) -> broadcast::Receiver<LevelUpdate> {
        self.level_tx.subscribe()
    }

    fn toggle_mute(&self, user: &User, mute: bool) {
        if !self.channel().can_manage_call {
            tracing::warn!("Cannot mute {}: no call management rights", user.id);
            return;
        }
        if let Err(e) = self.set_participant_muted(user.id, mute) {
            tracing::warn!("Failed to toggle mute: {}", e);
        }
    }

    fn discard(&self) {
        tracing::info!("Discarding group call {}", self.id);

        if let Err(e) = self.database.clear_call(&self.id) {
            tracing::error!("Failed to clear invites: {}", e);
        }

        {
            let mut inner = self.inner.lock();
            inner.participants.clear();
            inner.channel.active_call = None;
        }

        self.set_state(ConnectionPhase::Ended);
    }

    fn hangup(&self) {
        tracing::info!("Leaving group call {}", self.id);
        self.set_state(ConnectionPhase::HangingUp);
        self.set_state(ConnectionPhase::Ended);
    }
}

impl std::fmt::Debug for GroupCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupCall")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("muted", &self.muted())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
