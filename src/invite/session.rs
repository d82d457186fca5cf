//! Invite Session
//!
//! Zustand eines geöffneten Einladungsdialogs: wer schon drin ist, wer
//! übersprungen wurde, wer ausgewählt ist. Daraus entsteht der Zähler
//! "x / y" im Titel. Beim Bestätigen geht die Auswahl an die Engine.

use super::filter::{ParticipantFilter, RowDisposition};
use crate::call_engine::{GroupCallEngine, InviteOutcome, User, UserId};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Weak;
use tokio::sync::watch;

// ============================================================================
// COUNTERS
// ============================================================================

/// Zähler im Dialogtitel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterDisplay {
    pub in_or_invited: usize,
    pub can_be_invited: usize,
}

impl fmt::Display for CounterDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.in_or_invited, self.can_be_invited)
    }
}

/// Eine Zeile im Dialog
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub user: User,
    pub disposition: RowDisposition,
}

// ============================================================================
// INVITE SESSION
// ============================================================================

pub struct InviteSession {
    filter: ParticipantFilter,
    /// Untergrenze, falls die gemeldete Anzahl hinterherhinkt
    full_in_count: usize,
    channel_members_count: usize,
    rows: HashSet<UserId>,
    selection: BTreeMap<UserId, User>,
    title_tx: watch::Sender<Option<CounterDisplay>>,
}

impl InviteSession {
    /// Erstellt eine Session
    ///
    /// AlreadyIn = eingeladene ∪ Teilnehmer ∪ {self}.
    pub fn new(
        channel_members_count: usize,
        participants: impl IntoIterator<Item = User>,
        invited_pending: impl IntoIterator<Item = User>,
        self_user: &User,
        reported_full_count: usize,
    ) -> Self {
        let mut already_in: HashSet<UserId> = invited_pending
            .into_iter()
            .chain(participants)
            .map(|user| user.id)
            .collect();
        already_in.insert(self_user.id);

        let full_in_count = reported_full_count.max(already_in.len());

        let mut filter = ParticipantFilter::new(already_in);
        filter.skip(self_user.id);

        let (title_tx, _) = watch::channel(None);

        Self {
            filter,
            full_in_count,
            channel_members_count,
            rows: HashSet::new(),
            selection: BTreeMap::new(),
            title_tx,
        }
    }

    /// Erstellt eine Session aus dem aktuellen Zustand des Anrufs
    pub fn from_call(call: &dyn GroupCallEngine) -> Self {
        Self::new(
            call.channel().members_count,
            call.participants().into_iter().map(|p| p.user),
            call.invited_to_call_users(),
            &call.self_user(),
            call.full_count(),
        )
    }

    /// Bewertet die erste Seite der Kandidaten und setzt den Titel
    pub fn prepare(&mut self, candidates: &[User]) -> Vec<Row> {
        let rows = candidates
            .iter()
            .filter_map(|candidate| {
                let disposition = self.evaluate(candidate);
                disposition.produces_row().then(|| Row {
                    user: candidate.clone(),
                    disposition,
                })
            })
            .collect();
        self.update_title();
        rows
    }

    /// Bewertet einen nachgeladenen Kandidaten
    pub fn create_row(&mut self, candidate: &User) -> RowDisposition {
        let disposition = self.evaluate(candidate);
        if disposition == (RowDisposition::Omit { newly_skipped: true }) {
            self.update_title();
        }
        disposition
    }

    /// Klick auf eine Zeile
    ///
    /// Gibt den neuen Auswahlzustand zurück. Bereits-drin-Zeilen sind in
    /// der Darstellung nicht klickbar, das wird hier nicht geprüft.
    pub fn toggle_row(&mut self, user: &User) -> bool {
        let checked = if self.selection.remove(&user.id).is_some() {
            false
        } else {
            self.selection.insert(user.id, user.clone());
            true
        };
        tracing::debug!("Invite row {} checked: {}", user.id, checked);
        self.update_title();
        checked
    }

    /// Entfernt einen Benutzer aus der Auswahl
    pub fn deselect(&mut self, user_id: UserId) {
        self.selection.remove(&user_id);
        self.update_title();
    }

    pub fn is_selected(&self, user_id: UserId) -> bool {
        self.selection.contains_key(&user_id)
    }

    pub fn selected_count(&self) -> usize {
        self.selection.len()
    }

    /// Ausgewählte Benutzer, nach ID sortiert
    pub fn selected_users(&self) -> Vec<User> {
        self.selection.values().cloned().collect()
    }

    pub fn already_in_count(&self) -> usize {
        self.full_in_count.max(self.filter.already_in_len())
    }

    pub fn full_count(&self) -> usize {
        self.already_in_count() + self.selection.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.filter.skipped_len()
    }

    /// Berechnet den Zähler "x / y"
    ///
    /// `None` wenn die Gesamtzahl unbekannt (null) ist.
    pub fn compute_counters(&self) -> Option<CounterDisplay> {
        // minus self
        let in_or_invited = self.full_count().saturating_sub(1);
        let can_be_invited = self
            .rows
            .len()
            .max(
                self.channel_members_count
                    .saturating_sub(self.filter.skipped_len()),
            )
            .max(in_or_invited);

        (can_be_invited > 0).then_some(CounterDisplay {
            in_or_invited,
            can_be_invited,
        })
    }

    /// Titel-Zähler als Stream
    pub fn title(&self) -> watch::Receiver<Option<CounterDisplay>> {
        self.title_tx.subscribe()
    }

    /// Schickt die Auswahl an die Engine
    ///
    /// Ist der Anruf schon weg (vor oder während der Anfrage), passiert
    /// nichts und es kommt `None` zurück.
    ///
    /// # Panics
    /// Wenn die Auswahl den lokalen Benutzer oder einen Bot enthält.
    pub async fn submit(&self, call: Weak<dyn GroupCallEngine>) -> Option<InviteOutcome> {
        let users = self.selected_users();
        assert!(
            users.iter().all(User::is_invitable),
            "invite selection must only contain other human users"
        );

        let request = {
            let Some(engine) = call.upgrade() else {
                tracing::debug!("Group call gone before invite, dropping selection");
                return None;
            };
            engine.invite_users(users)
        };

        let outcome = request.await;

        if call.strong_count() == 0 {
            tracing::debug!("Group call gone before invite result, ignoring");
            return None;
        }
        Some(outcome)
    }

    fn evaluate(&mut self, candidate: &User) -> RowDisposition {
        let disposition = self.filter.evaluate(candidate);
        if disposition.produces_row() {
            self.rows.insert(candidate.id);
        }
        disposition
    }

    fn update_title(&self) {
        self.title_tx.send_replace(self.compute_counters());
    }
}

impl fmt::Debug for InviteSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InviteSession")
            .field("already_in", &self.already_in_count())
            .field("selected", &self.selection.len())
            .field("skipped", &self.filter.skipped_len())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
