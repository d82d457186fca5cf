//! Participant Filter
//!
//! Entscheidet pro Kandidat, ob und wie er im Einladungsdialog erscheint.

use crate::call_engine::{User, UserId};
use serde::Serialize;
use std::collections::HashSet;

/// Wie ein Kandidat im Dialog dargestellt wird
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowDisposition {
    /// Keine Zeile (lokaler Benutzer oder Bot)
    ///
    /// `newly_skipped` ist genau dann gesetzt, wenn der Kandidat zum ersten
    /// Mal übersprungen wurde und die Zähler neu berechnet werden müssen.
    Omit { newly_skipped: bool },
    /// Normale, auswählbare Zeile
    Selectable,
    /// Bereits im Anruf oder eingeladen: angehakt, nicht auswählbar
    DisabledChecked,
}

impl RowDisposition {
    pub fn produces_row(self) -> bool {
        !matches!(self, RowDisposition::Omit { .. })
    }
}

/// Filter mit festem AlreadyIn-Set und wachsendem Skipped-Set
#[derive(Debug, Clone)]
pub struct ParticipantFilter {
    already_in: HashSet<UserId>,
    skipped: HashSet<UserId>,
}

impl ParticipantFilter {
    pub fn new(already_in: HashSet<UserId>) -> Self {
        Self {
            already_in,
            skipped: HashSet::new(),
        }
    }

    /// Bewertet einen Kandidaten
    pub fn evaluate(&mut self, candidate: &User) -> RowDisposition {
        if !candidate.is_invitable() {
            return RowDisposition::Omit {
                newly_skipped: self.skip(candidate.id),
            };
        }
        if self.is_already_in(candidate.id) {
            RowDisposition::DisabledChecked
        } else {
            RowDisposition::Selectable
        }
    }

    /// Markiert einen Benutzer als übersprungen
    ///
    /// Gibt `true` zurück wenn er neu hinzukam.
    pub fn skip(&mut self, user_id: UserId) -> bool {
        self.skipped.insert(user_id)
    }

    pub fn is_already_in(&self, user_id: UserId) -> bool {
        self.already_in.contains(&user_id)
    }

    pub fn already_in_len(&self) -> usize {
        self.already_in.len()
    }

    pub fn skipped_len(&self) -> usize {
        self.skipped.len()
    }

    pub fn is_skipped(&self, user_id: UserId) -> bool {
        self.skipped.contains(&user_id)
    }
}
