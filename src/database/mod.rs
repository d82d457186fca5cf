//! Database Module
//!
//! SQLite-Registry der offenen Einladungen pro Gruppenanruf.
//! Ein Benutzer bleibt hier stehen, bis er dem Anruf beitritt oder der
//! Anruf beendet wird.

mod invites;

pub use invites::{DatabaseError, InviteRecord, InvitesDatabase};
