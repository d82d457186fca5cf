//! Invite Module - Einladungsdialog
//!
//! Dieses Modul verwaltet:
//! - Filterung der Kandidaten (self, Bots, bereits drin)
//! - Auswahl und Zähler "x / y" eines geöffneten Dialogs
//! - Übergabe der Auswahl an die Engine und Einordnung des Ergebnisses

mod filter;
mod notice;
mod session;

pub use filter::{ParticipantFilter, RowDisposition};
pub use notice::InviteNotice;
pub use session::{CounterDisplay, InviteSession, Row};
