//! Panel Module - Fenster eines laufenden Gruppenanrufs
//!
//! Dieses Modul verwaltet:
//! - Bindung an genau einen Anruf (schwach gehalten)
//! - Mute-Button, Einladungsdialog und Verlassen-Dialog
//! - Events für die Darstellung (Toasts, Verstecken)

mod controller;

pub use controller::{GroupPanel, LeaveAction, LeaveBox, PanelEvent};
