//! Mute Module - Zustand des Mute-Buttons
//!
//! Reine Ableitung aus Mute-Status und Verbindungsphase, plus
//! Weiterleitung des eigenen Audio-Levels.

mod reconciler;

pub use reconciler::{derive_display_state, MuteDisplayState, MuteReconciler};
