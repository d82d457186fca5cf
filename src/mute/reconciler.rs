//! Mute Reconciler
//!
//! Leitet aus (MuteState, ConnectionPhase) den Zustand des Mute-Buttons ab
//! und reicht den eigenen Audio-Level an die Anzeige weiter. Beides läuft
//! getrennt: Level-Updates ändern den Button nicht und umgekehrt.

use crate::call_engine::{
    ConnectionPhase, GroupCallEngine, Lifetime, MuteState, Subscription,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

// ============================================================================
// DISPLAY STATE
// ============================================================================

/// Was der Mute-Button anzeigt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MuteDisplayState {
    Connecting,
    ForceMuted,
    /// Klick hebt die Stummschaltung auf
    Muted,
    /// Klick schaltet stumm
    Active,
}

impl MuteDisplayState {
    /// Reagiert der Button auf Klicks?
    pub fn is_actionable(self) -> bool {
        matches!(self, MuteDisplayState::Muted | MuteDisplayState::Active)
    }
}

/// Reine Ableitung des Button-Zustands
pub fn derive_display_state(mute: MuteState, phase: ConnectionPhase) -> MuteDisplayState {
    if phase.is_connecting() {
        return MuteDisplayState::Connecting;
    }
    match mute {
        MuteState::ForceMuted => MuteDisplayState::ForceMuted,
        MuteState::Muted => MuteDisplayState::Muted,
        MuteState::Active => MuteDisplayState::Active,
    }
}

// ============================================================================
// MUTE RECONCILER
// ============================================================================

pub struct MuteReconciler {
    display_tx: Arc<watch::Sender<MuteDisplayState>>,
    level_tx: Arc<watch::Sender<f32>>,
}

impl MuteReconciler {
    pub fn new() -> Self {
        let (display_tx, _) = watch::channel(MuteDisplayState::Connecting);
        let (level_tx, _) = watch::channel(0.0);
        Self {
            display_tx: Arc::new(display_tx),
            level_tx: Arc::new(level_tx),
        }
    }

    /// Button-Zustand als Stream
    pub fn display(&self) -> watch::Receiver<MuteDisplayState> {
        self.display_tx.subscribe()
    }

    /// Eigener Audio-Level als Stream
    pub fn level(&self) -> watch::Receiver<f32> {
        self.level_tx.subscribe()
    }

    pub fn current(&self) -> MuteDisplayState {
        *self.display_tx.borrow()
    }

    /// Hört auf die Streams des Anrufs
    ///
    /// Die Listener laufen so lange wie die zurückgegebene Lifetime oder
    /// bis der Anruf seine Streams schließt. Muss innerhalb einer tokio
    /// Runtime aufgerufen werden.
    pub fn attach(&self, call: &dyn GroupCallEngine) -> Lifetime {
        let mut lifetime = Lifetime::new();

        let mut mute_rx = call.muted_value();
        let mut state_rx = call.state_value();
        publish(
            &self.display_tx,
            derive_display_state(*mute_rx.borrow_and_update(), *state_rx.borrow_and_update()),
        );

        let display_tx = Arc::clone(&self.display_tx);
        lifetime.add(Subscription::spawn(async move {
            loop {
                tokio::select! {
                    changed = mute_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    changed = state_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                let display = derive_display_state(
                    *mute_rx.borrow_and_update(),
                    *state_rx.borrow_and_update(),
                );
                publish(&display_tx, display);
            }
        }));

        let mut levels = call.level_updates();
        let level_tx = Arc::clone(&self.level_tx);
        lifetime.add(Subscription::spawn(async move {
            loop {
                match levels.recv().await {
                    Ok(update) if update.is_self => {
                        level_tx.send_replace(update.value);
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!("Level stream lagged, skipped {} updates", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));

        lifetime
    }

    /// Klick auf den Mute-Button
    ///
    /// Wechselt Active <-> Muted. Bei ForceMuted passiert nichts.
    pub fn click(call: &dyn GroupCallEngine) -> bool {
        let next = match call.muted() {
            MuteState::ForceMuted => {
                tracing::debug!("Mute click ignored: force muted");
                return false;
            }
            MuteState::Active => MuteState::Muted,
            MuteState::Muted => MuteState::Active,
        };
        call.set_muted(next);
        true
    }
}

impl Default for MuteReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MuteReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MuteReconciler")
            .field("display", &self.current())
            .field("level", &*self.level_tx.borrow())
            .finish()
    }
}

fn publish(display_tx: &watch::Sender<MuteDisplayState>, next: MuteDisplayState) {
    display_tx.send_if_modified(|current| {
        if *current == next {
            return false;
        }
        tracing::debug!("Mute button state: {:?}", next);
        *current = next;
        true
    });
}

// ============================================================================
// TESTS
// ============================================================================
