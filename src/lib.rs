//! Group Call Core
//!
//! Die Koordinationslogik hinter dem Panel eines Gruppenanrufs:
//! - Einladungsdialog (Filter, Auswahl, Zähler "x / y")
//! - Mute-Button (Zustand aus Mute-Status und Verbindungsphase)
//! - Panel-Controller (Verlassen, Schließen, Einladungen bestätigen)
//! - SQLite für offene Einladungen

pub mod call_engine;
pub mod config;
pub mod database;
pub mod invite;
pub mod mute;
pub mod panel;

use anyhow::{anyhow, Context};
use call_engine::{CallId, ChannelInfo, GroupCall, GroupCallEngine, User};
use config::Settings;
use database::{DatabaseError, InvitesDatabase};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub use invite::{InviteNotice, InviteSession};
pub use mute::{MuteDisplayState, MuteReconciler};
pub use panel::{GroupPanel, LeaveAction, PanelEvent};

// ============================================================================
// LOGGING
// ============================================================================

/// Installiert den tracing Subscriber
///
/// `RUST_LOG` hat Vorrang vor `default_filter`. Weitere Aufrufe haben
/// keine Wirkung.
pub fn init_logging(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("Logging already initialized");
    }
}

// ============================================================================
// APPLICATION STATE
// ============================================================================

/// Globaler Application State
pub struct AppState {
    settings: Settings,
    database: Arc<InvitesDatabase>,
    calls: RwLock<HashMap<CallId, Arc<GroupCall>>>,
}

/// Singleton für den AppState
static APP_STATE: OnceCell<Arc<AppState>> = OnceCell::new();

impl AppState {
    /// Erstellt den State ohne ihn global zu registrieren
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let database = open_database(&settings).context("Failed to open invites database")?;
        tracing::info!("Database opened");

        Ok(Self {
            settings,
            database: Arc::new(database),
            calls: RwLock::new(HashMap::new()),
        })
    }

    /// Initialisiert Logging und den globalen Application State
    pub fn init(settings: Settings) -> anyhow::Result<Arc<Self>> {
        init_logging(&settings.log_filter);
        tracing::info!("Initializing group call core...");

        let state = Arc::new(Self::new(settings)?);

        APP_STATE
            .set(Arc::clone(&state))
            .map_err(|_| anyhow!("AppState already initialized"))?;

        Ok(state)
    }

    /// Lädt die Einstellungen und initialisiert den State
    pub fn init_from_environment() -> anyhow::Result<Arc<Self>> {
        let settings = Settings::load().context("Failed to load settings")?;
        Self::init(settings)
    }

    /// Gibt den globalen AppState zurück
    pub fn get() -> Option<Arc<Self>> {
        APP_STATE.get().cloned()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn database(&self) -> Arc<InvitesDatabase> {
        Arc::clone(&self.database)
    }

    /// Startet einen Gruppenanruf im Kanal
    ///
    /// Der Anruf bleibt registriert, bis er endet oder fehlschlägt.
    /// Muss innerhalb einer tokio Runtime aufgerufen werden.
    pub fn start_group_call(self: &Arc<Self>, self_user: User, channel: ChannelInfo) -> Arc<GroupCall> {
        let call = Arc::new(GroupCall::with_event_capacity(
            self_user,
            channel,
            Arc::clone(&self.database),
            self.settings.event_capacity,
        ));
        let call_id = call.id();
        self.calls.write().insert(call_id, Arc::clone(&call));

        // Beendete Anrufe austragen
        let mut state_rx = call.state_value();
        let state = Arc::downgrade(self);
        tokio::spawn(async move {
            while state_rx.changed().await.is_ok() {
                let phase = *state_rx.borrow_and_update();
                if phase.is_finished() {
                    tracing::info!("Group call {} finished ({:?})", call_id, phase);
                    if let Some(state) = state.upgrade() {
                        state.calls.write().remove(&call_id);
                    }
                    break;
                }
            }
        });

        call
    }

    pub fn call(&self, call_id: &CallId) -> Option<Arc<GroupCall>> {
        self.calls.read().get(call_id).cloned()
    }

    pub fn active_calls(&self) -> Vec<Arc<GroupCall>> {
        self.calls.read().values().cloned().collect()
    }
}

fn open_database(settings: &Settings) -> Result<InvitesDatabase, DatabaseError> {
    match &settings.database_path {
        Some(path) => InvitesDatabase::open(path),
        None => InvitesDatabase::open_default(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use call_engine::ConnectionPhase;
    use std::time::Duration;

    fn temp_state(dir: &tempfile::TempDir) -> Arc<AppState> {
        let settings = Settings {
            database_path: Some(dir.path().join("invites.db")),
            event_capacity: 8,
            ..Settings::default()
        };
        Arc::new(AppState::new(settings).unwrap())
    }

    fn channel() -> ChannelInfo {
        ChannelInfo {
            members_count: 3,
            can_manage_call: true,
            active_call: None,
        }
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging("group_call_lib=debug");
        init_logging("warn");
    }

    #[tokio::test]
    async fn test_finished_call_is_unregistered() {
        let dir = tempfile::tempdir().unwrap();
        let state = temp_state(&dir);

        let call = state.start_group_call(User::myself(1, "Me"), channel());
        assert!(state.call(&call.id()).is_some());
        assert_eq!(call.channel().active_call, Some(call.id()));

        call.set_state(ConnectionPhase::Joined);
        call.hangup();

        tokio::time::timeout(Duration::from_secs(1), async {
            while state.call(&call.id()).is_some() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("call still registered");
        assert!(state.active_calls().is_empty());
    }

    #[tokio::test]
    async fn test_calls_share_database() {
        let dir = tempfile::tempdir().unwrap();
        let state = temp_state(&dir);

        let first = state.start_group_call(User::myself(1, "Me"), channel());
        let second = state.start_group_call(User::myself(1, "Me"), channel());
        assert_eq!(state.active_calls().len(), 2);

        first.invite_users(vec![User::new(10, "Alice")]).await;

        let db = state.database();
        assert!(db.is_invited(&first.id(), call_engine::UserId(10)).unwrap());
        assert!(!db.is_invited(&second.id(), call_engine::UserId(10)).unwrap());
    }
}
