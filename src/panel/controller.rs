//! Group Panel Controller
//!
//! Die nicht-visuelle Logik hinter dem Panel eines Gruppenanrufs.
//! Das Panel hält den Anruf nur schwach: endet der Anruf, während ein
//! Dialog offen ist, werden dessen Aktionen still verworfen.

use crate::call_engine::{CallId, GroupCallEngine, Lifetime, User};
use crate::invite::{InviteNotice, InviteSession};
use crate::mute::MuteReconciler;
use serde::Serialize;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;

/// Kapazität des Panel-Event-Streams
const EVENT_CAPACITY: usize = 100;

// ============================================================================
// EVENTS
// ============================================================================

/// Wie der Anruf verlassen wurde
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveAction {
    /// Anruf für alle beendet
    Discard,
    /// Nur lokal verlassen
    Hangup,
}

/// Events für die Darstellung
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum PanelEvent {
    Toast(InviteNotice),
    Left(LeaveAction),
    Hidden,
}

// ============================================================================
// LEAVE BOX
// ============================================================================

/// Bestätigungsdialog zum Verlassen
#[derive(Debug)]
pub struct LeaveBox {
    call: Weak<dyn GroupCallEngine>,
    shows_discard_option: bool,
    discard_checked: bool,
    event_tx: broadcast::Sender<PanelEvent>,
}

impl LeaveBox {
    /// Checkbox "Anruf beenden" nur mit Verwaltungsrechten
    pub fn shows_discard_option(&self) -> bool {
        self.shows_discard_option
    }

    /// Vorbelegung der Checkbox
    pub fn discard_checked(&self) -> bool {
        self.discard_checked
    }

    /// Bestätigt den Dialog
    ///
    /// `None` wenn der Anruf inzwischen nicht mehr existiert.
    pub fn confirm(self, discard_checked: bool) -> Option<LeaveAction> {
        let discard = self.shows_discard_option && discard_checked;
        let call = self.call.upgrade()?;

        let action = if discard {
            call.discard();
            LeaveAction::Discard
        } else {
            call.hangup();
            LeaveAction::Hangup
        };

        let _ = self.event_tx.send(PanelEvent::Left(action));
        Some(action)
    }
}

// ============================================================================
// GROUP PANEL
// ============================================================================

pub struct GroupPanel {
    call: Option<Weak<dyn GroupCallEngine>>,
    call_id: Option<CallId>,
    mute: MuteReconciler,
    call_lifetime: Lifetime,
    event_tx: broadcast::Sender<PanelEvent>,
}

impl GroupPanel {
    /// Erstellt ein Panel ohne Anruf
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            call: None,
            call_id: None,
            mute: MuteReconciler::new(),
            call_lifetime: Lifetime::new(),
            event_tx,
        }
    }

    /// Erstellt ein Panel und bindet es an den Anruf
    pub fn for_call(call: &Arc<dyn GroupCallEngine>) -> Self {
        let mut panel = Self::new();
        panel.init_with_call(Some(call));
        panel
    }

    /// Bindet das Panel an einen (anderen) Anruf
    ///
    /// Alle Listener des vorherigen Anrufs werden beendet. Mit einem Anruf
    /// muss das innerhalb einer tokio Runtime passieren.
    pub fn init_with_call(&mut self, call: Option<&Arc<dyn GroupCallEngine>>) {
        self.call_lifetime.destroy();
        self.call = call.map(Arc::downgrade);
        self.call_id = call.map(|c| c.id());

        if let Some(call) = call {
            tracing::info!("Panel bound to group call {}", call.id());
            let lifetime = self.mute.attach(call.as_ref());
            self.call_lifetime.extend(lifetime);
        }
    }

    /// Gibt einen Event-Receiver zurück
    pub fn subscribe(&self) -> broadcast::Receiver<PanelEvent> {
        self.event_tx.subscribe()
    }

    pub fn mute(&self) -> &MuteReconciler {
        &self.mute
    }

    pub fn call_id(&self) -> Option<CallId> {
        self.call_id
    }

    fn call(&self) -> Option<Arc<dyn GroupCallEngine>> {
        self.call.as_ref().and_then(Weak::upgrade)
    }

    /// Klick auf den Mute-Button
    pub fn mute_clicked(&self) -> bool {
        match self.call() {
            Some(call) => MuteReconciler::click(call.as_ref()),
            None => false,
        }
    }

    /// Mute-Anfrage aus der Teilnehmerliste
    pub fn member_mute_request(&self, user: &User, mute: bool) {
        if let Some(call) = self.call() {
            call.toggle_mute(user, mute);
        }
    }

    /// Öffnet den Einladungsdialog
    ///
    /// Nur wenn der Kanal noch genau diesen Anruf führt.
    pub fn open_invite(&self) -> Option<InviteSession> {
        let call = self.call()?;
        if call.channel().active_call != Some(call.id()) {
            tracing::debug!("Channel moved on from group call {}", call.id());
            return None;
        }
        Some(InviteSession::from_call(call.as_ref()))
    }

    /// Bestätigt den Einladungsdialog
    ///
    /// Bei Erfolg kommt die Bestätigung auch als `PanelEvent::Toast`.
    pub async fn confirm_invite(&self, session: &InviteSession) -> Option<InviteNotice> {
        let call = self.call.clone()?;
        let outcome = session.submit(call).await?;
        let notice = InviteNotice::from_outcome(&outcome)?;

        let _ = self.event_tx.send(PanelEvent::Toast(notice.clone()));
        Some(notice)
    }

    /// Öffnet den Bestätigungsdialog zum Verlassen
    pub fn leave_box(&self, discard_checked: bool) -> Option<LeaveBox> {
        let call = self.call()?;
        Some(LeaveBox {
            call: Arc::downgrade(&call),
            shows_discard_option: call.channel().can_manage_call,
            discard_checked,
            event_tx: self.event_tx.clone(),
        })
    }

    /// Fenster soll geschlossen werden
    ///
    /// Solange ein Anruf läuft, wird nur versteckt (`true`).
    pub fn handle_close(&self) -> bool {
        if self.call().is_some() {
            let _ = self.event_tx.send(PanelEvent::Hidden);
            true
        } else {
            false
        }
    }

    pub fn close_before_destroy(&mut self) {
        self.init_with_call(None);
    }
}

impl Default for GroupPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GroupPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupPanel")
            .field("call_id", &self.call_id)
            .field("mute", &self.mute)
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_engine::{ChannelInfo, ConnectionPhase, GroupCall, MuteState};
    use crate::database::InvitesDatabase;
    use crate::mute::MuteDisplayState;
    use std::time::Duration;

    fn new_call(can_manage_call: bool) -> Arc<GroupCall> {
        let db = Arc::new(InvitesDatabase::open_in_memory().unwrap());
        Arc::new(GroupCall::new(
            User::myself(1, "Me"),
            ChannelInfo {
                members_count: 8,
                can_manage_call,
                active_call: None,
            },
            db,
        ))
    }

    fn as_engine(call: &Arc<GroupCall>) -> Arc<dyn GroupCallEngine> {
        Arc::clone(call) as Arc<dyn GroupCallEngine>
    }

    #[tokio::test]
    async fn test_close_hides_while_call_alive() {
        let call = new_call(false);
        let mut panel = GroupPanel::for_call(&as_engine(&call));
        let mut events = panel.subscribe();

        assert!(panel.handle_close());
        assert_eq!(events.recv().await.unwrap(), PanelEvent::Hidden);

        panel.close_before_destroy();
        assert!(!panel.handle_close());
        assert_eq!(panel.call_id(), None);
    }

    #[tokio::test]
    async fn test_mute_click_through_panel() {
        let call = new_call(false);
        call.set_state(ConnectionPhase::Joined);
        let panel = GroupPanel::for_call(&as_engine(&call));

        assert_eq!(panel.mute().current(), MuteDisplayState::Active);
        assert!(panel.mute_clicked());
        assert_eq!(call.muted(), MuteState::Muted);

        let mut display = panel.mute().display();
        tokio::time::timeout(
            Duration::from_secs(1),
            display.wait_for(|s| *s == MuteDisplayState::Muted),
        )
        .await
        .unwrap()
        .unwrap();
    }

    #[tokio::test]
    async fn test_rebinding_resets_listeners() {
        let first = new_call(false);
        let second = new_call(false);
        second.set_state(ConnectionPhase::Joined);

        let mut panel = GroupPanel::for_call(&as_engine(&first));
        assert_eq!(panel.mute().current(), MuteDisplayState::Connecting);

        panel.init_with_call(Some(&as_engine(&second)));
        assert_eq!(panel.call_id(), Some(second.id()));
        assert_eq!(panel.mute().current(), MuteDisplayState::Active);

        // Der alte Anruf beeinflusst den Button nicht mehr
        first.set_state(ConnectionPhase::Connecting);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(panel.mute().current(), MuteDisplayState::Active);
    }

    #[tokio::test]
    async fn test_invite_requires_matching_channel_call() {
        let call = new_call(false);
        let panel = GroupPanel::for_call(&as_engine(&call));
        assert!(panel.open_invite().is_some());

        call.set_channel(ChannelInfo {
            active_call: None,
            ..call.channel()
        });
        assert!(panel.open_invite().is_none());
    }

    #[tokio::test]
    async fn test_confirm_invite_emits_toast() {
        let call = new_call(false);
        let panel = GroupPanel::for_call(&as_engine(&call));
        let mut events = panel.subscribe();

        let mut session = panel.open_invite().unwrap();
        session.toggle_row(&User::new(10, "Alice"));

        let notice = panel.confirm_invite(&session).await;
        let expected = InviteNotice::User {
            first_name: "Alice".to_string(),
        };
        assert_eq!(notice, Some(expected.clone()));
        assert_eq!(events.recv().await.unwrap(), PanelEvent::Toast(expected));
    }

    #[tokio::test]
    async fn test_empty_invite_has_no_toast() {
        let call = new_call(false);
        let panel = GroupPanel::for_call(&as_engine(&call));
        let mut events = panel.subscribe();

        let session = panel.open_invite().unwrap();
        assert_eq!(panel.confirm_invite(&session).await, None);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_leave_without_rights_hangs_up() {
        let call = new_call(false);
        let panel = GroupPanel::for_call(&as_engine(&call));

        let leave = panel.leave_box(true).unwrap();
        assert!(!leave.shows_discard_option());
        assert_eq!(leave.confirm(true), Some(LeaveAction::Hangup));
        assert_eq!(call.channel().active_call, Some(call.id()));
    }

    #[tokio::test]
    async fn test_leave_with_discard() {
        let call = new_call(true);
        let panel = GroupPanel::for_call(&as_engine(&call));
        let mut events = panel.subscribe();

        let leave = panel.leave_box(false).unwrap();
        assert!(leave.shows_discard_option());
        assert!(!leave.discard_checked());
        assert_eq!(leave.confirm(true), Some(LeaveAction::Discard));
        assert_eq!(call.state(), ConnectionPhase::Ended);
        assert_eq!(
            events.recv().await.unwrap(),
            PanelEvent::Left(LeaveAction::Discard)
        );
    }

    #[tokio::test]
    async fn test_leave_after_call_gone_is_noop() {
        let call = new_call(true);
        let engine = as_engine(&call);
        let panel = GroupPanel::for_call(&engine);

        let leave = panel.leave_box(true).unwrap();
        drop(engine);
        drop(call);

        assert_eq!(leave.confirm(true), None);
        assert!(panel.leave_box(false).is_none());
        assert!(!panel.mute_clicked());
    }
}
