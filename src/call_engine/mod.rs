//! Call Engine Module - Gruppenanruf
//!
//! Dieses Modul verwaltet:
//! - Identitäten, Mute- und Verbindungszustände
//! - Die Engine-Schnittstelle (Teilnehmer, Einladungen, Streams)
//! - Subscription Handles für Listener auf den Streams

mod engine;
mod subscription;
mod types;

pub use engine::{CallEngineError, GroupCall, GroupCallEngine, DEFAULT_EVENT_CAPACITY};
pub use subscription::{Lifetime, Subscription};
pub use types::{
    CallId, ChannelInfo, ConnectionPhase, InviteOutcome, LevelUpdate, MuteState, Participant,
    User, UserId,
};
