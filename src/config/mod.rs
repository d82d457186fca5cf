//! Config Module
//!
//! Einstellungen aus `settings.json` im Konfigurationsverzeichnis,
//! überschreibbar per Umgebungsvariablen.

mod settings;

pub use settings::{ConfigError, Settings, ENV_DATABASE, ENV_EVENT_CAPACITY, ENV_LOG_FILTER};
