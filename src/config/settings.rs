//! Settings
//!
//! Reihenfolge: Standardwerte, dann `settings.json`, dann Umgebung.
//! Eine fehlende Datei ist kein Fehler.
//!
//! Pfad der Datei:
//! - Linux: `~/.config/group-call/settings.json`
//! - macOS: `~/Library/Application Support/com.groupcall.group-call/settings.json`
//! - Windows: `%APPDATA%/groupcall/group-call/config/settings.json`

use crate::call_engine::DEFAULT_EVENT_CAPACITY;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_LOG_FILTER: &str = "GROUP_CALL_LOG";
pub const ENV_DATABASE: &str = "GROUP_CALL_DB";
pub const ENV_EVENT_CAPACITY: &str = "GROUP_CALL_EVENT_CAPACITY";

const DEFAULT_LOG_FILTER: &str = "group_call_lib=info";

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Could not determine config directory")]
    NoConfigDirectory,
}

// ============================================================================
// SETTINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// tracing Filter-Direktive, z.B. `group_call_lib=debug`
    pub log_filter: String,
    /// `None`: Standard-Pfad im Datenverzeichnis
    pub database_path: Option<PathBuf>,
    /// Kapazität der Level-Streams neuer Anrufe
    pub event_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            database_path: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl Settings {
    /// Lädt die Einstellungen vom Standard-Pfad und wendet die Umgebung an
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Self::load_from_file(&Self::default_path()?)?;
        settings.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(settings)
    }

    /// Liest `path`, Standardwerte wenn die Datei fehlt
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No settings at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        tracing::info!("Loading settings from {:?}", path);
        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Schreibt die Einstellungen nach `path`
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let proj_dirs = directories::ProjectDirs::from("com", "groupcall", "group-call")
            .ok_or(ConfigError::NoConfigDirectory)?;

        let mut path = proj_dirs.config_dir().to_path_buf();
        path.push("settings.json");
        Ok(path)
    }

    /// Überschreibt Werte aus einer Variablen-Quelle
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(filter) = lookup(ENV_LOG_FILTER) {
            self.log_filter = filter;
        }
        if let Some(path) = lookup(ENV_DATABASE) {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(value) = lookup(ENV_EVENT_CAPACITY) {
            self.event_capacity = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: ENV_EVENT_CAPACITY,
                value: value.clone(),
            })?;
        }
        self.validate()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        // broadcast::channel verlangt Kapazität > 0
        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                name: "event_capacity",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from_file(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.event_capacity, DEFAULT_EVENT_CAPACITY);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "log_filter": "group_call_lib=debug" }"#).unwrap();

        let settings = Settings::load_from_file(&path).unwrap();
        assert_eq!(settings.log_filter, "group_call_lib=debug");
        assert_eq!(settings.database_path, None);
        assert_eq!(settings.event_capacity, DEFAULT_EVENT_CAPACITY);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            log_filter: "warn".to_string(),
            database_path: Some(dir.path().join("invites.db")),
            event_capacity: 16,
        };

        settings.save_to_file(&path).unwrap();
        assert_eq!(Settings::load_from_file(&path).unwrap(), settings);
    }

    #[test]
    fn test_invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            Settings::load_from_file(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings
            .apply_overrides(lookup_from(&[
                (ENV_LOG_FILTER, "trace"),
                (ENV_DATABASE, "/tmp/calls.db"),
                (ENV_EVENT_CAPACITY, " 32 "),
            ]))
            .unwrap();

        assert_eq!(settings.log_filter, "trace");
        assert_eq!(settings.database_path, Some(PathBuf::from("/tmp/calls.db")));
        assert_eq!(settings.event_capacity, 32);
    }

    #[test]
    fn test_invalid_capacity_rejected() {
        let mut settings = Settings::default();
        let result = settings.apply_overrides(lookup_from(&[(ENV_EVENT_CAPACITY, "lots")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { name, .. }) if name == ENV_EVENT_CAPACITY
        ));

        let result = settings.apply_overrides(lookup_from(&[(ENV_EVENT_CAPACITY, "0")]));
        assert!(result.is_err());
    }
}
