//! Invites Database
//!
//! Speichert pro Anruf die eingeladenen, aber noch nicht beigetretenen
//! Benutzer. Daraus entsteht zusammen mit den Teilnehmern die Menge der
//! Benutzer, die im Einladungsdialog bereits als "drin" gelten.

use crate::call_engine::{CallId, User, UserId};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create database directory: {0}")]
    DirectoryCreation(#[from] std::io::Error),

    #[error("Could not determine app data directory")]
    NoDataDirectory,
}

// ============================================================================
// INVITE RECORD
// ============================================================================

/// Eine offene Einladung
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteRecord {
    pub call_id: CallId,
    pub user: User,
    /// Unix-Zeitstempel in Millisekunden
    pub invited_at: i64,
}

// ============================================================================
// DATABASE
// ============================================================================

/// SQLite-Datenbank für offene Einladungen (Thread-safe durch Mutex)
pub struct InvitesDatabase {
    conn: Mutex<Connection>,
}

impl InvitesDatabase {
    /// Öffnet die Datenbank am Standard-Pfad
    pub fn open_default() -> Result<Self, DatabaseError> {
        Self::open(&Self::default_path()?)
    }

    /// Öffnet oder erstellt die Datenbank unter `path`
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!("Opening invites database at {:?}", path);

        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;

        Ok(db)
    }

    /// In-Memory Datenbank (Tests und kurzlebige Anrufe)
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Ermittelt den Pfad zur Datenbank-Datei
    pub fn default_path() -> Result<PathBuf, DatabaseError> {
        let proj_dirs = directories::ProjectDirs::from("com", "groupcall", "group-call")
            .ok_or(DatabaseError::NoDataDirectory)?;

        let mut path = proj_dirs.data_dir().to_path_buf();
        path.push("invites.db");
        Ok(path)
    }

    fn init_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS invited_users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                call_id TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                first_name TEXT NOT NULL,
                is_bot INTEGER NOT NULL DEFAULT 0,
                invited_at INTEGER NOT NULL,
                UNIQUE(call_id, user_id)
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE INDEX IF NOT EXISTS idx_invited_users_call_id ON invited_users(call_id)
            "#,
            [],
        )?;

        Ok(())
    }

    /// Registriert eine Einladung
    ///
    /// Gibt `true` zurück wenn der Benutzer vorher noch nicht eingeladen war.
    pub fn register_invited(&self, call_id: &CallId, user: &User) -> Result<bool, DatabaseError> {
        let conn = self.conn.lock();
        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO invited_users (call_id, user_id, first_name, is_bot, invited_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                call_id.to_string(),
                user.id.0 as i64,
                user.first_name,
                user.is_bot as i32,
                Utc::now().timestamp_millis()
            ],
        )?;
        Ok(inserted == 1)
    }

    /// Alle offenen Einladungen eines Anrufs
    pub fn invited_records(&self, call_id: &CallId) -> Result<Vec<InviteRecord>, DatabaseError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT user_id, first_name, is_bot, invited_at
            FROM invited_users
            WHERE call_id = ?1
            ORDER BY invited_at ASC, id ASC
            "#,
        )?;

        let records = stmt
            .query_map(params![call_id.to_string()], |row| {
                Ok(InviteRecord {
                    call_id: *call_id,
                    user: User {
                        id: UserId(row.get::<_, i64>(0)? as u64),
                        first_name: row.get(1)?,
                        is_self: false,
                        is_bot: row.get::<_, i32>(2)? != 0,
                    },
                    invited_at: row.get(3)?,
                })
            })?
            .collect::<SqliteResult<Vec<InviteRecord>>>()?;

        Ok(records)
    }

    /// Alle eingeladenen Benutzer eines Anrufs
    pub fn invited_users(&self, call_id: &CallId) -> Result<Vec<User>, DatabaseError> {
        Ok(self
            .invited_records(call_id)?
            .into_iter()
            .map(|record| record.user)
            .collect())
    }

    pub fn is_invited(&self, call_id: &CallId, user_id: UserId) -> Result<bool, DatabaseError> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                r#"
                SELECT 1 FROM invited_users
                WHERE call_id = ?1 AND user_id = ?2
                "#,
                params![call_id.to_string(), user_id.0 as i64],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Entfernt eine Einladung (z.B. weil der Benutzer beigetreten ist)
    pub fn remove_invited(&self, call_id: &CallId, user_id: UserId) -> Result<bool, DatabaseError> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            r#"
            DELETE FROM invited_users
            WHERE call_id = ?1 AND user_id = ?2
            "#,
            params![call_id.to_string(), user_id.0 as i64],
        )?;
        Ok(removed > 0)
    }

    /// Löscht alle Einladungen eines beendeten Anrufs
    pub fn clear_call(&self, call_id: &CallId) -> Result<usize, DatabaseError> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            r#"
            DELETE FROM invited_users
            WHERE call_id = ?1
            "#,
            params![call_id.to_string()],
        )?;
        Ok(removed)
    }
}

impl std::fmt::Debug for InvitesDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvitesDatabase").finish_non_exhaustive()
    }
}

// ============================================================================
// TESTS
// ============================================================================
