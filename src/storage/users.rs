//! User Settings Store

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::models::UserSettings;
use crate::storage::database::{format_timestamp, Database};
use crate::utils::error::AppResult;

/// Per-user settings persistence
#[derive(Debug, Clone)]
pub struct UserStore {
    db: Database,
}

impl UserStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Settings of a user; defaults when none were saved.
    pub fn get_settings(&self, user_id: &str) -> AppResult<UserSettings> {
        let conn = self.db.get_connection()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT settings FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(UserSettings::default()),
        }
    }

    /// Replace a user's settings.
    pub fn put_settings(&self, user_id: &str, settings: &UserSettings) -> AppResult<()> {
        let conn = self.db.get_connection()?;
        let now = format_timestamp(&Utc::now());
        conn.execute(
            "INSERT INTO users (id, settings, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET settings = ?2, updated_at = ?3",
            params![user_id, serde_json::to_string(settings)?, now],
        )?;
        Ok(())
    }
}
