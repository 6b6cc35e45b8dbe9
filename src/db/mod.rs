use crate::errors::{AppError, AppResult};
use crate::models::AppSettings;
use crate::storage::{SlotStorage, SlotWrite};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

const SCHEMA_SQL: &str = include_str!("schema.sql");

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;
        tracing::debug!(path = %path.display(), "database opened");

        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn list_slot_keys(&self) -> AppResult<Vec<String>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let mut stmt = conn.prepare("SELECT key FROM slots ORDER BY key ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }
        Ok(keys)
    }

    pub fn get_settings(&self) -> AppResult<AppSettings> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let raw = conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = 'app'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(serde_json::from_str::<AppSettings>(&raw).unwrap_or_else(|error| {
                tracing::warn!(error = %error, "stored settings unreadable, using defaults");
                AppSettings::default()
            })),
            None => Ok(AppSettings::default()),
        }
    }

    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<AppSettings> {
        if !update.is_object() {
            return Err(AppError::validation("settings update must be a JSON object"));
        }
        let current = self.get_settings()?;
        let mut merged = serde_json::to_value(current)?;
        merge_json(&mut merged, update);
        let settings: AppSettings =
            serde_json::from_value(merged).map_err(|error| AppError::Validation(error.to_string()))?;

        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        conn.execute(
            "INSERT INTO settings (key, value_json, updated_at)
             VALUES ('app', ?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
            params![serde_json::to_string(&settings)?, Utc::now().to_rfc3339()],
        )?;

        Ok(settings)
    }
}

impl SlotStorage for Database {
    fn read_slot(&self, key: &str) -> AppResult<Option<String>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let raw = conn
            .query_row("SELECT value_json FROM slots WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(raw)
    }

    fn write_slots(&self, writes: &[SlotWrite]) -> AppResult<()> {
        let now = Utc::now().to_rfc3339();
        let mut conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let tx = conn.transaction()?;
        for write in writes {
            tx.execute(
                "INSERT INTO slots (key, value_json, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
                params![write.key, write.value, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target_map), serde_json::Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_json(target_map.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, update) => {
            *target = update;
        }
    }
}
