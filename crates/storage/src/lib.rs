//! SQLite-backed persistence for the safety core.
//!
//! One database holds the per-user safety config and the append-only
//! emergency log. Both tables carry an explicit schema-version tag so
//! a future migration has something to key on.
//!
//! The `Mutex<Connection>` serializes every read-modify-write, which
//! is what keeps the log's non-atomic append safe if a shell ever
//! feeds the core from more than one thread.

use chrono::{DateTime, Utc};
use echoexit_config::{ConfigError, ConfigRepository, SafetyConfig};
use echoexit_events::{DeviceSnapshot, EmergencyLogRepository, EmergencyRecord};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

/// Version tag written with every row.
pub const SCHEMA_VERSION: i64 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid config rejected at write time: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("malformed row: {0}")]
    MalformedRow(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS safety_config (
                user_id TEXT PRIMARY KEY,
                config_json TEXT NOT NULL,
                schema_version INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS emergency_log (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                recorded_at TEXT NOT NULL,
                location TEXT NOT NULL,
                device_json TEXT NOT NULL,
                schema_version INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_emergency_log_user
                ON emergency_log(user_id, recorded_at);
            "#,
        )?;
        Ok(())
    }
}

impl ConfigRepository for Database {
    type Error = StorageError;

    /// Persist a config. Validation runs here so a malformed config
    /// (empty phrase, threshold < 2) never reaches disk, let alone the
    /// detectors.
    fn save_config(&self, user_id: &str, config: &SafetyConfig) -> Result<()> {
        config.validate()?;
        let json = serde_json::to_string(config)?;
        let conn = self.conn.lock().expect("database mutex poisoned");
        conn.execute(
            "INSERT OR REPLACE INTO safety_config (user_id, config_json, schema_version) VALUES (?1, ?2, ?3)",
            (user_id, json, SCHEMA_VERSION),
        )?;
        tracing::debug!(user_id, "safety config saved");
        Ok(())
    }

    fn load_config(&self, user_id: &str) -> Result<Option<SafetyConfig>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let json: Option<String> = conn
            .query_row(
                "SELECT config_json FROM safety_config WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(StorageError::Database(other)),
            })?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

impl EmergencyLogRepository for Database {
    type Error = StorageError;

    /// Append-only: there is deliberately no update or delete path for
    /// emergency records.
    fn append(&self, user_id: &str, record: &EmergencyRecord) -> Result<()> {
        let device_json = serde_json::to_string(&record.device)?;
        let conn = self.conn.lock().expect("database mutex poisoned");
        conn.execute(
            "INSERT INTO emergency_log (id, user_id, recorded_at, location, device_json, schema_version) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            (
                record.id.to_string(),
                user_id,
                record.recorded_at.to_rfc3339(),
                &record.location,
                device_json,
                SCHEMA_VERSION,
            ),
        )?;
        Ok(())
    }

    fn list_for_user(&self, user_id: &str) -> Result<Vec<EmergencyRecord>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, recorded_at, location, device_json FROM emergency_log WHERE user_id = ?1 ORDER BY recorded_at ASC",
        )?;

        let rows = stmt.query_map([user_id], |row| {
            let id: String = row.get(0)?;
            let recorded_at: String = row.get(1)?;
            let location: String = row.get(2)?;
            let device_json: String = row.get(3)?;
            Ok((id, recorded_at, location, device_json))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, recorded_at, location, device_json) = row?;

            let id = Uuid::parse_str(&id)
                .map_err(|e| StorageError::MalformedRow(format!("id {id}: {e}")))?;
            let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
                .map_err(|e| StorageError::MalformedRow(format!("recorded_at: {e}")))?
                .with_timezone(&Utc);
            let device: DeviceSnapshot = serde_json::from_str(&device_json)?;

            records.push(EmergencyRecord {
                id,
                recorded_at,
                location,
                device,
            });
        }
        Ok(records)
    }
}
