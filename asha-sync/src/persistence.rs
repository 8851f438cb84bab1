//! Durable persistence of the state container
//!
//! The whole [`AppState`] is stored as one named JSON record wrapped in a
//! versioned envelope: `{"state": {...}, "version": 1}`. Storage backends
//! only see opaque strings.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::store::AppState;

/// Layout version written by this build
pub const STATE_VERSION: u32 = 1;

/// Storage backend for the named state record
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, name: &str) -> SyncResult<Option<String>>;
    async fn save(&self, name: &str, value: &str) -> SyncResult<()>;
    async fn remove(&self, name: &str) -> SyncResult<()>;
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    state: &'a AppState,
    version: u32,
}

#[derive(Deserialize)]
struct RawEnvelope {
    state: serde_json::Value,
    #[serde(default)]
    version: u32,
}

/// Serialize the state into its persisted envelope
pub fn encode_state(state: &AppState) -> SyncResult<String> {
    let envelope = EnvelopeRef {
        state,
        version: STATE_VERSION,
    };
    serde_json::to_string(&envelope).map_err(SyncError::from)
}

/// How a rehydration attempt went
#[derive(Debug, Clone, PartialEq)]
pub enum HydrationOutcome {
    Restored,
    Missing,
    Malformed(String),
    UnsupportedVersion(u32),
    /// The backend could not be read
    Unavailable(String),
}

/// Decode a persisted record. Anything unusable yields the empty state.
pub fn decode_state(raw: Option<&str>) -> (AppState, HydrationOutcome) {
    let raw = match raw {
        Some(raw) => raw,
        None => return (AppState::default(), HydrationOutcome::Missing),
    };

    let envelope: RawEnvelope = match serde_json::from_str(raw) {
        Ok(envelope) => envelope,
        Err(e) => return (AppState::default(), HydrationOutcome::Malformed(e.to_string())),
    };

    if envelope.version > STATE_VERSION {
        return (
            AppState::default(),
            HydrationOutcome::UnsupportedVersion(envelope.version),
        );
    }

    match serde_json::from_value::<AppState>(envelope.state) {
        Ok(state) => (state, HydrationOutcome::Restored),
        Err(e) => (AppState::default(), HydrationOutcome::Malformed(e.to_string())),
    }
}

/// SQLite-backed state store
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    /// Open (creating if needed) the database file at `path`
    pub async fn open(path: &str) -> SyncResult<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    async fn initialize_schema(&self) -> SyncResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS persisted_state (
                name TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                version INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn load(&self, name: &str) -> SyncResult<Option<String>> {
        let row = sqlx::query("SELECT value FROM persisted_state WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    async fn save(&self, name: &str, value: &str) -> SyncResult<()> {
        sqlx::query(
            r#"
            INSERT INTO persisted_state (name, value, version, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                value = excluded.value,
                version = excluded.version,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(value)
        .bind(STATE_VERSION as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(name, bytes = value.len(), "Persisted state record");
        Ok(())
    }

    async fn remove(&self, name: &str) -> SyncResult<()> {
        sqlx::query("DELETE FROM persisted_state WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// In-process state store
#[derive(Default)]
pub struct MemoryStateStore {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a raw record
    pub fn with_record(name: &str, value: &str) -> Self {
        let store = Self::new();
        store.records.lock().insert(name.to_string(), value.to_string());
        store
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.records.lock().get(name).cloned()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, name: &str) -> SyncResult<Option<String>> {
        Ok(self.get(name))
    }

    async fn save(&self, name: &str, value: &str) -> SyncResult<()> {
        self.records.lock().insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, name: &str) -> SyncResult<()> {
        self.records.lock().remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Language, Theme};
    use crate::queue::{DeletePayload, Operation, SyncQueueItem};
    use tempfile::NamedTempFile;

    fn sample_state() -> AppState {
        let mut state = AppState::default();
        state.theme = Theme::Dark;
        state.language = Language::Hi;
        state
            .sync_queue
            .push(SyncQueueItem::new(Operation::DeleteScheme(DeletePayload {
                id: "s1".into(),
            })));
        state
    }

    #[tokio::test]
    async fn test_sqlite_round_trip() {
        let temp_file = NamedTempFile::new().unwrap();
        let store = SqliteStateStore::open(temp_file.path().to_str().unwrap())
            .await
            .unwrap();

        assert_eq!(store.load("asha-ai-storage").await.unwrap(), None);

        let state = sample_state();
        let encoded = encode_state(&state).unwrap();
        store.save("asha-ai-storage", &encoded).await.unwrap();
        // Second save overwrites in place
        store.save("asha-ai-storage", &encoded).await.unwrap();

        let raw = store.load("asha-ai-storage").await.unwrap();
        let (restored, outcome) = decode_state(raw.as_deref());
        assert_eq!(outcome, HydrationOutcome::Restored);
        assert_eq!(restored, state);

        store.remove("asha-ai-storage").await.unwrap();
        assert_eq!(store.load("asha-ai-storage").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sqlite_survives_reopen() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();

        {
            let store = SqliteStateStore::open(&path).await.unwrap();
            store.save("k", "{\"state\":{},\"version\":1}").await.unwrap();
            store.close().await;
        }

        let store = SqliteStateStore::open(&path).await.unwrap();
        assert!(store.load("k").await.unwrap().is_some());
    }

    #[test]
    fn test_envelope_layout() {
        let json: serde_json::Value =
            serde_json::from_str(&encode_state(&sample_state()).unwrap()).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["state"]["theme"], "dark");
        assert_eq!(json["state"]["syncQueue"][0]["type"], "DELETE_SCHEME");
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        let (state, outcome) = decode_state(Some("{not json"));
        assert_eq!(state, AppState::default());
        assert!(matches!(outcome, HydrationOutcome::Malformed(_)));

        let (state, outcome) = decode_state(Some(r#"{"state":{"theme":"dark"},"version":7}"#));
        assert_eq!(state, AppState::default());
        assert_eq!(outcome, HydrationOutcome::UnsupportedVersion(7));

        let (_, outcome) = decode_state(None);
        assert_eq!(outcome, HydrationOutcome::Missing);
    }

    #[test]
    fn test_decode_tolerates_missing_slices() {
        let (state, outcome) = decode_state(Some(r#"{"state":{"language":"mr"},"version":1}"#));
        assert_eq!(outcome, HydrationOutcome::Restored);
        assert_eq!(state.language, Language::Mr);
        assert!(state.sync_queue.is_empty());
    }
}
