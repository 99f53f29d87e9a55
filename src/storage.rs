//! Durable key/value slots for the ingest store.
//!
//! Two JSON slots are kept: the latest reading and the history. Reads never
//! fail outward. A missing key, a SQL error and corrupt JSON all read as "no
//! data". Writes go through a background writer so callers never wait on I/O;
//! after a restart the most recent update may not have been flushed yet.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::history::StoreSnapshot;
use crate::models::Reading;
use crate::schema;

// ---

pub const LATEST_KEY: &str = "@health_companion/latest_glycemia";
pub const HISTORY_KEY: &str = "@health_companion/history";

#[derive(Debug, Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    // ---
    /// Open the database and make sure the schema exists.
    pub async fn connect(db_url: &str, max_connections: u32) -> Result<Self> {
        // ---
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(db_url)
            .await
            .with_context(|| format!("Failed to open database '{}'", db_url))?;

        schema::create_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn load_latest(&self) -> Option<Reading> {
        // ---
        let reading: Reading = self.load_json(LATEST_KEY).await?;
        if reading.is_valid() {
            Some(reading)
        } else {
            debug!("Persisted latest reading out of range, ignoring: {:?}", reading);
            None
        }
    }

    /// Persisted history, newest first, at most `capacity` entries.
    pub async fn load_history(&self, capacity: usize) -> Vec<Reading> {
        // ---
        let history: Vec<Reading> = self.load_json(HISTORY_KEY).await.unwrap_or_default();
        history
            .into_iter()
            .filter(Reading::is_valid)
            .take(capacity)
            .collect()
    }

    pub async fn save_latest(&self, reading: &Reading) -> Result<()> {
        self.put(LATEST_KEY, &serde_json::to_string(reading)?).await
    }

    pub async fn save_history(&self, history: &[Reading]) -> Result<()> {
        self.put(HISTORY_KEY, &serde_json::to_string(history)?).await
    }

    pub async fn save_snapshot(&self, snapshot: &StoreSnapshot) -> Result<()> {
        // ---
        if let Some(latest) = &snapshot.latest {
            self.save_latest(latest).await?;
        }
        self.save_history(&snapshot.history).await
    }

    /// Write a raw slot value. Exposed so corrupt-state handling can be exercised.
    pub async fn put(&self, key: &str, value: &str) -> Result<()> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT (key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to write slot '{}'", key))?;

        Ok(())
    }

    async fn load_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        // ---
        let query = sqlx::query_as::<_, (String,)>("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool);

        let row = match query.await {
            Ok(row) => row,
            Err(e) => {
                warn!("Failed to read slot '{}': {}", key, e);
                return None;
            }
        };

        let (raw,) = row?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Corrupt data in slot '{}', treating as absent: {}", key, e);
                None
            }
        }
    }
}

/// Background writer that persists store snapshots in order.
///
/// Snapshots published while a write is in flight are coalesced; only the
/// newest one is written next. The task ends when the handle is dropped.
#[derive(Debug)]
pub struct PersistHandle {
    tx: watch::Sender<Option<StoreSnapshot>>,
    task: JoinHandle<()>,
}

impl PersistHandle {
    // ---
    pub fn spawn(storage: Storage) -> Self {
        // ---
        let (tx, mut rx) = watch::channel::<Option<StoreSnapshot>>(None);

        let task = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                let Some(snapshot) = snapshot else { continue };

                match storage.save_snapshot(&snapshot).await {
                    Ok(()) => debug!("Persisted {} history entries", snapshot.history.len()),
                    Err(e) => warn!("Persisting glycemia state failed: {:#}", e),
                }
            }
            debug!("Persistence writer stopped");
        });

        Self { tx, task }
    }

    /// Queue a snapshot for writing. Never blocks, never fails.
    pub fn schedule(&self, snapshot: StoreSnapshot) {
        self.tx.send_replace(Some(snapshot));
    }

    /// Stop accepting snapshots and wait for the pending write to finish.
    pub async fn shutdown(self) {
        // ---
        let PersistHandle { tx, task } = self;
        drop(tx);
        if let Err(e) = task.await {
            warn!("Persistence writer ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::GlycemiaUnit;
    use std::time::Duration;

    async fn memory_storage() -> Storage {
        // ---
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        schema::create_schema(&pool).await.unwrap();
        Storage::from_pool(pool)
    }

    fn reading(value: f64, timestamp: i64) -> Reading {
        Reading::new(value, GlycemiaUnit::MmolL, timestamp).unwrap()
    }

    #[tokio::test]
    async fn test_missing_slots_read_as_empty() {
        // ---
        let storage = memory_storage().await;
        assert!(storage.load_latest().await.is_none());
        assert!(storage.load_history(20).await.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        // ---
        let storage = memory_storage().await;
        let latest = reading(7.2, 2_000_000);
        tokio_test::assert_ok!(storage.save_latest(&latest).await);
        tokio_test::assert_ok!(
            storage
                .save_history(&[latest, reading(6.0, 1_000_000)])
                .await
        );

        assert_eq!(storage.load_latest().await, Some(latest));
        assert_eq!(storage.load_history(20).await.len(), 2);
        assert_eq!(storage.load_history(1).await, vec![latest]);
    }

    #[tokio::test]
    async fn test_corrupt_json_is_absent() {
        // ---
        let storage = memory_storage().await;
        storage.put(LATEST_KEY, "{not json").await.unwrap();
        storage.put(HISTORY_KEY, r#"{"value": 1}"#).await.unwrap();

        assert!(storage.load_latest().await.is_none());
        assert!(storage.load_history(20).await.is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_entries_dropped() {
        // ---
        let storage = memory_storage().await;
        storage
            .put(
                HISTORY_KEY,
                r#"[{"value":5.0,"unit":"mmol/L","timestamp":2},{"value":900,"unit":"mg/dL","timestamp":1}]"#,
            )
            .await
            .unwrap();

        let history = storage.load_history(20).await;
        assert_eq!(history, vec![reading(5.0, 2)]);
    }

    #[tokio::test]
    async fn test_writer_persists_latest_snapshot() {
        // ---
        let storage = memory_storage().await;
        let writer = PersistHandle::spawn(storage.clone());

        let first = reading(5.0, 1_000_000);
        let second = reading(6.0, 2_000_000);
        writer.schedule(StoreSnapshot {
            latest: Some(first),
            history: vec![first],
        });
        writer.schedule(StoreSnapshot {
            latest: Some(second),
            history: vec![second, first],
        });

        let mut flushed = false;
        for _ in 0..100 {
            if storage.load_latest().await == Some(second) {
                flushed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(flushed, "writer never flushed the newest snapshot");
        assert_eq!(storage.load_history(20).await, vec![second, first]);
    }
}
