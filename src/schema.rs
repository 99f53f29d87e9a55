//! Database schema management for `glycemia-companion`.
//!
//! Ensures the key/value table backing the ingest store exists before any
//! reading is loaded or persisted. Applied once on startup from `main.rs`.

use anyhow::Result;
use sqlx::SqlitePool;

// ---

/// Create the schema (idempotent).
///
/// One `kv_store` table holds the JSON slots for the latest reading and the
/// history. Safe to call on every startup; no-op if it already exists.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kv_store (
            key        TEXT    PRIMARY KEY,
            value      TEXT    NOT NULL,
            updated_at INTEGER NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
