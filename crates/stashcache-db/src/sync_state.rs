//! Per-`(instance, entity_type)` sync cursor bookkeeping (§3 `SyncState`).

use sqlx::{FromRow, SqlitePool};
use stashcache_core::EntityKind;

use crate::DbResult;

#[derive(Debug, Clone, FromRow)]
pub struct SyncState {
    pub instance: String,
    pub entity_type: String,
    pub last_full_cursor: Option<String>,
    pub last_incremental_cursor: Option<String>,
    pub last_run_started_at: Option<String>,
    pub last_run_duration_ms: Option<i64>,
    pub last_run_count: Option<i64>,
    pub last_error: Option<String>,
}

pub async fn get_sync_state(
    pool: &SqlitePool,
    instance: &str,
    kind: EntityKind,
) -> DbResult<Option<SyncState>> {
    let row = sqlx::query_as::<_, SyncState>(
        "SELECT instance, entity_type, last_full_cursor, last_incremental_cursor, \
         last_run_started_at, last_run_duration_ms, last_run_count, last_error \
         FROM sync_state WHERE instance = ? AND entity_type = ?",
    )
    .bind(instance)
    .bind(kind.plural())
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn list_sync_state(pool: &SqlitePool) -> DbResult<Vec<SyncState>> {
    let rows = sqlx::query_as::<_, SyncState>(
        "SELECT instance, entity_type, last_full_cursor, last_incremental_cursor, \
         last_run_started_at, last_run_duration_ms, last_run_count, last_error \
         FROM sync_state ORDER BY instance, entity_type",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Marks a sync run's start, clearing any stale error from a prior run.
pub async fn record_run_started(pool: &SqlitePool, instance: &str, kind: EntityKind, started_at: &str) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO sync_state (instance, entity_type, last_run_started_at, last_error) \
         VALUES (?, ?, ?, NULL) \
         ON CONFLICT(instance, entity_type) DO UPDATE SET \
         last_run_started_at = excluded.last_run_started_at, last_error = NULL",
    )
    .bind(instance)
    .bind(kind.plural())
    .bind(started_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Records a successful run: advances the cursor and clears the error.
#[allow(clippy::too_many_arguments)]
pub async fn record_run_succeeded(
    pool: &SqlitePool,
    instance: &str,
    kind: EntityKind,
    full_cursor: Option<&str>,
    incremental_cursor: Option<&str>,
    duration_ms: i64,
    count: i64,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO sync_state (instance, entity_type, last_full_cursor, \
         last_incremental_cursor, last_run_duration_ms, last_run_count, last_error) \
         VALUES (?, ?, ?, ?, ?, ?, NULL) \
         ON CONFLICT(instance, entity_type) DO UPDATE SET \
         last_full_cursor = COALESCE(excluded.last_full_cursor, sync_state.last_full_cursor), \
         last_incremental_cursor = COALESCE(excluded.last_incremental_cursor, sync_state.last_incremental_cursor), \
         last_run_duration_ms = excluded.last_run_duration_ms, \
         last_run_count = excluded.last_run_count, \
         last_error = NULL",
    )
    .bind(instance)
    .bind(kind.plural())
    .bind(full_cursor)
    .bind(incremental_cursor)
    .bind(duration_ms)
    .bind(count)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn record_run_failed(pool: &SqlitePool, instance: &str, kind: EntityKind, error: &str) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO sync_state (instance, entity_type, last_error) VALUES (?, ?, ?) \
         ON CONFLICT(instance, entity_type) DO UPDATE SET last_error = excluded.last_error",
    )
    .bind(instance)
    .bind(kind.plural())
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn clear_sync_state(pool: &SqlitePool, instance: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM sync_state WHERE instance = ?")
        .bind(instance)
        .execute(pool)
        .await?;
    Ok(())
}
