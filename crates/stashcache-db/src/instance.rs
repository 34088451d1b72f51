//! The upstream instance registry (§3, one row per configured upstream).

use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use crate::DbResult;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct InstanceRow {
    pub id: String,
    pub display_name: String,
    pub base_url: String,
    pub api_key: String,
    pub enabled: bool,
    pub priority: i64,
}

pub async fn list_instances(pool: &SqlitePool) -> DbResult<Vec<InstanceRow>> {
    let rows = sqlx::query_as::<_, InstanceRow>(
        "SELECT id, display_name, base_url, api_key, enabled, priority FROM instance \
         ORDER BY priority DESC, id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn list_enabled_instances(pool: &SqlitePool) -> DbResult<Vec<InstanceRow>> {
    let rows = sqlx::query_as::<_, InstanceRow>(
        "SELECT id, display_name, base_url, api_key, enabled, priority FROM instance \
         WHERE enabled = 1 ORDER BY priority DESC, id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get_instance(pool: &SqlitePool, id: &str) -> DbResult<Option<InstanceRow>> {
    let row = sqlx::query_as::<_, InstanceRow>(
        "SELECT id, display_name, base_url, api_key, enabled, priority FROM instance WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn upsert_instance(pool: &SqlitePool, row: &InstanceRow) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO instance (id, display_name, base_url, api_key, enabled, priority) \
         VALUES (?, ?, ?, ?, ?, ?) \
         ON CONFLICT(id) DO UPDATE SET display_name = excluded.display_name, \
         base_url = excluded.base_url, api_key = excluded.api_key, \
         enabled = excluded.enabled, priority = excluded.priority",
    )
    .bind(&row.id)
    .bind(&row.display_name)
    .bind(&row.base_url)
    .bind(&row.api_key)
    .bind(row.enabled)
    .bind(row.priority)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_instance(pool: &SqlitePool, id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM instance WHERE id = ?").bind(id).execute(pool).await?;
    Ok(())
}

/// Removes every mirrored row tagged with `instance` across all entity and
/// junction tables, plus its sync state and per-user exclusion rows. Used
/// by the "clear instance data" operation (§6).
pub async fn clear_instance_data(pool: &SqlitePool, instance: &str) -> DbResult<()> {
    const ENTITY_TABLES: &[&str] = &["scenes", "images", "galleries", "performers", "studios", "tags", "groups", "clips"];
    const JUNCTION_TABLES_BY_FIRST_COL: &[(&str, &str)] = &[
        ("tag_parents", "tag_instance"),
        ("performer_tags", "performer_instance"),
        ("studio_tags", "studio_instance"),
        ("group_tags", "group_instance"),
        ("gallery_performers", "gallery_instance"),
        ("gallery_tags", "gallery_instance"),
        ("scene_inherited_tags", "scene_instance"),
        ("scene_performers", "scene_instance"),
        ("scene_tags", "scene_instance"),
        ("scene_groups", "scene_instance"),
        ("scene_galleries", "scene_instance"),
        ("gallery_images", "gallery_instance"),
        ("image_performers", "image_instance"),
        ("image_tags", "image_instance"),
        ("clip_tags", "clip_instance"),
    ];

    let mut tx = pool.begin().await?;
    for table in ENTITY_TABLES {
        let sql = format!("DELETE FROM {table} WHERE instance = ?");
        sqlx::query(&sql).bind(instance).execute(&mut *tx).await?;
    }
    for (table, col) in JUNCTION_TABLES_BY_FIRST_COL {
        let sql = format!("DELETE FROM {table} WHERE {col} = ?");
        sqlx::query(&sql).bind(instance).execute(&mut *tx).await?;
    }
    sqlx::query("DELETE FROM sync_state WHERE instance = ?")
        .bind(instance)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM user_excluded_entity WHERE instance = ?")
        .bind(instance)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}
