//! Storage for C5 (§4.4): hidden entities, content restrictions, the
//! persisted exclusion index, user stats, and the mirror-graph read
//! queries C5's cascade pass walks. The cascade/dedup *algorithm* itself
//! lives in the sync-adjacent exclusion-engine crate; this module only
//! owns the SQL.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use stashcache_core::{EntityKind, ExclusionReason, RestrictionMode};

use crate::DbResult;

#[derive(Debug, Clone, FromRow)]
pub struct HiddenEntityRow {
    pub user_id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub instance: String,
    pub created_at: String,
}

pub async fn list_hidden(pool: &SqlitePool, user_id: &str) -> DbResult<Vec<HiddenEntityRow>> {
    let rows = sqlx::query_as::<_, HiddenEntityRow>(
        "SELECT user_id, entity_type, entity_id, instance, created_at FROM user_hidden_entity \
         WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn add_hidden(
    pool: &SqlitePool,
    user_id: &str,
    entity_type: &str,
    entity_id: &str,
    instance: &str,
    created_at: &str,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO user_hidden_entity (user_id, entity_type, entity_id, instance, created_at) \
         VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT(user_id, entity_type, entity_id, instance) DO NOTHING",
    )
    .bind(user_id)
    .bind(entity_type)
    .bind(entity_id)
    .bind(instance)
    .bind(created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn remove_hidden(
    pool: &SqlitePool,
    user_id: &str,
    entity_type: &str,
    entity_id: &str,
    instance: &str,
) -> DbResult<()> {
    sqlx::query(
        "DELETE FROM user_hidden_entity WHERE user_id = ? AND entity_type = ? AND entity_id = ? \
         AND instance = ?",
    )
    .bind(user_id)
    .bind(entity_type)
    .bind(entity_id)
    .bind(instance)
    .execute(pool)
    .await?;
    Ok(())
}

#[derive(Debug, Clone, FromRow)]
struct ContentRestrictionRowRaw {
    id: i64,
    user_id: String,
    entity_type_plural: String,
    mode: String,
    entity_ids: String,
    restrict_empty: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRestrictionRow {
    pub id: i64,
    pub user_id: String,
    pub entity_type_plural: String,
    pub mode: RestrictionMode,
    pub entity_ids: Vec<String>,
    pub restrict_empty: bool,
}

impl From<ContentRestrictionRowRaw> for ContentRestrictionRow {
    fn from(raw: ContentRestrictionRowRaw) -> Self {
        let mode = match raw.mode.as_str() {
            "INCLUDE" => RestrictionMode::Include,
            _ => RestrictionMode::Exclude,
        };
        let entity_ids = serde_json::from_str(&raw.entity_ids).unwrap_or_default();
        Self {
            id: raw.id,
            user_id: raw.user_id,
            entity_type_plural: raw.entity_type_plural,
            mode,
            entity_ids,
            restrict_empty: raw.restrict_empty != 0,
        }
    }
}

pub async fn list_restrictions(pool: &SqlitePool, user_id: &str) -> DbResult<Vec<ContentRestrictionRow>> {
    let rows = sqlx::query_as::<_, ContentRestrictionRowRaw>(
        "SELECT id, user_id, entity_type_plural, mode, entity_ids, restrict_empty \
         FROM user_content_restriction WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(ContentRestrictionRow::from).collect())
}

pub async fn list_all_restrictions(pool: &SqlitePool) -> DbResult<Vec<ContentRestrictionRow>> {
    let rows = sqlx::query_as::<_, ContentRestrictionRowRaw>(
        "SELECT id, user_id, entity_type_plural, mode, entity_ids, restrict_empty \
         FROM user_content_restriction",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(ContentRestrictionRow::from).collect())
}

pub async fn add_restriction(
    pool: &SqlitePool,
    user_id: &str,
    entity_type_plural: &str,
    mode: RestrictionMode,
    entity_ids: &[String],
    restrict_empty: bool,
) -> DbResult<i64> {
    let mode_str = match mode {
        RestrictionMode::Include => "INCLUDE",
        RestrictionMode::Exclude => "EXCLUDE",
    };
    let ids_json = serde_json::to_string(entity_ids).unwrap_or_else(|_| "[]".to_string());
    let result = sqlx::query(
        "INSERT INTO user_content_restriction \
         (user_id, entity_type_plural, mode, entity_ids, restrict_empty) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(entity_type_plural)
    .bind(mode_str)
    .bind(ids_json)
    .bind(restrict_empty as i64)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn delete_restriction(pool: &SqlitePool, id: i64) -> DbResult<()> {
    sqlx::query("DELETE FROM user_content_restriction WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// One row of the computed exclusion set, ready to persist.
#[derive(Debug, Clone)]
pub struct ExcludedEntity {
    pub entity_type: String,
    pub entity_id: String,
    pub instance: String,
    pub reason: ExclusionReason,
}

/// Replaces the full `UserExcludedEntity` set for `user_id` and refreshes
/// `UserEntityStats`, in one short write transaction (§4.4 "single short
/// write transaction").
pub async fn commit_exclusions(
    pool: &SqlitePool,
    user_id: &str,
    rows: &[ExcludedEntity],
) -> DbResult<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM user_excluded_entity WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    if !rows.is_empty() {
        use sqlx::QueryBuilder;
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO user_excluded_entity (user_id, entity_type, entity_id, instance, reason) ",
        );
        qb.push_values(rows, |mut b, r| {
            b.push_bind(user_id)
                .push_bind(&r.entity_type)
                .push_bind(&r.entity_id)
                .push_bind(&r.instance)
                .push_bind(reason_str(r.reason));
        });
        qb.build().execute(&mut *tx).await?;
    }

    refresh_user_entity_stats(&mut tx, user_id).await?;

    tx.commit().await?;
    Ok(())
}

/// Folds one newly-hidden entity (and the cascade rows computed for it)
/// into the persisted `UserExcludedEntity` set without touching any other
/// row, in one write transaction (§4.4 "short-circuit a full recompute").
/// Unlike [`commit_exclusions`] this never deletes -- an existing row for
/// the same key (e.g. already `Restricted`) keeps its original reason.
pub async fn add_hidden_with_exclusions(
    pool: &SqlitePool,
    user_id: &str,
    entity_type: &str,
    entity_id: &str,
    instance: &str,
    created_at: &str,
    rows: &[ExcludedEntity],
) -> DbResult<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO user_hidden_entity (user_id, entity_type, entity_id, instance, created_at) \
         VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT(user_id, entity_type, entity_id, instance) DO NOTHING",
    )
    .bind(user_id)
    .bind(entity_type)
    .bind(entity_id)
    .bind(instance)
    .bind(created_at)
    .execute(&mut *tx)
    .await?;

    if !rows.is_empty() {
        use sqlx::QueryBuilder;
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT OR IGNORE INTO user_excluded_entity (user_id, entity_type, entity_id, instance, reason) ",
        );
        qb.push_values(rows, |mut b, r| {
            b.push_bind(user_id)
                .push_bind(&r.entity_type)
                .push_bind(&r.entity_id)
                .push_bind(&r.instance)
                .push_bind(reason_str(r.reason));
        });
        qb.build().execute(&mut *tx).await?;
    }

    refresh_user_entity_stats(&mut tx, user_id).await?;

    tx.commit().await?;
    Ok(())
}

fn reason_str(reason: ExclusionReason) -> &'static str {
    match reason {
        ExclusionReason::Restricted => "restricted",
        ExclusionReason::Hidden => "hidden",
        ExclusionReason::Cascade => "cascade",
        ExclusionReason::Empty => "empty",
    }
}

async fn refresh_user_entity_stats(tx: &mut Transaction<'_, Sqlite>, user_id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM user_entity_stats WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    for kind in EntityKind::ALL {
        let table = kind.table_name();
        let sql = format!(
            "INSERT INTO user_entity_stats (user_id, entity_type, instance, visible_count) \
             SELECT ?, ?, t.instance, COUNT(*) FROM {table} t \
             WHERE t.deleted_at IS NULL \
             AND NOT EXISTS ( \
               SELECT 1 FROM user_excluded_entity e \
               WHERE e.user_id = ? AND e.entity_type = ? AND e.entity_id = t.id \
               AND e.instance = t.instance \
             ) \
             GROUP BY t.instance"
        );
        sqlx::query(&sql)
            .bind(user_id)
            .bind(kind.singular())
            .bind(user_id)
            .bind(kind.singular())
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

pub async fn get_user_entity_stats(
    pool: &SqlitePool,
    user_id: &str,
) -> DbResult<Vec<(String, String, i64)>> {
    let rows: Vec<(String, String, i64)> = sqlx::query_as(
        "SELECT entity_type, instance, visible_count FROM user_entity_stats WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Every user_id known to the exclusion subsystem, from any table a user
/// can have touched -- the driver for a full `recompute_all_users` pass.
pub async fn list_known_users(pool: &SqlitePool) -> DbResult<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT user_id FROM user_hidden_entity \
         UNION SELECT user_id FROM user_content_restriction \
         UNION SELECT user_id FROM user_entity_overlay \
         UNION SELECT user_id FROM user_excluded_entity",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Returns every non-deleted `(id, instance)` for `kind` -- the base id set
/// reason 1 (`INCLUDE`) subtracts from.
pub async fn all_live_ids(pool: &SqlitePool, kind: EntityKind) -> DbResult<Vec<(String, String)>> {
    let table = kind.table_name();
    let sql = format!("SELECT id, instance FROM {table} WHERE deleted_at IS NULL");
    let rows: Vec<(String, String)> = sqlx::query_as(&sql).fetch_all(pool).await?;
    Ok(rows)
}

/// Scenes directly referencing the given studio (cascade edge: studio
/// hidden ⇒ scenes with that studio). `studio_instance = ""` cascades
/// across every instance of the mirror (§4.4: "global-scope exclusions
/// cascade across all instances").
pub async fn scenes_by_studio(pool: &SqlitePool, studio_id: &str, studio_instance: &str) -> DbResult<Vec<(String, String)>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT id, instance FROM scenes WHERE studio_id = ? AND (? = '' OR studio_instance = ?) \
         AND deleted_at IS NULL",
    )
    .bind(studio_id)
    .bind(studio_instance)
    .bind(studio_instance)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Scenes with the given performer (cascade edge: performer hidden ⇒
/// scenes with that performer).
pub async fn scenes_by_performer(
    pool: &SqlitePool,
    performer_id: &str,
    performer_instance: &str,
) -> DbResult<Vec<(String, String)>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT s.id, s.instance FROM scenes s \
         JOIN scene_performers sp ON sp.scene_id = s.id AND sp.scene_instance = s.instance \
         WHERE sp.performer_id = ? AND (? = '' OR sp.performer_instance = ?) AND s.deleted_at IS NULL",
    )
    .bind(performer_id)
    .bind(performer_instance)
    .bind(performer_instance)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Scenes in the given group (cascade edge: group hidden ⇒ scenes in that
/// group).
pub async fn scenes_by_group(pool: &SqlitePool, group_id: &str, group_instance: &str) -> DbResult<Vec<(String, String)>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT s.id, s.instance FROM scenes s \
         JOIN scene_groups sg ON sg.scene_id = s.id AND sg.scene_instance = s.instance \
         WHERE sg.group_id = ? AND (? = '' OR sg.group_instance = ?) AND s.deleted_at IS NULL",
    )
    .bind(group_id)
    .bind(group_instance)
    .bind(group_instance)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Scenes linked to the given gallery (cascade edge: gallery hidden ⇒
/// scenes linked and all images in it -- scenes half).
pub async fn scenes_by_gallery(pool: &SqlitePool, gallery_id: &str, gallery_instance: &str) -> DbResult<Vec<(String, String)>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT s.id, s.instance FROM scenes s \
         JOIN scene_galleries sg ON sg.scene_id = s.id AND sg.scene_instance = s.instance \
         WHERE sg.gallery_id = ? AND (? = '' OR sg.gallery_instance = ?) AND s.deleted_at IS NULL",
    )
    .bind(gallery_id)
    .bind(gallery_instance)
    .bind(gallery_instance)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Images belonging to the given gallery (cascade edge: gallery hidden ⇒
/// images half).
pub async fn images_by_gallery(pool: &SqlitePool, gallery_id: &str, gallery_instance: &str) -> DbResult<Vec<(String, String)>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT i.id, i.instance FROM images i \
         JOIN gallery_images gi ON gi.image_id = i.id AND gi.image_instance = i.instance \
         WHERE gi.gallery_id = ? AND (? = '' OR gi.gallery_instance = ?) AND i.deleted_at IS NULL",
    )
    .bind(gallery_id)
    .bind(gallery_instance)
    .bind(gallery_instance)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Scenes tagged with the given tag, directly or via the inherited-tag
/// rollup.
pub async fn scenes_by_tag(pool: &SqlitePool, tag_id: &str, tag_instance: &str) -> DbResult<Vec<(String, String)>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT s.id, s.instance FROM scenes s \
         WHERE s.deleted_at IS NULL AND ( \
           EXISTS (SELECT 1 FROM scene_tags st WHERE st.scene_id = s.id AND st.scene_instance = s.instance \
                   AND st.tag_id = ? AND (? = '' OR st.tag_instance = ?)) \
           OR EXISTS (SELECT 1 FROM scene_inherited_tags sit WHERE sit.scene_id = s.id \
                      AND sit.scene_instance = s.instance AND sit.tag_id = ? AND (? = '' OR sit.tag_instance = ?)) \
         )",
    )
    .bind(tag_id)
    .bind(tag_instance)
    .bind(tag_instance)
    .bind(tag_id)
    .bind(tag_instance)
    .bind(tag_instance)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Performers/studios/groups tagged with the given tag (cascade edge: tag
/// hidden ⇒ performers/studios/groups tagged with it).
pub async fn performers_by_tag(pool: &SqlitePool, tag_id: &str, tag_instance: &str) -> DbResult<Vec<(String, String)>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT p.id, p.instance FROM performers p \
         JOIN performer_tags pt ON pt.performer_id = p.id AND pt.performer_instance = p.instance \
         WHERE pt.tag_id = ? AND (? = '' OR pt.tag_instance = ?) AND p.deleted_at IS NULL",
    )
    .bind(tag_id)
    .bind(tag_instance)
    .bind(tag_instance)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn studios_by_tag(pool: &SqlitePool, tag_id: &str, tag_instance: &str) -> DbResult<Vec<(String, String)>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT s.id, s.instance FROM studios s \
         JOIN studio_tags st ON st.studio_id = s.id AND st.studio_instance = s.instance \
         WHERE st.tag_id = ? AND (? = '' OR st.tag_instance = ?) AND s.deleted_at IS NULL",
    )
    .bind(tag_id)
    .bind(tag_instance)
    .bind(tag_instance)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn groups_by_tag(pool: &SqlitePool, tag_id: &str, tag_instance: &str) -> DbResult<Vec<(String, String)>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT g.id, g.instance FROM groups g \
         JOIN group_tags gt ON gt.group_id = g.id AND gt.group_instance = g.instance \
         WHERE gt.tag_id = ? AND (? = '' OR gt.tag_instance = ?) AND g.deleted_at IS NULL",
    )
    .bind(tag_id)
    .bind(tag_instance)
    .bind(tag_instance)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Images with the given performer (emptiness check: performer has no
/// surviving scene *or* image).
pub async fn images_by_performer(
    pool: &SqlitePool,
    performer_id: &str,
    performer_instance: &str,
) -> DbResult<Vec<(String, String)>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT i.id, i.instance FROM images i \
         JOIN image_performers ip ON ip.image_id = i.id AND ip.image_instance = i.instance \
         WHERE ip.performer_id = ? AND (? = '' OR ip.performer_instance = ?) AND i.deleted_at IS NULL",
    )
    .bind(performer_id)
    .bind(performer_instance)
    .bind(performer_instance)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Images directly attributed to the given studio (emptiness check: studio
/// has no surviving scene *or* image).
pub async fn images_by_studio(pool: &SqlitePool, studio_id: &str, studio_instance: &str) -> DbResult<Vec<(String, String)>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT id, instance FROM images WHERE studio_id = ? AND (? = '' OR studio_instance = ?) \
         AND deleted_at IS NULL",
    )
    .bind(studio_id)
    .bind(studio_instance)
    .bind(studio_instance)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Tag ids that have at least one mirror-present child (tag empty-pruning
/// "has children", Open Question 1: mirror-present children only).
pub async fn tag_ids_with_children(pool: &SqlitePool) -> DbResult<Vec<(String, String)>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT DISTINCT tp.parent_tag_id, tp.parent_instance FROM tag_parents tp \
         JOIN tags child ON child.id = tp.tag_id AND child.instance = tp.tag_instance \
         WHERE child.deleted_at IS NULL",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

