//! Cross-kind derivation SQL (C4, §4.3 post-sync derivations) and the
//! cleanup-pass primitives (soft delete, merge detection) that C3
//! orchestrates in sync order. All of this is plain bulk SQL; C3 decides
//! *when* to call it.

use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};
use stashcache_core::EntityKind;

use crate::DbResult;

/// All non-deleted ids mirrored for `(kind, instance)`, for the
/// cleanup-deleted pass to diff against the upstream id list (§4.3
/// "fetch all ids from upstream ... absent from the temp table").
pub async fn live_ids_for_instance(pool: &SqlitePool, kind: EntityKind, instance: &str) -> DbResult<Vec<String>> {
    let sql = format!("SELECT id FROM {} WHERE instance = ? AND deleted_at IS NULL", kind.table_name());
    let rows: Vec<(String,)> = sqlx::query_as(&sql).bind(instance).fetch_all(pool).await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Soft-deletes a batch of ids for `(kind, instance)` (§4.3 "soft-deleted
/// in batches of 500").
pub async fn soft_delete_batch(
    pool: &SqlitePool,
    kind: EntityKind,
    instance: &str,
    ids: &[String],
    deleted_at: &str,
) -> DbResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "UPDATE {} SET deleted_at = ",
        kind.table_name()
    ));
    qb.push_bind(deleted_at);
    qb.push(" WHERE instance = ");
    qb.push_bind(instance);
    qb.push(" AND id IN (");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");
    qb.build().execute(pool).await?;
    Ok(())
}

/// The perceptual hash of a live scene, for merge detection.
pub async fn scene_phash(pool: &SqlitePool, scene_id: &str, instance: &str) -> DbResult<Option<String>> {
    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT phash FROM scenes WHERE id = ? AND instance = ? AND deleted_at IS NULL")
            .bind(scene_id)
            .bind(instance)
            .fetch_optional(pool)
            .await?;
    Ok(row.and_then(|(p,)| p))
}

/// Another live scene in the same instance sharing `phash`, other than
/// `excluding_id` (§4.3 merge detection: "look up other mirror scenes
/// sharing that hash").
pub async fn find_scene_by_phash(
    pool: &SqlitePool,
    phash: &str,
    instance: &str,
    excluding_id: &str,
) -> DbResult<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT id FROM scenes WHERE phash = ? AND instance = ? AND id != ? AND deleted_at IS NULL LIMIT 1",
    )
    .bind(phash)
    .bind(instance)
    .bind(excluding_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(id,)| id))
}

/// Reassigns a scene's user overlay rows from `old_id` to `new_id` ahead
/// of soft-deleting `old_id` (§4.3 merge detection).
pub async fn reassign_scene_overlay(
    pool: &SqlitePool,
    instance: &str,
    old_id: &str,
    new_id: &str,
) -> DbResult<()> {
    sqlx::query(
        "UPDATE OR IGNORE user_entity_overlay SET entity_id = ? \
         WHERE entity_type = 'scene' AND entity_id = ? AND instance = ?",
    )
    .bind(new_id)
    .bind(old_id)
    .bind(instance)
    .execute(pool)
    .await?;
    // Leftover rows couldn't move because the user already has an overlay
    // on `new_id`; drop the now-orphaned old one rather than leave it dead.
    sqlx::query("DELETE FROM user_entity_overlay WHERE entity_type = 'scene' AND entity_id = ? AND instance = ?")
        .bind(old_id)
        .bind(instance)
        .execute(pool)
        .await?;
    Ok(())
}

/// C4.1: `inheritedTagIds = tagsOf(performers) ∪ tagsOf(studio) ∪
/// tagsOf(groups) − directTagsOf(scene)`, rebuilt for every live scene in
/// `instance`.
pub async fn derive_scene_inherited_tags(tx: &mut Transaction<'_, Sqlite>, instance: &str) -> DbResult<()> {
    sqlx::query(
        "DELETE FROM scene_inherited_tags WHERE scene_instance = ? \
         AND scene_id IN (SELECT id FROM scenes WHERE instance = ?)",
    )
    .bind(instance)
    .bind(instance)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        "INSERT OR IGNORE INTO scene_inherited_tags (scene_id, scene_instance, tag_id, tag_instance)
         SELECT s.id, s.instance, candidate.tag_id, candidate.tag_instance
         FROM scenes s
         JOIN (
             SELECT sp.scene_id, sp.scene_instance, pt.tag_id, pt.tag_instance
             FROM scene_performers sp
             JOIN performer_tags pt
                 ON pt.performer_id = sp.performer_id AND pt.performer_instance = sp.performer_instance
             UNION
             SELECT s2.id AS scene_id, s2.instance AS scene_instance, st.tag_id, st.tag_instance
             FROM scenes s2
             JOIN studio_tags st ON st.studio_id = s2.studio_id AND st.studio_instance = s2.studio_instance
             UNION
             SELECT sg.scene_id, sg.scene_instance, gt.tag_id, gt.tag_instance
             FROM scene_groups sg
             JOIN group_tags gt ON gt.group_id = sg.group_id AND gt.group_instance = sg.group_instance
         ) candidate ON candidate.scene_id = s.id AND candidate.scene_instance = s.instance
         WHERE s.instance = ? AND s.deleted_at IS NULL
           AND NOT EXISTS (
               SELECT 1 FROM scene_tags direct
               WHERE direct.scene_id = s.id AND direct.scene_instance = s.instance
                 AND direct.tag_id = candidate.tag_id AND direct.tag_instance = candidate.tag_instance
           )",
    )
    .bind(instance)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// C4.2: null-filled scalar inheritance plus first-touch junction
/// inheritance from a gallery to its images.
pub async fn derive_gallery_image_inheritance(tx: &mut Transaction<'_, Sqlite>, instance: &str) -> DbResult<()> {
    for (column, predicate) in [
        ("date", "g.date IS NOT NULL"),
        ("photographer", "g.photographer IS NOT NULL"),
        ("details", "g.details IS NOT NULL"),
    ] {
        let sql = format!(
            "UPDATE images SET {column} = (
                 SELECT g.{column} FROM gallery_images gi
                 JOIN galleries g ON g.id = gi.gallery_id AND g.instance = gi.gallery_instance
                 WHERE gi.image_id = images.id AND gi.image_instance = images.instance AND {predicate}
                 ORDER BY gi.gallery_id ASC LIMIT 1
             )
             WHERE images.instance = ? AND images.deleted_at IS NULL AND images.{column} IS NULL
               AND EXISTS (
                   SELECT 1 FROM gallery_images gi
                   JOIN galleries g ON g.id = gi.gallery_id AND g.instance = gi.gallery_instance
                   WHERE gi.image_id = images.id AND gi.image_instance = images.instance AND {predicate}
               )"
        );
        sqlx::query(&sql).bind(instance).execute(&mut **tx).await?;
    }

    sqlx::query(
        "UPDATE images SET studio_id = (
             SELECT g.studio_id FROM gallery_images gi
             JOIN galleries g ON g.id = gi.gallery_id AND g.instance = gi.gallery_instance
             WHERE gi.image_id = images.id AND gi.image_instance = images.instance AND g.studio_id IS NOT NULL
             ORDER BY gi.gallery_id ASC LIMIT 1
         ),
         studio_instance = (
             SELECT g.studio_instance FROM gallery_images gi
             JOIN galleries g ON g.id = gi.gallery_id AND g.instance = gi.gallery_instance
             WHERE gi.image_id = images.id AND gi.image_instance = images.instance AND g.studio_id IS NOT NULL
             ORDER BY gi.gallery_id ASC LIMIT 1
         )
         WHERE images.instance = ? AND images.deleted_at IS NULL AND images.studio_id IS NULL
           AND EXISTS (
               SELECT 1 FROM gallery_images gi
               JOIN galleries g ON g.id = gi.gallery_id AND g.instance = gi.gallery_instance
               WHERE gi.image_id = images.id AND gi.image_instance = images.instance AND g.studio_id IS NOT NULL
           )",
    )
    .bind(instance)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        "INSERT OR IGNORE INTO image_performers (image_id, image_instance, performer_id, performer_instance)
         SELECT gi.image_id, gi.image_instance, gp.performer_id, gp.performer_instance
         FROM gallery_images gi
         JOIN gallery_performers gp ON gp.gallery_id = gi.gallery_id AND gp.gallery_instance = gi.gallery_instance
         JOIN images i ON i.id = gi.image_id AND i.instance = gi.image_instance
         WHERE i.instance = ? AND i.deleted_at IS NULL
           AND NOT EXISTS (
               SELECT 1 FROM image_performers ip WHERE ip.image_id = i.id AND ip.image_instance = i.instance
           )",
    )
    .bind(instance)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        "INSERT OR IGNORE INTO image_tags (image_id, image_instance, tag_id, tag_instance)
         SELECT gi.image_id, gi.image_instance, gt.tag_id, gt.tag_instance
         FROM gallery_images gi
         JOIN gallery_tags gt ON gt.gallery_id = gi.gallery_id AND gt.gallery_instance = gi.gallery_instance
         JOIN images i ON i.id = gi.image_id AND i.instance = gi.image_instance
         WHERE i.instance = ? AND i.deleted_at IS NULL
           AND NOT EXISTS (SELECT 1 FROM image_tags it WHERE it.image_id = i.id AND it.image_instance = i.instance)",
    )
    .bind(instance)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// C4.3: inherited image counts per performer/studio/tag, counting
/// images that reference the entity directly or via a gallery, by UNION.
pub async fn derive_inherited_image_counts(tx: &mut Transaction<'_, Sqlite>, instance: &str) -> DbResult<()> {
    sqlx::query(
        "UPDATE performers SET image_count = (
             SELECT COUNT(*) FROM image_performers ip
             JOIN images im ON im.id = ip.image_id AND im.instance = ip.image_instance
             WHERE ip.performer_id = performers.id AND ip.performer_instance = performers.instance
               AND im.deleted_at IS NULL
         )
         WHERE performers.instance = ? AND performers.deleted_at IS NULL",
    )
    .bind(instance)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        "UPDATE performers SET image_count_via_gallery = (
             SELECT COUNT(DISTINCT combined.image_id || ':' || combined.image_instance) FROM (
                 SELECT ip.image_id, ip.image_instance FROM image_performers ip
                 JOIN images im ON im.id = ip.image_id AND im.instance = ip.image_instance
                 WHERE ip.performer_id = performers.id AND ip.performer_instance = performers.instance
                   AND im.deleted_at IS NULL
                 UNION
                 SELECT gi.image_id, gi.image_instance FROM gallery_performers gp
                 JOIN gallery_images gi ON gi.gallery_id = gp.gallery_id AND gi.gallery_instance = gp.gallery_instance
                 JOIN images im2 ON im2.id = gi.image_id AND im2.instance = gi.image_instance
                 WHERE gp.performer_id = performers.id AND gp.performer_instance = performers.instance
                   AND im2.deleted_at IS NULL
             ) combined
         )
         WHERE performers.instance = ? AND performers.deleted_at IS NULL",
    )
    .bind(instance)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        "UPDATE studios SET image_count = (
             SELECT COUNT(DISTINCT combined.image_id || ':' || combined.image_instance) FROM (
                 SELECT im.id AS image_id, im.instance AS image_instance FROM images im
                 WHERE im.studio_id = studios.id AND im.studio_instance = studios.instance AND im.deleted_at IS NULL
                 UNION
                 SELECT im2.id, im2.instance FROM galleries g
                 JOIN gallery_images gi ON gi.gallery_id = g.id AND gi.gallery_instance = g.instance
                 JOIN images im2 ON im2.id = gi.image_id AND im2.instance = gi.image_instance
                 WHERE g.studio_id = studios.id AND g.studio_instance = studios.instance
                   AND g.deleted_at IS NULL AND im2.deleted_at IS NULL
             ) combined
         )
         WHERE studios.instance = ? AND studios.deleted_at IS NULL",
    )
    .bind(instance)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        "UPDATE tags SET image_count = (
             SELECT COUNT(DISTINCT combined.image_id || ':' || combined.image_instance) FROM (
                 SELECT it.image_id, it.image_instance FROM image_tags it
                 JOIN images im ON im.id = it.image_id AND im.instance = it.image_instance
                 WHERE it.tag_id = tags.id AND it.tag_instance = tags.instance AND im.deleted_at IS NULL
                 UNION
                 SELECT gi.image_id, gi.image_instance FROM gallery_tags gt
                 JOIN gallery_images gi ON gi.gallery_id = gt.gallery_id AND gi.gallery_instance = gt.gallery_instance
                 JOIN images im2 ON im2.id = gi.image_id AND im2.instance = gi.image_instance
                 WHERE gt.tag_id = tags.id AND gt.tag_instance = tags.instance AND im2.deleted_at IS NULL
             ) combined
         )
         WHERE tags.instance = ? AND tags.deleted_at IS NULL",
    )
    .bind(instance)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// C4.4: per tag, distinct scenes whose performers carry that tag.
/// Also keeps the direct `scene_count` columns (studios/performers/
/// groups/tags) current -- the schema carries them but the distilled
/// derivation list only calls out the via-performer rollup explicitly.
pub async fn derive_tag_scene_count_via_performer(tx: &mut Transaction<'_, Sqlite>, instance: &str) -> DbResult<()> {
    sqlx::query(
        "UPDATE tags SET scene_count_via_performer = (
             SELECT COUNT(DISTINCT sp.scene_id || ':' || sp.scene_instance)
             FROM scene_performers sp
             JOIN performer_tags pt ON pt.performer_id = sp.performer_id AND pt.performer_instance = sp.performer_instance
             JOIN scenes s ON s.id = sp.scene_id AND s.instance = sp.scene_instance
             WHERE pt.tag_id = tags.id AND pt.tag_instance = tags.instance AND s.deleted_at IS NULL
         ),
         scene_count = (
             SELECT COUNT(*) FROM scene_tags st
             JOIN scenes s2 ON s2.id = st.scene_id AND s2.instance = st.scene_instance
             WHERE st.tag_id = tags.id AND st.tag_instance = tags.instance AND s2.deleted_at IS NULL
         )
         WHERE tags.instance = ? AND tags.deleted_at IS NULL",
    )
    .bind(instance)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        "UPDATE studios SET scene_count = (
             SELECT COUNT(*) FROM scenes s
             WHERE s.studio_id = studios.id AND s.studio_instance = studios.instance AND s.deleted_at IS NULL
         )
         WHERE studios.instance = ? AND studios.deleted_at IS NULL",
    )
    .bind(instance)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        "UPDATE performers SET scene_count = (
             SELECT COUNT(*) FROM scene_performers sp
             JOIN scenes s ON s.id = sp.scene_id AND s.instance = sp.scene_instance
             WHERE sp.performer_id = performers.id AND sp.performer_instance = performers.instance
               AND s.deleted_at IS NULL
         )
         WHERE performers.instance = ? AND performers.deleted_at IS NULL",
    )
    .bind(instance)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        "UPDATE groups SET scene_count = (
             SELECT COUNT(*) FROM scene_groups sg
             JOIN scenes s ON s.id = sg.scene_id AND s.instance = sg.scene_instance
             WHERE sg.group_id = groups.id AND sg.group_instance = groups.instance AND s.deleted_at IS NULL
         )
         WHERE groups.instance = ? AND groups.deleted_at IS NULL",
    )
    .bind(instance)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

// Derivation 5, "user stats rebuild", is delegated to C5: every
// `ExclusionEngine::recompute_user` call refreshes `user_entity_stats`
// for that user inside its own write transaction (`commit_exclusions`).
// Derivation 6 ("exclusion recompute for all users") therefore already
// discharges derivation 5 as a side effect; there is nothing separate to
// run here.
