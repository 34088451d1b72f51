//! Batch-upsert rows for each mirrored kind (§4.3 batch processor step 2:
//! "upsert entity rows via a single multi-row `INSERT ... ON CONFLICT(id,
//! instance) DO UPDATE`, clears `deletedAt`").

use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};

use crate::DbResult;

#[derive(Debug, Clone, Default)]
pub struct SceneUpsert {
    pub id: String,
    pub instance: String,
    pub title: Option<String>,
    pub code: Option<String>,
    pub date: Option<String>,
    pub details: Option<String>,
    pub director: Option<String>,
    pub studio_id: Option<String>,
    pub studio_instance: Option<String>,
    pub duration: Option<f64>,
    pub file_path: Option<String>,
    pub file_codec: Option<String>,
    pub file_width: Option<i64>,
    pub file_height: Option<i64>,
    pub file_bitrate: Option<i64>,
    pub file_size: Option<i64>,
    pub screenshot_path: Option<String>,
    pub preview_path: Option<String>,
    pub sprite_path: Option<String>,
    pub vtt_path: Option<String>,
    pub stream_path: Option<String>,
    pub captions_path: Option<String>,
    pub play_count: i64,
    pub phash: Option<String>,
    pub oshash: Option<String>,
    pub updated_at: String,
}

pub async fn upsert_scenes(tx: &mut Transaction<'_, Sqlite>, rows: &[SceneUpsert]) -> DbResult<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "INSERT INTO scenes (id, instance, title, code, date, details, director, studio_id, \
         studio_instance, duration, file_path, file_codec, file_width, file_height, \
         file_bitrate, file_size, screenshot_path, preview_path, sprite_path, vtt_path, \
         stream_path, captions_path, play_count, phash, oshash, updated_at, deleted_at) ",
    );
    qb.push_values(rows, |mut b, r| {
        b.push_bind(&r.id)
            .push_bind(&r.instance)
            .push_bind(&r.title)
            .push_bind(&r.code)
            .push_bind(&r.date)
            .push_bind(&r.details)
            .push_bind(&r.director)
            .push_bind(&r.studio_id)
            .push_bind(&r.studio_instance)
            .push_bind(r.duration)
            .push_bind(&r.file_path)
            .push_bind(&r.file_codec)
            .push_bind(r.file_width)
            .push_bind(r.file_height)
            .push_bind(r.file_bitrate)
            .push_bind(r.file_size)
            .push_bind(&r.screenshot_path)
            .push_bind(&r.preview_path)
            .push_bind(&r.sprite_path)
            .push_bind(&r.vtt_path)
            .push_bind(&r.stream_path)
            .push_bind(&r.captions_path)
            .push_bind(r.play_count)
            .push_bind(&r.phash)
            .push_bind(&r.oshash)
            .push_bind(&r.updated_at)
            .push_bind(None::<String>);
    });
    qb.push(
        " ON CONFLICT(id, instance) DO UPDATE SET \
          title = excluded.title, code = excluded.code, date = excluded.date, \
          details = excluded.details, director = excluded.director, \
          studio_id = excluded.studio_id, studio_instance = excluded.studio_instance, \
          duration = excluded.duration, file_path = excluded.file_path, \
          file_codec = excluded.file_codec, file_width = excluded.file_width, \
          file_height = excluded.file_height, file_bitrate = excluded.file_bitrate, \
          file_size = excluded.file_size, screenshot_path = excluded.screenshot_path, \
          preview_path = excluded.preview_path, sprite_path = excluded.sprite_path, \
          vtt_path = excluded.vtt_path, stream_path = excluded.stream_path, \
          captions_path = excluded.captions_path, phash = excluded.phash, \
          oshash = excluded.oshash, updated_at = excluded.updated_at, deleted_at = NULL",
    );
    qb.build().execute(&mut **tx).await?;
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct ImageUpsert {
    pub id: String,
    pub instance: String,
    pub title: Option<String>,
    pub date: Option<String>,
    pub studio_id: Option<String>,
    pub studio_instance: Option<String>,
    pub photographer: Option<String>,
    pub details: Option<String>,
    pub file_path: Option<String>,
    pub file_size: Option<i64>,
    pub file_width: Option<i64>,
    pub file_height: Option<i64>,
    pub play_count: i64,
    pub updated_at: String,
}

pub async fn upsert_images(tx: &mut Transaction<'_, Sqlite>, rows: &[ImageUpsert]) -> DbResult<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "INSERT INTO images (id, instance, title, date, studio_id, studio_instance, \
         photographer, details, file_path, file_size, file_width, file_height, play_count, \
         updated_at, deleted_at) ",
    );
    qb.push_values(rows, |mut b, r| {
        b.push_bind(&r.id)
            .push_bind(&r.instance)
            .push_bind(&r.title)
            .push_bind(&r.date)
            .push_bind(&r.studio_id)
            .push_bind(&r.studio_instance)
            .push_bind(&r.photographer)
            .push_bind(&r.details)
            .push_bind(&r.file_path)
            .push_bind(r.file_size)
            .push_bind(r.file_width)
            .push_bind(r.file_height)
            .push_bind(r.play_count)
            .push_bind(&r.updated_at)
            .push_bind(None::<String>);
    });
    qb.push(
        " ON CONFLICT(id, instance) DO UPDATE SET \
          title = excluded.title, date = excluded.date, studio_id = excluded.studio_id, \
          studio_instance = excluded.studio_instance, photographer = excluded.photographer, \
          details = excluded.details, file_path = excluded.file_path, \
          file_size = excluded.file_size, file_width = excluded.file_width, \
          file_height = excluded.file_height, updated_at = excluded.updated_at, \
          deleted_at = NULL",
    );
    qb.build().execute(&mut **tx).await?;
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct GalleryUpsert {
    pub id: String,
    pub instance: String,
    pub title: Option<String>,
    pub folder_path: Option<String>,
    pub cover_image_id: Option<String>,
    pub cover_image_instance: Option<String>,
    pub studio_id: Option<String>,
    pub studio_instance: Option<String>,
    pub date: Option<String>,
    pub photographer: Option<String>,
    pub details: Option<String>,
    pub updated_at: String,
}

pub async fn upsert_galleries(
    tx: &mut Transaction<'_, Sqlite>,
    rows: &[GalleryUpsert],
) -> DbResult<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "INSERT INTO galleries (id, instance, title, folder_path, cover_image_id, \
         cover_image_instance, studio_id, studio_instance, date, photographer, details, \
         updated_at, deleted_at) ",
    );
    qb.push_values(rows, |mut b, r| {
        b.push_bind(&r.id)
            .push_bind(&r.instance)
            .push_bind(&r.title)
            .push_bind(&r.folder_path)
            .push_bind(&r.cover_image_id)
            .push_bind(&r.cover_image_instance)
            .push_bind(&r.studio_id)
            .push_bind(&r.studio_instance)
            .push_bind(&r.date)
            .push_bind(&r.photographer)
            .push_bind(&r.details)
            .push_bind(&r.updated_at)
            .push_bind(None::<String>);
    });
    qb.push(
        " ON CONFLICT(id, instance) DO UPDATE SET \
          title = excluded.title, folder_path = excluded.folder_path, \
          cover_image_id = excluded.cover_image_id, \
          cover_image_instance = excluded.cover_image_instance, \
          studio_id = excluded.studio_id, studio_instance = excluded.studio_instance, \
          date = excluded.date, photographer = excluded.photographer, \
          details = excluded.details, updated_at = excluded.updated_at, deleted_at = NULL",
    );
    qb.build().execute(&mut **tx).await?;
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct PerformerUpsert {
    pub id: String,
    pub instance: String,
    pub name: String,
    pub image_path: Option<String>,
    pub updated_at: String,
}

pub async fn upsert_performers(
    tx: &mut Transaction<'_, Sqlite>,
    rows: &[PerformerUpsert],
) -> DbResult<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("INSERT INTO performers (id, instance, name, image_path, updated_at, deleted_at) ");
    qb.push_values(rows, |mut b, r| {
        b.push_bind(&r.id)
            .push_bind(&r.instance)
            .push_bind(&r.name)
            .push_bind(&r.image_path)
            .push_bind(&r.updated_at)
            .push_bind(None::<String>);
    });
    qb.push(
        " ON CONFLICT(id, instance) DO UPDATE SET name = excluded.name, \
          image_path = excluded.image_path, updated_at = excluded.updated_at, deleted_at = NULL",
    );
    qb.build().execute(&mut **tx).await?;
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct StudioUpsert {
    pub id: String,
    pub instance: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub parent_instance: Option<String>,
    pub image_path: Option<String>,
    pub updated_at: String,
}

pub async fn upsert_studios(tx: &mut Transaction<'_, Sqlite>, rows: &[StudioUpsert]) -> DbResult<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "INSERT INTO studios (id, instance, name, parent_id, parent_instance, image_path, \
         updated_at, deleted_at) ",
    );
    qb.push_values(rows, |mut b, r| {
        b.push_bind(&r.id)
            .push_bind(&r.instance)
            .push_bind(&r.name)
            .push_bind(&r.parent_id)
            .push_bind(&r.parent_instance)
            .push_bind(&r.image_path)
            .push_bind(&r.updated_at)
            .push_bind(None::<String>);
    });
    qb.push(
        " ON CONFLICT(id, instance) DO UPDATE SET name = excluded.name, \
          parent_id = excluded.parent_id, parent_instance = excluded.parent_instance, \
          image_path = excluded.image_path, updated_at = excluded.updated_at, deleted_at = NULL",
    );
    qb.build().execute(&mut **tx).await?;
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct TagUpsert {
    pub id: String,
    pub instance: String,
    pub name: String,
    pub image_path: Option<String>,
    pub updated_at: String,
}

pub async fn upsert_tags(tx: &mut Transaction<'_, Sqlite>, rows: &[TagUpsert]) -> DbResult<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("INSERT INTO tags (id, instance, name, image_path, updated_at, deleted_at) ");
    qb.push_values(rows, |mut b, r| {
        b.push_bind(&r.id)
            .push_bind(&r.instance)
            .push_bind(&r.name)
            .push_bind(&r.image_path)
            .push_bind(&r.updated_at)
            .push_bind(None::<String>);
    });
    qb.push(
        " ON CONFLICT(id, instance) DO UPDATE SET name = excluded.name, \
          image_path = excluded.image_path, updated_at = excluded.updated_at, deleted_at = NULL",
    );
    qb.build().execute(&mut **tx).await?;
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct GroupUpsert {
    pub id: String,
    pub instance: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub parent_instance: Option<String>,
    pub image_path: Option<String>,
    pub updated_at: String,
}

pub async fn upsert_groups(tx: &mut Transaction<'_, Sqlite>, rows: &[GroupUpsert]) -> DbResult<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "INSERT INTO groups (id, instance, name, parent_id, parent_instance, image_path, \
         updated_at, deleted_at) ",
    );
    qb.push_values(rows, |mut b, r| {
        b.push_bind(&r.id)
            .push_bind(&r.instance)
            .push_bind(&r.name)
            .push_bind(&r.parent_id)
            .push_bind(&r.parent_instance)
            .push_bind(&r.image_path)
            .push_bind(&r.updated_at)
            .push_bind(None::<String>);
    });
    qb.push(
        " ON CONFLICT(id, instance) DO UPDATE SET name = excluded.name, \
          parent_id = excluded.parent_id, parent_instance = excluded.parent_instance, \
          image_path = excluded.image_path, updated_at = excluded.updated_at, deleted_at = NULL",
    );
    qb.build().execute(&mut **tx).await?;
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct ClipUpsert {
    pub id: String,
    pub instance: String,
    pub scene_id: String,
    pub scene_instance: String,
    pub title: Option<String>,
    pub seconds: f64,
    pub end_seconds: Option<f64>,
    pub primary_tag_id: Option<String>,
    pub primary_tag_instance: Option<String>,
    pub preview_path: Option<String>,
    pub screenshot_path: Option<String>,
    pub stream_path: Option<String>,
    pub updated_at: String,
}

pub async fn upsert_clips(tx: &mut Transaction<'_, Sqlite>, rows: &[ClipUpsert]) -> DbResult<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "INSERT INTO clips (id, instance, scene_id, scene_instance, title, seconds, \
         end_seconds, primary_tag_id, primary_tag_instance, preview_path, screenshot_path, \
         stream_path, updated_at, deleted_at) ",
    );
    qb.push_values(rows, |mut b, r| {
        b.push_bind(&r.id)
            .push_bind(&r.instance)
            .push_bind(&r.scene_id)
            .push_bind(&r.scene_instance)
            .push_bind(&r.title)
            .push_bind(r.seconds)
            .push_bind(r.end_seconds)
            .push_bind(&r.primary_tag_id)
            .push_bind(&r.primary_tag_instance)
            .push_bind(&r.preview_path)
            .push_bind(&r.screenshot_path)
            .push_bind(&r.stream_path)
            .push_bind(&r.updated_at)
            .push_bind(None::<String>);
    });
    qb.push(
        " ON CONFLICT(id, instance) DO UPDATE SET scene_id = excluded.scene_id, \
          scene_instance = excluded.scene_instance, title = excluded.title, \
          seconds = excluded.seconds, end_seconds = excluded.end_seconds, \
          primary_tag_id = excluded.primary_tag_id, \
          primary_tag_instance = excluded.primary_tag_instance, \
          preview_path = excluded.preview_path, screenshot_path = excluded.screenshot_path, \
          stream_path = excluded.stream_path, updated_at = excluded.updated_at, deleted_at = NULL",
    );
    qb.build().execute(&mut **tx).await?;
    Ok(())
}

/// Writes a clip's probed preview classification (§4.7: "produced by
/// C8", not by the sync engine, so this runs outside a sync batch's
/// transaction).
pub async fn set_clip_generated(pool: &SqlitePool, id: &str, instance: &str, generated: bool) -> DbResult<()> {
    sqlx::query("UPDATE clips SET is_generated = ? WHERE id = ? AND instance = ?")
        .bind(generated)
        .bind(id)
        .bind(instance)
        .execute(pool)
        .await?;
    Ok(())
}

/// A clip C8 hasn't classified yet (§6 "re-probe ungenerated clips"):
/// `is_generated` is still unset and there's a preview URL to probe.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingClipRow {
    pub id: String,
    pub instance: String,
    pub preview_path: String,
}

/// Lists clips still awaiting a preview-generated verdict, optionally
/// scoped to one instance, capped at `limit` per call so a re-probe
/// request can't enqueue an unbounded HTTP fan-out in one go.
pub async fn clips_pending_probe(pool: &SqlitePool, instance: Option<&str>, limit: i64) -> DbResult<Vec<PendingClipRow>> {
    let rows = match instance {
        Some(instance) => {
            sqlx::query_as::<_, PendingClipRow>(
                "SELECT id, instance, preview_path FROM clips \
                 WHERE instance = ? AND deleted_at IS NULL AND is_generated IS NULL AND preview_path IS NOT NULL \
                 ORDER BY id LIMIT ?",
            )
            .bind(instance)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, PendingClipRow>(
                "SELECT id, instance, preview_path FROM clips \
                 WHERE deleted_at IS NULL AND is_generated IS NULL AND preview_path IS NOT NULL \
                 ORDER BY id LIMIT ?",
            )
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows)
}
