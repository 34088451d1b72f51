//! Batch processor (§4.3 steps 1-2): validates ids, then inside one
//! transaction deletes the junction rows this batch owns, upserts the
//! entity rows, and reinserts junctions reconstructed from the fetched
//! objects.

use stashcache_core::{Cursor, EntityKind};
use stashcache_db::{
    replace_clip_tags, replace_gallery_images, replace_gallery_performers, replace_gallery_tags, replace_group_tags,
    replace_image_performers, replace_image_tags, replace_performer_tags, replace_scene_galleries,
    replace_scene_groups, replace_scene_performers, replace_scene_tags, replace_studio_tags, replace_tag_parents,
    upsert_clips, upsert_galleries, upsert_groups, upsert_images, upsert_performers, upsert_scenes, upsert_studios,
    upsert_tags, ClipUpsert, Database, GalleryUpsert, GroupUpsert, ImageUpsert, JunctionChild, PerformerUpsert,
    SceneUpsert, StudioUpsert, TagUpsert,
};
use stashcache_upstream::model::UpstreamItem;

use crate::error::SyncResult;
use crate::validate::{filter_valid_items, valid_ids};
use crate::LOG_TARGET;

fn children(ids: &[String], instance: &str, context: &str) -> Vec<JunctionChild> {
    valid_ids(ids, context)
        .into_iter()
        .map(|id| JunctionChild::new(id, instance))
        .collect()
}

/// What a batch run of one kind observed, for cursor advancement (§4.3
/// "the *maximum raw* `updated_at` observed among items actually
/// processed").
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub processed: u64,
    pub max_cursor: Option<Cursor>,
}

pub async fn process_batch(
    db: &Database,
    instance: &str,
    kind: EntityKind,
    items: Vec<UpstreamItem>,
) -> SyncResult<BatchOutcome> {
    let items = filter_valid_items(items);
    if items.is_empty() {
        return Ok(BatchOutcome::default());
    }

    let mut max_cursor: Option<Cursor> = None;
    for item in &items {
        let candidate = Cursor::new(item.updated_at().to_string());
        max_cursor = Some(match max_cursor {
            Some(current) => current.max(&candidate).clone(),
            None => candidate,
        });
    }
    let processed = items.len() as u64;

    let mut tx = db.begin().await?;
    match kind {
        EntityKind::Tag => {
            let mut rows = Vec::with_capacity(items.len());
            let mut parents = Vec::new();
            for item in items {
                let UpstreamItem::Tag(t) = item else { unreachable!() };
                rows.push(TagUpsert {
                    id: t.id.clone(),
                    instance: instance.to_string(),
                    name: t.name,
                    image_path: t.image_path,
                    updated_at: t.updated_at,
                });
                parents.push((t.id, children(&t.parent_ids, instance, "tag.parent_ids")));
            }
            upsert_tags(&mut tx, &rows).await?;
            for (id, parents) in parents {
                replace_tag_parents(&mut tx, &id, instance, &parents).await?;
            }
        }
        EntityKind::Studio => {
            let mut rows = Vec::with_capacity(items.len());
            let mut tags = Vec::new();
            for item in items {
                let UpstreamItem::Studio(s) = item else { unreachable!() };
                rows.push(StudioUpsert {
                    id: s.id.clone(),
                    instance: instance.to_string(),
                    name: s.name,
                    parent_id: s.parent_id.clone(),
                    parent_instance: s.parent_id.as_ref().map(|_| instance.to_string()),
                    image_path: s.image_path,
                    updated_at: s.updated_at,
                });
                tags.push((s.id, children(&s.tag_ids, instance, "studio.tag_ids")));
            }
            upsert_studios(&mut tx, &rows).await?;
            for (id, tags) in tags {
                replace_studio_tags(&mut tx, &id, instance, &tags).await?;
            }
        }
        EntityKind::Performer => {
            let mut rows = Vec::with_capacity(items.len());
            let mut tags = Vec::new();
            for item in items {
                let UpstreamItem::Performer(p) = item else { unreachable!() };
                rows.push(PerformerUpsert {
                    id: p.id.clone(),
                    instance: instance.to_string(),
                    name: p.name,
                    image_path: p.image_path,
                    updated_at: p.updated_at,
                });
                tags.push((p.id, children(&p.tag_ids, instance, "performer.tag_ids")));
            }
            upsert_performers(&mut tx, &rows).await?;
            for (id, tags) in tags {
                replace_performer_tags(&mut tx, &id, instance, &tags).await?;
            }
        }
        EntityKind::Group => {
            let mut rows = Vec::with_capacity(items.len());
            let mut tags = Vec::new();
            for item in items {
                let UpstreamItem::Group(g) = item else { unreachable!() };
                rows.push(GroupUpsert {
                    id: g.id.clone(),
                    instance: instance.to_string(),
                    name: g.name,
                    parent_id: g.parent_id.clone(),
                    parent_instance: g.parent_id.as_ref().map(|_| instance.to_string()),
                    image_path: g.image_path,
                    updated_at: g.updated_at,
                });
                tags.push((g.id, children(&g.tag_ids, instance, "group.tag_ids")));
            }
            upsert_groups(&mut tx, &rows).await?;
            for (id, tags) in tags {
                replace_group_tags(&mut tx, &id, instance, &tags).await?;
            }
        }
        EntityKind::Gallery => {
            let mut rows = Vec::with_capacity(items.len());
            let mut performers = Vec::new();
            let mut tags = Vec::new();
            let mut images = Vec::new();
            for item in items {
                let UpstreamItem::Gallery(g) = item else { unreachable!() };
                rows.push(GalleryUpsert {
                    id: g.id.clone(),
                    instance: instance.to_string(),
                    title: g.title,
                    folder_path: g.folder_path,
                    cover_image_id: g.cover_image_id.clone(),
                    cover_image_instance: g.cover_image_id.as_ref().map(|_| instance.to_string()),
                    studio_id: g.studio_id.clone(),
                    studio_instance: g.studio_id.as_ref().map(|_| instance.to_string()),
                    date: g.date,
                    photographer: g.photographer,
                    details: g.details,
                    updated_at: g.updated_at,
                });
                performers.push((g.id.clone(), children(&g.performer_ids, instance, "gallery.performer_ids")));
                tags.push((g.id.clone(), children(&g.tag_ids, instance, "gallery.tag_ids")));
                images.push((g.id, children(&g.image_ids, instance, "gallery.image_ids")));
            }
            upsert_galleries(&mut tx, &rows).await?;
            for (id, rows) in performers {
                replace_gallery_performers(&mut tx, &id, instance, &rows).await?;
            }
            for (id, rows) in tags {
                replace_gallery_tags(&mut tx, &id, instance, &rows).await?;
            }
            for (id, rows) in images {
                replace_gallery_images(&mut tx, &id, instance, &rows).await?;
            }
        }
        EntityKind::Scene => {
            let mut rows = Vec::with_capacity(items.len());
            let mut performers = Vec::new();
            let mut tags = Vec::new();
            let mut groups = Vec::new();
            let mut galleries = Vec::new();
            for item in items {
                let UpstreamItem::Scene(s) = item else { unreachable!() };
                rows.push(SceneUpsert {
                    id: s.id.clone(),
                    instance: instance.to_string(),
                    title: s.title,
                    code: s.code,
                    date: s.date,
                    details: s.details,
                    director: s.director,
                    studio_id: s.studio_id.clone(),
                    studio_instance: s.studio_id.as_ref().map(|_| instance.to_string()),
                    duration: s.duration,
                    file_path: s.file_path,
                    file_codec: s.file_codec,
                    file_width: s.file_width,
                    file_height: s.file_height,
                    file_bitrate: s.file_bitrate,
                    file_size: s.file_size,
                    screenshot_path: s.screenshot_path,
                    preview_path: s.preview_path,
                    sprite_path: s.sprite_path,
                    vtt_path: s.vtt_path,
                    stream_path: s.stream_path,
                    captions_path: s.captions_path,
                    play_count: s.play_count,
                    phash: s.phash,
                    oshash: s.oshash,
                    updated_at: s.updated_at,
                });
                performers.push((s.id.clone(), children(&s.performer_ids, instance, "scene.performer_ids")));
                tags.push((s.id.clone(), children(&s.tag_ids, instance, "scene.tag_ids")));
                groups.push((s.id.clone(), children(&s.group_ids, instance, "scene.group_ids")));
                galleries.push((s.id, children(&s.gallery_ids, instance, "scene.gallery_ids")));
            }
            upsert_scenes(&mut tx, &rows).await?;
            for (id, rows) in performers {
                replace_scene_performers(&mut tx, &id, instance, &rows).await?;
            }
            for (id, rows) in tags {
                replace_scene_tags(&mut tx, &id, instance, &rows).await?;
            }
            for (id, rows) in groups {
                replace_scene_groups(&mut tx, &id, instance, &rows).await?;
            }
            for (id, rows) in galleries {
                replace_scene_galleries(&mut tx, &id, instance, &rows).await?;
            }
        }
        EntityKind::Image => {
            let mut rows = Vec::with_capacity(items.len());
            let mut performers = Vec::new();
            let mut tags = Vec::new();
            for item in items {
                let UpstreamItem::Image(i) = item else { unreachable!() };
                rows.push(ImageUpsert {
                    id: i.id.clone(),
                    instance: instance.to_string(),
                    title: i.title,
                    date: i.date,
                    studio_id: i.studio_id.clone(),
                    studio_instance: i.studio_id.as_ref().map(|_| instance.to_string()),
                    photographer: i.photographer,
                    details: i.details,
                    file_path: i.file_path,
                    file_size: i.file_size,
                    file_width: i.file_width,
                    file_height: i.file_height,
                    play_count: i.play_count,
                    updated_at: i.updated_at,
                });
                performers.push((i.id.clone(), children(&i.performer_ids, instance, "image.performer_ids")));
                tags.push((i.id, children(&i.tag_ids, instance, "image.tag_ids")));
            }
            upsert_images(&mut tx, &rows).await?;
            for (id, rows) in performers {
                replace_image_performers(&mut tx, &id, instance, &rows).await?;
            }
            for (id, rows) in tags {
                replace_image_tags(&mut tx, &id, instance, &rows).await?;
            }
        }
        EntityKind::Clip => {
            let mut rows = Vec::with_capacity(items.len());
            let mut tags = Vec::new();
            for item in items {
                let UpstreamItem::Clip(c) = item else { unreachable!() };
                rows.push(ClipUpsert {
                    id: c.id.clone(),
                    instance: instance.to_string(),
                    scene_id: c.scene_id.clone(),
                    scene_instance: instance.to_string(),
                    title: c.title,
                    seconds: c.seconds,
                    end_seconds: c.end_seconds,
                    primary_tag_id: c.primary_tag_id.clone(),
                    primary_tag_instance: c.primary_tag_id.as_ref().map(|_| instance.to_string()),
                    preview_path: c.preview_path,
                    screenshot_path: c.screenshot_path,
                    stream_path: c.stream_path,
                    updated_at: c.updated_at,
                });
                tags.push((c.id, children(&c.tag_ids, instance, "clip.tag_ids")));
            }
            upsert_clips(&mut tx, &rows).await?;
            for (id, tags) in tags {
                replace_clip_tags(&mut tx, &id, instance, &tags).await?;
            }
        }
    }
    tx.commit().await?;

    tracing::debug!(target: LOG_TARGET, instance, %kind, processed, "batch committed");
    Ok(BatchOutcome { processed, max_cursor })
}
