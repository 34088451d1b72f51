//! Junction-table batch replace helpers (§4.3 batch processor step 3:
//! "delete and reinsert the junction rows for each synced parent").
//!
//! Junction tables have no `updated_at` of their own, so there's nothing to
//! diff against; each sync pass just clears a parent's rows and reinserts
//! whatever the upstream response says they are now.

use sqlx::{QueryBuilder, Sqlite, Transaction};

use crate::DbResult;

/// One child-side key of a junction row.
#[derive(Debug, Clone)]
pub struct JunctionChild {
    pub id: String,
    pub instance: String,
}

impl JunctionChild {
    pub fn new(id: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            instance: instance.into(),
        }
    }
}

/// Deletes all rows for `(parent_id, parent_instance)` in `table` and
/// reinserts `children`, inside `tx`. `table` and the four column names are
/// always literal call-site constants (see the wrappers below), never
/// user input.
async fn replace_junction(
    tx: &mut Transaction<'_, Sqlite>,
    table: &str,
    parent_id_col: &str,
    parent_instance_col: &str,
    child_id_col: &str,
    child_instance_col: &str,
    parent_id: &str,
    parent_instance: &str,
    children: &[JunctionChild],
) -> DbResult<()> {
    let delete_sql = format!("DELETE FROM {table} WHERE {parent_id_col} = ? AND {parent_instance_col} = ?");
    sqlx::query(&delete_sql)
        .bind(parent_id)
        .bind(parent_instance)
        .execute(&mut **tx)
        .await?;

    if children.is_empty() {
        return Ok(());
    }

    let insert_head =
        format!("INSERT INTO {table} ({parent_id_col}, {parent_instance_col}, {child_id_col}, {child_instance_col}) ");
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(insert_head);
    qb.push_values(children, |mut b, c| {
        b.push_bind(parent_id)
            .push_bind(parent_instance)
            .push_bind(&c.id)
            .push_bind(&c.instance);
    });
    qb.build().execute(&mut **tx).await?;
    Ok(())
}

macro_rules! junction_replacer {
    ($fn_name:ident, $table:literal, $parent_id:literal, $parent_instance:literal, $child_id:literal, $child_instance:literal) => {
        pub async fn $fn_name(
            tx: &mut Transaction<'_, Sqlite>,
            parent_id: &str,
            parent_instance: &str,
            children: &[JunctionChild],
        ) -> DbResult<()> {
            replace_junction(
                tx,
                $table,
                $parent_id,
                $parent_instance,
                $child_id,
                $child_instance,
                parent_id,
                parent_instance,
                children,
            )
            .await
        }
    };
}

junction_replacer!(replace_tag_parents, "tag_parents", "tag_id", "tag_instance", "parent_tag_id", "parent_instance");
junction_replacer!(
    replace_performer_tags,
    "performer_tags",
    "performer_id",
    "performer_instance",
    "tag_id",
    "tag_instance"
);
junction_replacer!(
    replace_studio_tags,
    "studio_tags",
    "studio_id",
    "studio_instance",
    "tag_id",
    "tag_instance"
);
junction_replacer!(replace_group_tags, "group_tags", "group_id", "group_instance", "tag_id", "tag_instance");
junction_replacer!(
    replace_gallery_performers,
    "gallery_performers",
    "gallery_id",
    "gallery_instance",
    "performer_id",
    "performer_instance"
);
junction_replacer!(
    replace_gallery_tags,
    "gallery_tags",
    "gallery_id",
    "gallery_instance",
    "tag_id",
    "tag_instance"
);
junction_replacer!(
    replace_scene_inherited_tags,
    "scene_inherited_tags",
    "scene_id",
    "scene_instance",
    "tag_id",
    "tag_instance"
);
junction_replacer!(
    replace_scene_performers,
    "scene_performers",
    "scene_id",
    "scene_instance",
    "performer_id",
    "performer_instance"
);
junction_replacer!(replace_scene_tags, "scene_tags", "scene_id", "scene_instance", "tag_id", "tag_instance");
junction_replacer!(replace_scene_groups, "scene_groups", "scene_id", "scene_instance", "group_id", "group_instance");
junction_replacer!(
    replace_scene_galleries,
    "scene_galleries",
    "scene_id",
    "scene_instance",
    "gallery_id",
    "gallery_instance"
);
junction_replacer!(
    replace_gallery_images,
    "gallery_images",
    "gallery_id",
    "gallery_instance",
    "image_id",
    "image_instance"
);
junction_replacer!(
    replace_image_performers,
    "image_performers",
    "image_id",
    "image_instance",
    "performer_id",
    "performer_instance"
);
junction_replacer!(replace_image_tags, "image_tags", "image_id", "image_instance", "tag_id", "tag_instance");
junction_replacer!(replace_clip_tags, "clip_tags", "clip_id", "clip_instance", "tag_id", "tag_instance");
