//! Relation hydration (§4.6): given a page of primary rows, batches one
//! query per related kind over the page's junction rows instead of one
//! query per primary row.

use std::collections::HashMap;

use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use stashcache_core::EntityKind;

use crate::error::QueryResult;
use crate::meta::meta;

/// A lightweight related entity, enough for a list item to display a
/// chip/link without re-querying the related kind's full row.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedRef {
    pub id: String,
    pub instance: String,
    pub name: Option<String>,
}

/// A primary entity's composite key, `(id, instance)`.
pub type PrimaryKey = (String, String);

/// Hydrates `other_kind` relations for a page of `primary_kind`
/// entities. Returns an empty map (not an error) when the two kinds
/// have no junction -- that's a caller mistake the builder's own
/// filter validation would already have caught.
pub async fn hydrate_junction(
    pool: &SqlitePool,
    primary_kind: EntityKind,
    other_kind: EntityKind,
    primary_keys: &[PrimaryKey],
) -> QueryResult<HashMap<PrimaryKey, Vec<RelatedRef>>> {
    let mut result: HashMap<PrimaryKey, Vec<RelatedRef>> = HashMap::new();
    if primary_keys.is_empty() {
        return Ok(result);
    }
    let m = meta(primary_kind);
    let Some(jd) = m.junction(other_kind) else {
        return Ok(result);
    };

    let union_sql = jd
        .tables
        .iter()
        .map(|(table, self_id, self_inst, other_id, other_inst)| {
            format!("SELECT {self_id} AS sid, {self_inst} AS sinst, {other_id} AS oid, {other_inst} AS oinst FROM {table}")
        })
        .collect::<Vec<_>>()
        .join(" UNION ALL ");

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT sid, sinst, oid, oinst FROM ({union_sql}) j WHERE "));
    for (i, (id, instance)) in primary_keys.iter().enumerate() {
        if i > 0 {
            qb.push(" OR ");
        }
        qb.push("(sid = ").push_bind(id.clone()).push(" AND sinst = ").push_bind(instance.clone()).push(")");
    }
    let junction_rows: Vec<SqliteRow> = qb.build().fetch_all(pool).await?;

    let mut links: Vec<(PrimaryKey, PrimaryKey)> = Vec::with_capacity(junction_rows.len());
    let mut related_keys: Vec<PrimaryKey> = Vec::new();
    for row in &junction_rows {
        let sid: String = row.try_get("sid")?;
        let sinst: String = row.try_get("sinst")?;
        let oid: String = row.try_get("oid")?;
        let oinst: String = row.try_get("oinst")?;
        related_keys.push((oid.clone(), oinst.clone()));
        links.push(((sid, sinst), (oid, oinst)));
    }
    related_keys.sort();
    related_keys.dedup();
    if related_keys.is_empty() {
        return Ok(result);
    }

    let related_meta = meta(other_kind);
    let mut rqb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT id, instance{} FROM {} WHERE deleted_at IS NULL AND (",
        related_meta.name_column.map(|c| format!(", {c} AS name")).unwrap_or_default(),
        related_meta.table
    ));
    for (i, (id, instance)) in related_keys.iter().enumerate() {
        if i > 0 {
            rqb.push(" OR ");
        }
        rqb.push("(id = ").push_bind(id.clone()).push(" AND instance = ").push_bind(instance.clone()).push(")");
    }
    rqb.push(")");
    let related_rows: Vec<SqliteRow> = rqb.build().fetch_all(pool).await?;

    let mut refs: HashMap<PrimaryKey, RelatedRef> = HashMap::with_capacity(related_rows.len());
    for row in related_rows {
        let id: String = row.try_get("id")?;
        let instance: String = row.try_get("instance")?;
        let name: Option<String> = if related_meta.name_column.is_some() { row.try_get("name")? } else { None };
        refs.insert((id.clone(), instance.clone()), RelatedRef { id, instance, name });
    }

    // Orphan junctions (target row missing, e.g. soft-deleted) are
    // silently skipped rather than surfacing a partial/error result.
    for (primary_key, related_key) in links {
        if let Some(r) = refs.get(&related_key) {
            result.entry(primary_key).or_default().push(r.clone());
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use stashcache_db::{replace_scene_inherited_tags, replace_scene_tags, upsert_scenes, upsert_tags, Database, JunctionChild, SceneUpsert, TagUpsert};

    use super::*;

    async fn seeded() -> Database {
        let db = Database::open_in_memory().await.unwrap();
        let mut tx = db.begin().await.unwrap();
        upsert_scenes(&mut tx, &[SceneUpsert { id: "s1".into(), instance: "".into(), updated_at: "2024-01-01T00:00:00Z".into(), ..Default::default() }])
            .await
            .unwrap();
        upsert_tags(
            &mut tx,
            &[
                TagUpsert { id: "t1".into(), instance: "".into(), name: "Direct".into(), updated_at: "2024-01-01T00:00:00Z".into(), ..Default::default() },
                TagUpsert { id: "t2".into(), instance: "".into(), name: "Inherited".into(), updated_at: "2024-01-01T00:00:00Z".into(), ..Default::default() },
            ],
        )
        .await
        .unwrap();
        // orphan: a direct-tag junction row pointing at a tag id that was never upserted.
        replace_scene_tags(&mut tx, "s1", "", &[JunctionChild::new("t1", ""), JunctionChild::new("ghost", "")]).await.unwrap();
        replace_scene_inherited_tags(&mut tx, "s1", "", &[JunctionChild::new("t2", "")]).await.unwrap();
        tx.commit().await.unwrap();
        db
    }

    #[tokio::test]
    async fn hydrates_direct_and_inherited_tags_and_skips_orphans() {
        let db = seeded().await;
        let map = hydrate_junction(db.pool(), EntityKind::Scene, EntityKind::Tag, &[("s1".into(), "".into())]).await.unwrap();
        let mut names: Vec<_> = map.get(&("s1".to_string(), String::new())).unwrap().iter().map(|r| r.name.clone().unwrap()).collect();
        names.sort();
        assert_eq!(names, vec!["Direct".to_string(), "Inherited".to_string()]);
    }

    #[tokio::test]
    async fn no_junction_between_kinds_yields_empty_map() {
        let db = seeded().await;
        let map = hydrate_junction(db.pool(), EntityKind::Tag, EntityKind::Scene, &[("t1".into(), "".into())]).await.unwrap();
        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn empty_primary_keys_yields_empty_map_without_querying() {
        let db = seeded().await;
        let map = hydrate_junction(db.pool(), EntityKind::Scene, EntityKind::Tag, &[]).await.unwrap();
        assert!(map.is_empty());
    }
}
