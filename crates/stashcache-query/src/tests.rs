use sqlx::Row;
use stashcache_core::{EntityKind, SortDirection};
use stashcache_db::{replace_performer_tags, replace_tag_parents, upsert_performers, upsert_tags, Database, JunctionChild, PerformerUpsert, TagUpsert};

use crate::{
    clips_for_scene, count, get_by_id, list, resolve_hierarchy_filters, row_to_json, DateModifier, FilterClause, IdModifier, NumericModifier,
    QueryOptions, TextModifier,
};

async fn seeded_performers() -> Database {
    let db = Database::open_in_memory().await.unwrap();
    let mut tx = db.begin().await.unwrap();
    upsert_performers(
        &mut tx,
        &[
            PerformerUpsert { id: "p1".into(), instance: "".into(), name: "Alice".into(), updated_at: "2024-01-01T00:00:00Z".into(), ..Default::default() },
            PerformerUpsert { id: "p2".into(), instance: "".into(), name: "Bob".into(), updated_at: "2024-01-02T00:00:00Z".into(), ..Default::default() },
            PerformerUpsert { id: "p3".into(), instance: "other".into(), name: "Carol".into(), updated_at: "2024-01-03T00:00:00Z".into(), ..Default::default() },
        ],
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();
    db
}

#[tokio::test]
async fn list_sorts_by_name_and_paginates() {
    let db = seeded_performers().await;
    let opts = QueryOptions { per_page: 1, page: 2, specific_instance_id: Some("".into()), ..Default::default() };
    let page = list(db.pool(), EntityKind::Performer, &opts).await.unwrap();
    assert_eq!(page.total, 2); // scoped to the legacy "" instance only.
    let name: String = page.items[0].try_get("name").unwrap();
    assert_eq!(name, "Bob");
}

#[tokio::test]
async fn no_instance_scope_sees_every_instance() {
    let db = seeded_performers().await;
    let opts = QueryOptions::default();
    assert_eq!(count(db.pool(), EntityKind::Performer, &opts).await.unwrap(), 3);
}

#[tokio::test]
async fn specific_instance_id_scopes_to_one_instance() {
    let db = seeded_performers().await;
    let opts = QueryOptions { specific_instance_id: Some("other".into()), ..Default::default() };
    let page = list(db.pool(), EntityKind::Performer, &opts).await.unwrap();
    assert_eq!(page.total, 1);
    let name: String = page.items[0].try_get("name").unwrap();
    assert_eq!(name, "Carol");
}

#[tokio::test]
async fn text_filter_equals_is_case_insensitive() {
    let db = seeded_performers().await;
    let opts = QueryOptions {
        filters: vec![FilterClause::Text { field: "name", modifier: TextModifier::Equals, value: Some("alice".into()) }],
        ..Default::default()
    };
    assert_eq!(count(db.pool(), EntityKind::Performer, &opts).await.unwrap(), 1);
}

#[tokio::test]
async fn unknown_text_field_is_rejected() {
    let db = seeded_performers().await;
    let opts = QueryOptions {
        filters: vec![FilterClause::Text { field: "nickname", modifier: TextModifier::Equals, value: Some("x".into()) }],
        ..Default::default()
    };
    assert!(count(db.pool(), EntityKind::Performer, &opts).await.is_err());
}

#[tokio::test]
async fn id_filter_with_empty_ids_yields_no_clause() {
    let db = seeded_performers().await;
    let opts = QueryOptions { filters: vec![FilterClause::Id { field: "id", modifier: IdModifier::Includes, ids: vec![] }], ..Default::default() };
    // An empty IN() would match nothing; the builder must skip the clause instead.
    assert_eq!(count(db.pool(), EntityKind::Performer, &opts).await.unwrap(), 2);
}

#[tokio::test]
async fn numeric_between_filters_scene_duration() {
    let db = Database::open_in_memory().await.unwrap();
    let mut tx = db.begin().await.unwrap();
    stashcache_db::upsert_scenes(
        &mut tx,
        &[
            stashcache_db::SceneUpsert { id: "s1".into(), instance: "".into(), duration: Some(100.0), updated_at: "2024-01-01T00:00:00Z".into(), ..Default::default() },
            stashcache_db::SceneUpsert { id: "s2".into(), instance: "".into(), duration: Some(900.0), updated_at: "2024-01-01T00:00:00Z".into(), ..Default::default() },
        ],
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let opts = QueryOptions {
        filters: vec![FilterClause::Numeric { field: "duration", modifier: NumericModifier::Between, value: 50.0, value2: Some(200.0) }],
        ..Default::default()
    };
    assert_eq!(count(db.pool(), EntityKind::Scene, &opts).await.unwrap(), 1);
}

#[tokio::test]
async fn date_is_null_filter_matches_scenes_with_no_date() {
    let db = Database::open_in_memory().await.unwrap();
    let mut tx = db.begin().await.unwrap();
    stashcache_db::upsert_scenes(
        &mut tx,
        &[
            stashcache_db::SceneUpsert { id: "s1".into(), instance: "".into(), date: None, updated_at: "2024-01-01T00:00:00Z".into(), ..Default::default() },
            stashcache_db::SceneUpsert { id: "s2".into(), instance: "".into(), date: Some("2024-05-01".into()), updated_at: "2024-01-01T00:00:00Z".into(), ..Default::default() },
        ],
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let opts = QueryOptions { filters: vec![FilterClause::Date { field: "date", modifier: DateModifier::IsNull, value: None, value2: None }], ..Default::default() };
    assert_eq!(count(db.pool(), EntityKind::Scene, &opts).await.unwrap(), 1);
}

#[tokio::test]
async fn random_sort_is_stable_across_identical_seeds() {
    let db = Database::open_in_memory().await.unwrap();
    let mut tx = db.begin().await.unwrap();
    stashcache_db::upsert_performers(
        &mut tx,
        &(1..=10)
            .map(|i| PerformerUpsert { id: format!("p{i}"), instance: "".into(), name: format!("P{i}"), updated_at: "2024-01-01T00:00:00Z".into(), ..Default::default() })
            .collect::<Vec<_>>(),
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let opts = QueryOptions { sort_key: "random".into(), random_seed: Some(42), per_page: 10, ..Default::default() };
    let first = list(db.pool(), EntityKind::Performer, &opts).await.unwrap();
    let second = list(db.pool(), EntityKind::Performer, &opts).await.unwrap();
    let ids_a: Vec<String> = first.items.iter().map(|r| r.try_get::<String, _>("id").unwrap()).collect();
    let ids_b: Vec<String> = second.items.iter().map(|r| r.try_get::<String, _>("id").unwrap()).collect();
    assert_eq!(ids_a, ids_b);
    assert_eq!(ids_a.len(), 10);
}

#[tokio::test]
async fn hierarchy_filter_expands_tag_descendants_into_a_junction_clause() {
    let db = Database::open_in_memory().await.unwrap();
    let mut tx = db.begin().await.unwrap();
    upsert_tags(
        &mut tx,
        &[
            TagUpsert { id: "parent".into(), instance: "".into(), name: "Parent".into(), updated_at: "2024-01-01T00:00:00Z".into(), ..Default::default() },
            TagUpsert { id: "child".into(), instance: "".into(), name: "Child".into(), updated_at: "2024-01-01T00:00:00Z".into(), ..Default::default() },
        ],
    )
    .await
    .unwrap();
    // tag_parents is (tag_id, tag_instance) -> (parent_tag_id, parent_instance);
    // "child"'s parent row is keyed by the parent's id.
    replace_tag_parents(&mut tx, "child", "", &[JunctionChild::new("parent", "")]).await.unwrap();
    upsert_performers(&mut tx, &[PerformerUpsert { id: "p1".into(), instance: "".into(), name: "Alice".into(), updated_at: "2024-01-01T00:00:00Z".into(), ..Default::default() }])
        .await
        .unwrap();
    replace_performer_tags(&mut tx, "p1", "", &[JunctionChild::new("child", "")]).await.unwrap();
    tx.commit().await.unwrap();

    let m = crate::meta(EntityKind::Performer);
    let filters = vec![FilterClause::Hierarchy { kind: EntityKind::Tag, ids: vec!["parent".into()], depth: 1, modifier: IdModifier::Includes }];
    let resolved = resolve_hierarchy_filters(db.pool(), "", &m, filters).await.unwrap();

    let opts = QueryOptions { filters: resolved, ..Default::default() };
    assert_eq!(count(db.pool(), EntityKind::Performer, &opts).await.unwrap(), 1);
}

#[tokio::test]
async fn get_by_id_finds_the_matching_instance_only() {
    let db = seeded_performers().await;
    let row = get_by_id(db.pool(), EntityKind::Performer, "p1", "").await.unwrap();
    let name: String = row.unwrap().try_get("name").unwrap();
    assert_eq!(name, "Alice");

    assert!(get_by_id(db.pool(), EntityKind::Performer, "p1", "other").await.unwrap().is_none());
    assert!(get_by_id(db.pool(), EntityKind::Performer, "nonexistent", "").await.unwrap().is_none());
}

#[tokio::test]
async fn clips_for_scene_orders_by_position() {
    let db = Database::open_in_memory().await.unwrap();
    let mut tx = db.begin().await.unwrap();
    stashcache_db::upsert_scenes(&mut tx, &[stashcache_db::SceneUpsert { id: "s1".into(), instance: "".into(), updated_at: "2024-01-01T00:00:00Z".into(), ..Default::default() }])
        .await
        .unwrap();
    stashcache_db::upsert_clips(
        &mut tx,
        &[
            stashcache_db::ClipUpsert { id: "c2".into(), instance: "".into(), scene_id: "s1".into(), scene_instance: "".into(), seconds: 30.0, updated_at: "2024-01-01T00:00:00Z".into(), ..Default::default() },
            stashcache_db::ClipUpsert { id: "c1".into(), instance: "".into(), scene_id: "s1".into(), scene_instance: "".into(), seconds: 5.0, updated_at: "2024-01-01T00:00:00Z".into(), ..Default::default() },
        ],
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let rows = clips_for_scene(db.pool(), "s1", "").await.unwrap();
    let ids: Vec<String> = rows.iter().map(|r| r.try_get("id").unwrap()).collect();
    assert_eq!(ids, vec!["c1".to_string(), "c2".to_string()]);
}

#[tokio::test]
async fn row_to_json_preserves_null_and_numeric_types() {
    let db = seeded_performers().await;
    let row = get_by_id(db.pool(), EntityKind::Performer, "p1", "").await.unwrap().unwrap();
    let json = row_to_json(&row);
    assert_eq!(json.get("name").and_then(|v| v.as_str()), Some("Alice"));
    assert_eq!(json.get("scene_count").and_then(|v| v.as_i64()), Some(0));
    assert!(json.get("image_path").unwrap().is_null());
}

#[tokio::test]
async fn default_sort_direction_is_ascending() {
    let db = seeded_performers().await;
    let opts = QueryOptions::default();
    assert_eq!(opts.sort_direction, SortDirection::Asc);
    let page = list(db.pool(), EntityKind::Performer, &opts).await.unwrap();
    let first: String = page.items[0].try_get("name").unwrap();
    assert_eq!(first, "Alice");
}
