use stashcache_core::{EntityKind, RestrictionMode};
use stashcache_db::{
    add_hidden, add_restriction, get_user_entity_stats, upsert_performers, upsert_scenes, upsert_studios, upsert_tags,
    Database, PerformerUpsert, SceneUpsert, StudioUpsert, TagUpsert,
};

use crate::ExclusionEngine;

async fn memory_engine() -> (Database, ExclusionEngine) {
    let db = Database::open_in_memory().await.expect("open in-memory db");
    let engine = ExclusionEngine::new(db.clone());
    (db, engine)
}

fn scene(id: &str, studio_id: Option<&str>) -> SceneUpsert {
    SceneUpsert {
        id: id.to_string(),
        instance: "".into(),
        updated_at: "2024-01-01T00:00:00Z".into(),
        studio_id: studio_id.map(str::to_string),
        studio_instance: studio_id.map(|_| "".to_string()),
        play_count: 0,
        ..Default::default()
    }
}

#[tokio::test]
async fn hiding_a_studio_cascades_to_its_scenes() {
    let (db, engine) = memory_engine().await;
    let mut tx = db.begin().await.unwrap();
    upsert_studios(
        &mut tx,
        &[StudioUpsert {
            id: "st1".into(),
            instance: "".into(),
            updated_at: "2024-01-01T00:00:00Z".into(),
            ..Default::default()
        }],
    )
    .await
    .unwrap();
    upsert_scenes(&mut tx, &[scene("s1", Some("st1")), scene("s2", None)])
        .await
        .unwrap();
    tx.commit().await.unwrap();

    add_hidden(db.pool(), "u1", "studio", "st1", "", "2024-01-01T00:00:00Z")
        .await
        .unwrap();
    engine.recompute_user("u1").await.unwrap();

    let stats = get_user_entity_stats(db.pool(), "u1").await.unwrap();
    let scene_stat = stats.iter().find(|(kind, _, _)| kind == "scene").unwrap();
    assert_eq!(scene_stat.2, 1);
}

#[tokio::test]
async fn hiding_a_tag_cascades_through_performers_to_scenes() {
    let (db, engine) = memory_engine().await;
    let mut tx = db.begin().await.unwrap();
    upsert_tags(
        &mut tx,
        &[TagUpsert {
            id: "t1".into(),
            instance: "".into(),
            name: "x".into(),
            updated_at: "2024-01-01T00:00:00Z".into(),
            ..Default::default()
        }],
    )
    .await
    .unwrap();
    upsert_performers(
        &mut tx,
        &[PerformerUpsert {
            id: "p1".into(),
            instance: "".into(),
            updated_at: "2024-01-01T00:00:00Z".into(),
            ..Default::default()
        }],
    )
    .await
    .unwrap();
    upsert_scenes(&mut tx, &[scene("s1", None)]).await.unwrap();
    stashcache_db::replace_performer_tags(
        &mut tx,
        "p1",
        "",
        &[stashcache_db::JunctionChild::new("t1", "")],
    )
    .await
    .unwrap();
    stashcache_db::replace_scene_performers(
        &mut tx,
        "s1",
        "",
        &[stashcache_db::JunctionChild::new("p1", "")],
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    add_hidden(db.pool(), "u1", "tag", "t1", "", "2024-01-01T00:00:00Z")
        .await
        .unwrap();
    engine.recompute_user("u1").await.unwrap();

    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT entity_type, reason FROM user_excluded_entity WHERE user_id = 'u1' ORDER BY entity_type",
    )
    .fetch_all(db.pool())
    .await
    .unwrap();
    assert!(rows.contains(&("performer".to_string(), "cascade".to_string())));
    assert!(rows.contains(&("scene".to_string(), "cascade".to_string())));
    assert!(rows.contains(&("tag".to_string(), "hidden".to_string())));
}

#[tokio::test]
async fn include_restriction_excludes_everything_outside_the_allow_list() {
    let (db, engine) = memory_engine().await;
    let mut tx = db.begin().await.unwrap();
    upsert_studios(
        &mut tx,
        &[
            StudioUpsert {
                id: "st1".into(),
                instance: "".into(),
                updated_at: "2024-01-01T00:00:00Z".into(),
                ..Default::default()
            },
            StudioUpsert {
                id: "st2".into(),
                instance: "".into(),
                updated_at: "2024-01-01T00:00:00Z".into(),
                ..Default::default()
            },
        ],
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    add_restriction(db.pool(), "u1", "studios", RestrictionMode::Include, &["st1".to_string()], false)
        .await
        .unwrap();
    engine.recompute_user("u1").await.unwrap();

    let stats = get_user_entity_stats(db.pool(), "u1").await.unwrap();
    let studio_stat = stats.iter().find(|(kind, _, _)| kind == "studio").unwrap();
    assert_eq!(studio_stat.2, 1);
}

#[tokio::test]
async fn add_hidden_entity_persists_and_recomputes_without_a_separate_call() {
    let (db, engine) = memory_engine().await;
    let mut tx = db.begin().await.unwrap();
    upsert_scenes(&mut tx, &[scene("s1", None)]).await.unwrap();
    tx.commit().await.unwrap();

    engine
        .add_hidden_entity("u1", EntityKind::Scene, "s1", "")
        .await
        .unwrap();

    let stats = get_user_entity_stats(db.pool(), "u1").await.unwrap();
    let scene_stat = stats.iter().find(|(kind, _, _)| kind == "scene").unwrap();
    assert_eq!(scene_stat.2, 0);
}

#[tokio::test]
async fn concurrent_recomputes_for_the_same_user_coalesce() {
    let (db, engine) = memory_engine().await;
    let mut tx = db.begin().await.unwrap();
    upsert_scenes(&mut tx, &[scene("s1", None)]).await.unwrap();
    tx.commit().await.unwrap();
    add_hidden(db.pool(), "u1", "scene", "s1", "", "2024-01-01T00:00:00Z")
        .await
        .unwrap();

    let a = engine.recompute_user("u1");
    let b = engine.recompute_user("u1");
    let (a, b) = tokio::join!(a, b);
    a.unwrap();
    b.unwrap();

    let stats = get_user_entity_stats(db.pool(), "u1").await.unwrap();
    let scene_stat = stats.iter().find(|(kind, _, _)| kind == "scene").unwrap();
    assert_eq!(scene_stat.2, 0);
}
