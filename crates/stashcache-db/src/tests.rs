use stashcache_core::{EntityKind, ExclusionReason, RestrictionMode};

use crate::{
    clips_pending_probe, commit_exclusions, get_overlay, get_sync_state, junctions::JunctionChild,
    list_hidden, list_restrictions, record_run_started, record_run_succeeded, replace_scene_tags,
    set_clip_generated, set_favorite, set_rating, upsert_clips, upsert_scenes, upsert_tags,
    ClipUpsert, ExcludedEntity, SceneUpsert, TagUpsert,
};
use crate::Database;

async fn memory_db() -> Database {
    Database::open_in_memory().await.expect("open in-memory db")
}

fn scene(id: &str, instance: &str, updated_at: &str) -> SceneUpsert {
    SceneUpsert {
        id: id.to_string(),
        instance: instance.to_string(),
        updated_at: updated_at.to_string(),
        play_count: 0,
        ..Default::default()
    }
}

#[tokio::test]
async fn upsert_scene_then_update_clears_nothing_unexpected() {
    let db = memory_db().await;
    let mut tx = db.begin().await.unwrap();
    upsert_scenes(&mut tx, &[scene("s1", "", "2024-01-01T00:00:00Z")])
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let row: (String,) = sqlx::query_as("SELECT title FROM scenes WHERE id = 's1'")
        .fetch_one(db.pool())
        .await
        .unwrap_or(("unset".to_string(),));
    assert_eq!(row.0, "unset");

    let mut tx = db.begin().await.unwrap();
    let mut updated = scene("s1", "", "2024-02-01T00:00:00Z");
    updated.title = Some("Retitled".to_string());
    upsert_scenes(&mut tx, &[updated]).await.unwrap();
    tx.commit().await.unwrap();

    let row: (Option<String>, String) =
        sqlx::query_as("SELECT title, updated_at FROM scenes WHERE id = 's1'")
            .fetch_one(db.pool())
            .await
            .unwrap();
    assert_eq!(row.0.as_deref(), Some("Retitled"));
    assert_eq!(row.1, "2024-02-01T00:00:00Z");
}

#[tokio::test]
async fn upsert_clears_soft_delete_on_reupsert() {
    let db = memory_db().await;
    let mut tx = db.begin().await.unwrap();
    upsert_scenes(&mut tx, &[scene("s1", "", "2024-01-01T00:00:00Z")])
        .await
        .unwrap();
    tx.commit().await.unwrap();

    sqlx::query("UPDATE scenes SET deleted_at = '2024-01-02T00:00:00Z' WHERE id = 's1'")
        .execute(db.pool())
        .await
        .unwrap();

    let mut tx = db.begin().await.unwrap();
    upsert_scenes(&mut tx, &[scene("s1", "", "2024-03-01T00:00:00Z")])
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let row: (Option<String>,) = sqlx::query_as("SELECT deleted_at FROM scenes WHERE id = 's1'")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(row.0, None);
}

#[tokio::test]
async fn replace_junction_clears_stale_children() {
    let db = memory_db().await;
    let mut tx = db.begin().await.unwrap();
    upsert_scenes(&mut tx, &[scene("s1", "", "2024-01-01T00:00:00Z")])
        .await
        .unwrap();
    upsert_tags(
        &mut tx,
        &[
            TagUpsert {
                id: "t1".into(),
                instance: "".into(),
                name: "a".into(),
                updated_at: "2024-01-01T00:00:00Z".into(),
                ..Default::default()
            },
            TagUpsert {
                id: "t2".into(),
                instance: "".into(),
                name: "b".into(),
                updated_at: "2024-01-01T00:00:00Z".into(),
                ..Default::default()
            },
        ],
    )
    .await
    .unwrap();
    replace_scene_tags(
        &mut tx,
        "s1",
        "",
        &[JunctionChild::new("t1", ""), JunctionChild::new("t2", "")],
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM scene_tags WHERE scene_id = 's1'")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count.0, 2);

    let mut tx = db.begin().await.unwrap();
    replace_scene_tags(&mut tx, "s1", "", &[JunctionChild::new("t1", "")])
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM scene_tags WHERE scene_id = 's1'")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count.0, 1);
}

#[tokio::test]
async fn sync_state_round_trip() {
    let db = memory_db().await;
    record_run_started(db.pool(), "inst-a", EntityKind::Scene, "2024-01-01T00:00:00Z")
        .await
        .unwrap();
    record_run_succeeded(
        db.pool(),
        "inst-a",
        EntityKind::Scene,
        Some("2024-01-01T00:00:00.999"),
        None,
        1500,
        42,
    )
    .await
    .unwrap();

    let state = get_sync_state(db.pool(), "inst-a", EntityKind::Scene)
        .await
        .unwrap()
        .expect("state row present");
    assert_eq!(state.last_full_cursor.as_deref(), Some("2024-01-01T00:00:00.999"));
    assert_eq!(state.last_run_count, Some(42));
    assert_eq!(state.last_error, None);
}

#[tokio::test]
async fn overlay_rating_and_favorite_are_independent() {
    let db = memory_db().await;
    set_rating(db.pool(), "u1", "scene", "s1", "", Some(4)).await.unwrap();
    set_favorite(db.pool(), "u1", "scene", "s1", "", true).await.unwrap();

    let overlay = get_overlay(db.pool(), "u1", "scene", "s1", "")
        .await
        .unwrap()
        .expect("overlay row present");
    assert_eq!(overlay.rating, Some(4));
    assert!(overlay.favorite);

    set_rating(db.pool(), "u1", "scene", "s1", "", None).await.unwrap();
    let overlay = get_overlay(db.pool(), "u1", "scene", "s1", "").await.unwrap().unwrap();
    assert_eq!(overlay.rating, None);
    assert!(overlay.favorite);
}

#[tokio::test]
async fn commit_exclusions_replaces_prior_set_and_refreshes_stats() {
    let db = memory_db().await;
    let mut tx = db.begin().await.unwrap();
    upsert_scenes(
        &mut tx,
        &[
            scene("s1", "", "2024-01-01T00:00:00Z"),
            scene("s2", "", "2024-01-01T00:00:00Z"),
        ],
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    commit_exclusions(
        db.pool(),
        "u1",
        &[ExcludedEntity {
            entity_type: "scene".into(),
            entity_id: "s1".into(),
            instance: "".into(),
            reason: ExclusionReason::Hidden,
        }],
    )
    .await
    .unwrap();

    let stats = crate::get_user_entity_stats(db.pool(), "u1").await.unwrap();
    let scene_stat = stats.iter().find(|(kind, _, _)| kind == "scene").unwrap();
    assert_eq!(scene_stat.2, 1);

    commit_exclusions(db.pool(), "u1", &[]).await.unwrap();
    let stats = crate::get_user_entity_stats(db.pool(), "u1").await.unwrap();
    let scene_stat = stats.iter().find(|(kind, _, _)| kind == "scene").unwrap();
    assert_eq!(scene_stat.2, 2);
}

#[tokio::test]
async fn hidden_entity_and_restriction_crud() {
    let db = memory_db().await;
    crate::add_hidden(db.pool(), "u1", "scene", "s1", "", "2024-01-01T00:00:00Z")
        .await
        .unwrap();
    let hidden = list_hidden(db.pool(), "u1").await.unwrap();
    assert_eq!(hidden.len(), 1);
    assert_eq!(hidden[0].entity_id, "s1");

    crate::remove_hidden(db.pool(), "u1", "scene", "s1", "").await.unwrap();
    assert!(list_hidden(db.pool(), "u1").await.unwrap().is_empty());

    let id = crate::add_restriction(
        db.pool(),
        "u1",
        "studios",
        RestrictionMode::Include,
        &["S1".to_string()],
        true,
    )
    .await
    .unwrap();
    let restrictions = list_restrictions(db.pool(), "u1").await.unwrap();
    assert_eq!(restrictions.len(), 1);
    assert_eq!(restrictions[0].mode, RestrictionMode::Include);
    assert_eq!(restrictions[0].entity_ids, vec!["S1".to_string()]);

    crate::delete_restriction(db.pool(), id).await.unwrap();
    assert!(list_restrictions(db.pool(), "u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn clips_pending_probe_skips_classified_and_urlless_clips() {
    let db = memory_db().await;
    let mut tx = db.begin().await.unwrap();
    upsert_scenes(&mut tx, &[scene("s1", "", "2024-01-01T00:00:00Z")]).await.unwrap();
    upsert_clips(
        &mut tx,
        &[
            ClipUpsert { id: "c1".into(), instance: "".into(), scene_id: "s1".into(), scene_instance: "".into(), preview_path: Some("/c1.mp4".into()), updated_at: "2024-01-01T00:00:00Z".into(), ..Default::default() },
            ClipUpsert { id: "c2".into(), instance: "".into(), scene_id: "s1".into(), scene_instance: "".into(), preview_path: Some("/c2.mp4".into()), updated_at: "2024-01-01T00:00:00Z".into(), ..Default::default() },
            ClipUpsert { id: "c3".into(), instance: "".into(), scene_id: "s1".into(), scene_instance: "".into(), preview_path: None, updated_at: "2024-01-01T00:00:00Z".into(), ..Default::default() },
        ],
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    set_clip_generated(db.pool(), "c2", "", true).await.unwrap();

    let pending = clips_pending_probe(db.pool(), Some(""), 10).await.unwrap();
    let ids: Vec<String> = pending.into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["c1".to_string()]);
}
