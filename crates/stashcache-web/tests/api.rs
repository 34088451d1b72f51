use std::collections::HashMap;
use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{json, Value};
use stashcache_db::{Database, SceneUpsert};
use stashcache_exclusion::ExclusionEngine;
use stashcache_sync::SyncService;
use stashcache_web::state::{AppState, InstanceRegistry};
use stashcache_web::{Opts, Server};

async fn spawn_server() -> (String, Arc<AppState>) {
    let db = Database::open_in_memory().await.unwrap();
    let mut tx = db.begin().await.unwrap();
    stashcache_db::upsert_scenes(
        &mut tx,
        &[SceneUpsert {
            id: "s1".into(),
            instance: "".into(),
            title: Some("Opening Night".into()),
            preview_path: Some("http://stash.local/scene/s1/preview.webp".into()),
            updated_at: "2024-01-01T00:00:00Z".into(),
            ..Default::default()
        }],
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let exclusion = ExclusionEngine::new(db.clone());
    let (sync, _rx) = SyncService::new(db.clone(), exclusion.clone());
    let state = Arc::new(AppState {
        db,
        sync: Arc::new(sync),
        exclusion,
        http: reqwest::Client::new(),
        instances: InstanceRegistry::new(HashMap::new()),
    });

    let opts = Opts::new("127.0.0.1:0".into(), None, false);
    let server = Server::init(opts, state.clone()).await.unwrap();
    let addr = server.addr().unwrap();
    tokio::spawn(server.run());
    (format!("http://{addr}"), state)
}

#[test_log::test(tokio::test)]
async fn search_lists_seeded_scene_and_rewrites_preview_url() {
    let (base, _state) = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client.post(format!("{base}/api/scenes/search")).json(&json!({})).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["total"], 1);
    let item = &body["items"][0];
    assert_eq!(item["title"], "Opening Night");
    assert!(item["preview_path"].as_str().unwrap().starts_with("/api/proxy/stash?path="));
}

#[test_log::test(tokio::test)]
async fn get_by_id_returns_404_for_missing_scene() {
    let (base, _state) = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/api/scenes//missing")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("not found"));
}

#[test_log::test(tokio::test)]
async fn unknown_kind_in_path_is_bad_request() {
    let (base, _state) = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client.post(format!("{base}/api/not-a-kind/search")).json(&json!({})).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[test_log::test(tokio::test)]
async fn hide_then_unhide_entity_round_trips() {
    let (base, _state) = spawn_server().await;
    let client = reqwest::Client::new();

    let hide = client.post(format!("{base}/api/users/u1/hidden/scenes//s1")).send().await.unwrap();
    assert_eq!(hide.status(), StatusCode::NO_CONTENT);

    let unhide = client.delete(format!("{base}/api/users/u1/hidden/scenes//s1")).send().await.unwrap();
    assert_eq!(unhide.status(), StatusCode::NO_CONTENT);
}

#[test_log::test(tokio::test)]
async fn sync_status_reports_idle_with_no_runs() {
    let (base, _state) = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/api/sync/status")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["is_syncing"], false);
    assert_eq!(body["kinds"], json!([]));
}

#[test_log::test(tokio::test)]
async fn trigger_sync_for_unknown_instance_is_not_found() {
    let (base, _state) = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client.post(format!("{base}/api/sync/ghost-instance/trigger")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
