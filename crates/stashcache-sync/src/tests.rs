use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use stashcache_core::EntityKind;
use stashcache_db::Database;
use stashcache_upstream::model::{Filter, Page, UpstreamItem, UpstreamScene};
use stashcache_upstream::{UpstreamClient, UpstreamResult};

use crate::batch::process_batch;
use crate::cleanup::cleanup_deleted;
use crate::derive::run_derivations;
use crate::progress::CancelToken;

/// An in-memory stand-in for an upstream, keyed by kind, returning
/// whatever items were seeded for it.
#[derive(Default)]
struct FakeUpstream {
    items: Mutex<HashMap<EntityKind, Vec<UpstreamItem>>>,
}

impl FakeUpstream {
    fn seed(kind: EntityKind, items: Vec<UpstreamItem>) -> Arc<Self> {
        let fake = Self::default();
        fake.items.lock().unwrap().insert(kind, items);
        Arc::new(fake)
    }
}

#[async_trait]
impl UpstreamClient for FakeUpstream {
    async fn find(&self, kind: EntityKind, _filter: &Filter, page: u32, per_page: u32) -> UpstreamResult<Page<UpstreamItem>> {
        let all = self.items.lock().unwrap().get(&kind).cloned().unwrap_or_default();
        let start = ((page - 1) * per_page) as usize;
        let items = all.get(start..).unwrap_or_default().iter().take(per_page as usize).cloned().collect();
        Ok(Page {
            items,
            total_count: all.len() as u64,
        })
    }

    async fn find_ids(&self, kind: EntityKind, page: u32, per_page: u32) -> UpstreamResult<Page<String>> {
        let all = self.items.lock().unwrap().get(&kind).cloned().unwrap_or_default();
        let ids: Vec<String> = all.iter().map(|i| i.id().to_string()).collect();
        let start = ((page - 1) * per_page) as usize;
        let items = ids.get(start..).unwrap_or_default().iter().take(per_page as usize).cloned().collect();
        Ok(Page {
            items,
            total_count: ids.len() as u64,
        })
    }

    async fn find_one(&self, kind: EntityKind, id: &str) -> UpstreamResult<Option<UpstreamItem>> {
        let all = self.items.lock().unwrap().get(&kind).cloned().unwrap_or_default();
        Ok(all.into_iter().find(|i| i.id() == id))
    }

    async fn count(&self, kind: EntityKind, _filter: &Filter) -> UpstreamResult<u64> {
        Ok(self.items.lock().unwrap().get(&kind).map(|v| v.len()).unwrap_or(0) as u64)
    }
}

fn scene(id: &str, updated_at: &str) -> UpstreamItem {
    UpstreamItem::Scene(UpstreamScene {
        id: id.to_string(),
        updated_at: updated_at.to_string(),
        ..Default::default()
    })
}

#[tokio::test]
async fn batch_processor_upserts_and_advances_cursor() {
    let db = Database::open_in_memory().await.unwrap();
    let items = vec![scene("s1", "2024-01-01T00:00:00Z"), scene("s2", "2024-01-02T00:00:00Z")];
    let outcome = process_batch(&db, "inst1", EntityKind::Scene, items).await.unwrap();

    assert_eq!(outcome.processed, 2);
    assert_eq!(outcome.max_cursor.unwrap().0, "2024-01-02T00:00:00Z");

    let rows: Vec<(String,)> = sqlx::query_as("SELECT id FROM scenes WHERE instance = 'inst1' ORDER BY id")
        .fetch_all(db.pool())
        .await
        .unwrap();
    assert_eq!(rows, vec![("s1".to_string(),), ("s2".to_string(),)]);
}

#[tokio::test]
async fn batch_processor_drops_items_with_unsafe_ids() {
    let db = Database::open_in_memory().await.unwrap();
    let items = vec![scene("ok-1", "2024-01-01T00:00:00Z"), scene("bad id; drop table", "2024-01-01T00:00:00Z")];
    let outcome = process_batch(&db, "inst1", EntityKind::Scene, items).await.unwrap();
    assert_eq!(outcome.processed, 1);
}

#[tokio::test]
async fn cleanup_soft_deletes_ids_absent_upstream() {
    let db = Database::open_in_memory().await.unwrap();
    process_batch(&db, "inst1", EntityKind::Scene, vec![scene("gone", "2024-01-01T00:00:00Z")])
        .await
        .unwrap();

    let upstream: Arc<dyn UpstreamClient> = FakeUpstream::seed(EntityKind::Scene, vec![]);
    let outcome = cleanup_deleted(&db, &upstream, "inst1", EntityKind::Scene, &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.deleted, 1);

    let row: (Option<String>,) = sqlx::query_as("SELECT deleted_at FROM scenes WHERE id = 'gone'")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert!(row.0.is_some());
}

#[tokio::test]
async fn cleanup_reassigns_overlay_on_phash_merge() {
    let db = Database::open_in_memory().await.unwrap();
    let mut old = scene("old", "2024-01-01T00:00:00Z");
    if let UpstreamItem::Scene(s) = &mut old {
        s.phash = Some("abc".into());
    }
    let mut new = scene("new", "2024-01-02T00:00:00Z");
    if let UpstreamItem::Scene(s) = &mut new {
        s.phash = Some("abc".into());
    }
    process_batch(&db, "inst1", EntityKind::Scene, vec![old, new]).await.unwrap();

    sqlx::query(
        "INSERT INTO user_entity_overlay (user_id, entity_type, entity_id, instance, rating, favorite) \
         VALUES ('u1', 'scene', 'old', 'inst1', 5, 1)",
    )
    .execute(db.pool())
    .await
    .unwrap();

    let upstream: Arc<dyn UpstreamClient> =
        FakeUpstream::seed(EntityKind::Scene, vec![scene("new", "2024-01-02T00:00:00Z")]);
    let outcome = cleanup_deleted(&db, &upstream, "inst1", EntityKind::Scene, &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.merged, 1);
    assert_eq!(outcome.deleted, 1);

    let row: (String,) =
        sqlx::query_as("SELECT entity_id FROM user_entity_overlay WHERE user_id = 'u1'")
            .fetch_one(db.pool())
            .await
            .unwrap();
    assert_eq!(row.0, "new");
}

#[tokio::test]
async fn derivations_roll_up_scene_inherited_tags() {
    let db = Database::open_in_memory().await.unwrap();
    let mut tx = db.begin().await.unwrap();
    stashcache_db::upsert_tags(
        &mut tx,
        &[stashcache_db::TagUpsert {
            id: "t1".into(),
            instance: "inst1".into(),
            name: "x".into(),
            updated_at: "2024-01-01T00:00:00Z".into(),
            ..Default::default()
        }],
    )
    .await
    .unwrap();
    stashcache_db::upsert_performers(
        &mut tx,
        &[stashcache_db::PerformerUpsert {
            id: "p1".into(),
            instance: "inst1".into(),
            updated_at: "2024-01-01T00:00:00Z".into(),
            ..Default::default()
        }],
    )
    .await
    .unwrap();
    stashcache_db::upsert_scenes(
        &mut tx,
        &[stashcache_db::SceneUpsert {
            id: "s1".into(),
            instance: "inst1".into(),
            updated_at: "2024-01-01T00:00:00Z".into(),
            ..Default::default()
        }],
    )
    .await
    .unwrap();
    stashcache_db::replace_performer_tags(&mut tx, "p1", "inst1", &[stashcache_db::JunctionChild::new("t1", "inst1")])
        .await
        .unwrap();
    stashcache_db::replace_scene_performers(&mut tx, "s1", "inst1", &[stashcache_db::JunctionChild::new("p1", "inst1")])
        .await
        .unwrap();
    tx.commit().await.unwrap();

    run_derivations(&db, "inst1").await.unwrap();

    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT tag_id FROM scene_inherited_tags WHERE scene_id = 's1' AND scene_instance = 'inst1'")
            .fetch_all(db.pool())
            .await
            .unwrap();
    assert_eq!(rows, vec![("t1".to_string(),)]);
}
