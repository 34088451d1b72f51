//! Cleanup-deleted pass (§4.3): diffs the mirror's live id set for a kind
//! against the upstream's current id list and soft-deletes what's gone,
//! running scene merge detection first.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use stashcache_core::EntityKind;
use stashcache_db::Database;
use stashcache_upstream::UpstreamClient;

use crate::error::SyncResult;
use crate::progress::CancelToken;
use crate::LOG_TARGET;

const ID_SCAN_PAGE_SIZE: u32 = 5000;
const DELETE_BATCH_SIZE: usize = 500;

#[derive(Debug, Default)]
pub struct CleanupOutcome {
    pub deleted: u64,
    pub merged: u64,
}

pub async fn cleanup_deleted(
    db: &Database,
    upstream: &Arc<dyn UpstreamClient>,
    instance: &str,
    kind: EntityKind,
    cancel: &CancelToken,
) -> SyncResult<CleanupOutcome> {
    let mut upstream_ids = HashSet::new();
    let mut page = 1;
    loop {
        cancel.check()?;
        let result = upstream.find_ids(kind, page, ID_SCAN_PAGE_SIZE).await?;
        let got = result.items.len();
        upstream_ids.extend(result.items);
        if got < ID_SCAN_PAGE_SIZE as usize {
            break;
        }
        page += 1;
    }

    let local_ids = stashcache_db::live_ids_for_instance(db.pool(), kind, instance).await?;
    let gone: Vec<String> = local_ids.into_iter().filter(|id| !upstream_ids.contains(id)).collect();

    if gone.is_empty() {
        return Ok(CleanupOutcome::default());
    }

    let mut outcome = CleanupOutcome::default();
    let deleted_at = Utc::now().to_rfc3339();

    if kind == EntityKind::Scene {
        for id in &gone {
            cancel.check()?;
            if let Some(phash) = stashcache_db::scene_phash(db.pool(), id, instance).await? {
                if let Some(survivor) = stashcache_db::find_scene_by_phash(db.pool(), &phash, instance, id).await? {
                    stashcache_db::reassign_scene_overlay(db.pool(), instance, id, &survivor).await?;
                    outcome.merged += 1;
                    tracing::debug!(target: LOG_TARGET, instance, old_id = %id, new_id = %survivor, "scene merge detected");
                }
            }
        }
    }

    for batch in gone.chunks(DELETE_BATCH_SIZE) {
        cancel.check()?;
        stashcache_db::soft_delete_batch(db.pool(), kind, instance, batch, &deleted_at).await?;
        outcome.deleted += batch.len() as u64;
    }

    tracing::debug!(target: LOG_TARGET, instance, %kind, deleted = outcome.deleted, merged = outcome.merged, "cleanup pass complete");
    Ok(outcome)
}
