//! Post-sync derivation pass (C4, §4.3 steps 1-4), run once per instance
//! after every kind synced in a run has landed. Steps 5 and 6 (user
//! stats, exclusion recompute) are C5's job; see [`crate::service`].

use stashcache_db::Database;

use crate::error::SyncResult;
use crate::LOG_TARGET;

pub async fn run_derivations(db: &Database, instance: &str) -> SyncResult<()> {
    let mut tx = db.begin().await?;
    stashcache_db::derive_scene_inherited_tags(&mut tx, instance).await?;
    stashcache_db::derive_gallery_image_inheritance(&mut tx, instance).await?;
    stashcache_db::derive_inherited_image_counts(&mut tx, instance).await?;
    stashcache_db::derive_tag_scene_count_via_performer(&mut tx, instance).await?;
    tx.commit().await?;
    tracing::debug!(target: LOG_TARGET, instance, "post-sync derivations complete");
    Ok(())
}
