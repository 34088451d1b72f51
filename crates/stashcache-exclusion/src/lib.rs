//! The exclusion engine (C5, §4.4): turns hidden entities and content
//! restrictions into the persisted `UserExcludedEntity` index a query ever
//! reads from, via a cascade/dedup pass over the mirror graph.

mod compute;
mod error;
#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use stashcache_core::EntityKind;
use stashcache_db::Database;
use tokio::sync::{Mutex, OnceCell};

pub use error::{ExclusionError, ExclusionResult};

pub const LOG_TARGET: &str = "stashcache::exclusion";

/// Coalesces concurrent recomputes for the same user onto one pass, the
/// same shape as the upstream connection cache: a map of per-key
/// single-shot cells that later callers await instead of duplicating work.
type Inflight = Arc<Mutex<HashMap<String, Arc<OnceCell<Arc<Result<(), stashcache_db::DbError>>>>>>>;

#[derive(Clone)]
pub struct ExclusionEngine {
    db: Database,
    inflight: Inflight,
}

impl ExclusionEngine {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Recomputes and persists the exclusion set for one user. Concurrent
    /// calls for the same `user_id` coalesce onto a single pass.
    pub async fn recompute_user(&self, user_id: &str) -> ExclusionResult<()> {
        let cell = {
            let mut inflight = self.inflight.lock().await;
            inflight
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let outcome = cell
            .get_or_init(|| async move { Arc::new(self.recompute_user_inner(user_id).await) })
            .await
            .clone();

        self.inflight.lock().await.remove(user_id);

        match &*outcome {
            Ok(()) => Ok(()),
            Err(source) => Err(ExclusionError::Db { source: clone_db_error(source) }),
        }
    }

    async fn recompute_user_inner(&self, user_id: &str) -> Result<(), stashcache_db::DbError> {
        let pool = self.db.pool();
        let rows = compute::compute_user_exclusions(pool, user_id).await?;
        let count = rows.len();
        stashcache_db::commit_exclusions(pool, user_id, &rows).await?;
        tracing::debug!(target: LOG_TARGET, user_id, count, "recomputed user exclusions");
        Ok(())
    }

    /// Recomputes every user's exclusion set. Never aborts on a single
    /// user's failure (§4.4); returns the count that succeeded and the
    /// errors for those that didn't.
    pub async fn recompute_all_users(&self) -> ExclusionResult<RecomputeAllSummary> {
        let user_ids = stashcache_db::list_known_users(self.db.pool()).await?;
        let mut summary = RecomputeAllSummary::default();
        for user_id in user_ids {
            match self.recompute_user(&user_id).await {
                Ok(()) => summary.succeeded += 1,
                Err(err) => {
                    tracing::warn!(target: LOG_TARGET, user_id, error = %err, "recompute failed for user");
                    summary.failed.push((user_id, err.to_string()));
                }
            }
        }
        Ok(summary)
    }

    /// Hides one entity for `user_id` and folds it (plus its cascade edges)
    /// into the persisted set in a single incremental pass, rather than a
    /// full recompute (§4.4 "incremental addHiddenEntity"): the cascade
    /// walk is seeded from just this entity, and the hidden row plus the
    /// resulting cascade rows are upserted in one write transaction.
    pub async fn add_hidden_entity(
        &self,
        user_id: &str,
        kind: EntityKind,
        entity_id: &str,
        instance: &str,
    ) -> ExclusionResult<()> {
        let exclusions = compute::compute_single_entity_cascade(self.db.pool(), kind, entity_id, instance).await?;
        stashcache_db::add_hidden_with_exclusions(
            self.db.pool(),
            user_id,
            kind.singular(),
            entity_id,
            instance,
            &Utc::now().to_rfc3339(),
            &exclusions,
        )
        .await?;
        Ok(())
    }

    /// Unhides one entity. Per design decision (re-hiding and cascades from
    /// *other* still-hidden entities may still cover it), this is
    /// fire-and-forget: it clears the direct row and enqueues a full
    /// recompute without waiting on it.
    pub async fn remove_hidden_entity(
        &self,
        user_id: &str,
        kind: EntityKind,
        entity_id: &str,
        instance: &str,
    ) -> ExclusionResult<()> {
        stashcache_db::remove_hidden(self.db.pool(), user_id, kind.singular(), entity_id, instance).await?;
        let engine = self.clone();
        let user_id = user_id.to_string();
        tokio::spawn(async move {
            if let Err(err) = engine.recompute_user(&user_id).await {
                tracing::warn!(target: LOG_TARGET, user_id, error = %err, "post-unhide recompute failed");
            }
        });
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecomputeAllSummary {
    pub succeeded: u64,
    pub failed: Vec<(String, String)>,
}

/// `sqlx::Error` isn't `Clone`, so a cached failure can't be handed back to
/// every coalesced caller verbatim; each gets an equivalent query error
/// carrying the same message.
fn clone_db_error(source: &stashcache_db::DbError) -> stashcache_db::DbError {
    stashcache_db::DbError::from(sqlx::Error::Protocol(source.to_string()))
}
