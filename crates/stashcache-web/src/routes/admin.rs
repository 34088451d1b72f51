//! Clear-instance-data and re-probe handlers (§6).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use stashcache_prober::{probe_and_record, PendingClip, DEFAULT_CONCURRENCY};

use crate::error::AppResult;
use crate::state::SharedState;

pub async fn clear_instance_data(State(state): State<SharedState>, Path(instance): Path<String>) -> AppResult<StatusCode> {
    state.sync.clear_instance_data(&instance).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ReprobeQuery {
    instance: Option<String>,
    limit: Option<i64>,
}

/// Re-probes clips C8 hasn't classified yet (§6), scoped to `instance` if
/// given and capped at `limit` (default 200) so one request can't enqueue
/// an unbounded HTTP fan-out.
pub async fn reprobe_pending_clips(State(state): State<SharedState>, Query(query): Query<ReprobeQuery>) -> AppResult<StatusCode> {
    let limit = query.limit.unwrap_or(200).clamp(1, 2000);
    let pending = stashcache_db::clips_pending_probe(state.db.pool(), query.instance.as_deref(), limit).await?;
    let clips: Vec<PendingClip> = pending
        .into_iter()
        .map(|row| PendingClip { id: row.id, instance: row.instance, preview_url: row.preview_path })
        .collect();
    probe_and_record(state.db.pool(), &state.http, &clips, DEFAULT_CONCURRENCY).await;
    Ok(StatusCode::ACCEPTED)
}
