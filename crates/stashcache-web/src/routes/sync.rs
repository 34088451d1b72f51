//! Sync status/trigger/abort/events handlers (§6).

use std::convert::Infallible;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::{Stream, StreamExt as _};
use serde::Deserialize;
use serde_json::{json, Value};
use stashcache_sync::{SyncEvent, SyncMode};
use tokio_stream::wrappers::BroadcastStream;

use crate::error::{AppResult, UnknownInstanceSnafu};
use crate::state::SharedState;

pub async fn sync_status(State(state): State<SharedState>) -> AppResult<Json<Value>> {
    let kinds = stashcache_db::list_sync_state(state.db.pool()).await?;
    let kinds: Vec<Value> = kinds
        .into_iter()
        .map(|s| {
            json!({
                "instance": s.instance,
                "entity_type": s.entity_type,
                "last_full_cursor": s.last_full_cursor,
                "last_incremental_cursor": s.last_incremental_cursor,
                "last_run_started_at": s.last_run_started_at,
                "last_run_duration_ms": s.last_run_duration_ms,
                "last_run_count": s.last_run_count,
                "last_error": s.last_error,
            })
        })
        .collect();
    Ok(Json(json!({ "is_syncing": state.sync.is_syncing(), "kinds": kinds })))
}

#[derive(Debug, Deserialize)]
pub struct TriggerQuery {
    mode: Option<String>,
}

pub async fn trigger_sync(
    State(state): State<SharedState>,
    Path(instance): Path<String>,
    Query(query): Query<TriggerQuery>,
) -> AppResult<StatusCode> {
    let upstream = state.instances.get(&instance).ok_or_else(|| UnknownInstanceSnafu { instance: instance.clone() }.build())?;
    let mode = match query.mode.as_deref() {
        Some("full") => SyncMode::Full,
        _ => SyncMode::SmartIncremental,
    };

    let sync = state.sync.clone();
    tokio::spawn(async move {
        if let Err(err) = sync.run(&instance, upstream, mode).await {
            tracing::warn!(error = %err, instance, "triggered sync run failed");
        }
    });
    Ok(StatusCode::ACCEPTED)
}

pub async fn abort_sync(State(state): State<SharedState>) -> StatusCode {
    state.sync.abort();
    StatusCode::NO_CONTENT
}

/// Streams sync progress as server-sent events. A lagged receiver (the
/// client fell behind the broadcast buffer) ends the stream rather than
/// silently skipping ahead -- the client is expected to reconnect and
/// re-fetch `/api/sync/status` for the current snapshot.
pub async fn sync_events(State(state): State<SharedState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.sync.subscribe();
    let stream = BroadcastStream::new(rx).take_while(Result::is_ok).filter_map(|msg| msg.ok()).map(|event| Ok(Event::default().json_data(sync_event_json(&event)).unwrap_or_else(|_| Event::default())));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn sync_event_json(event: &SyncEvent) -> Value {
    match event {
        SyncEvent::Started { instance } => json!({"type": "started", "instance": instance}),
        SyncEvent::KindStarted { instance, kind } => json!({"type": "kind_started", "instance": instance, "kind": kind}),
        SyncEvent::KindProgress { instance, kind, processed, total } => {
            json!({"type": "kind_progress", "instance": instance, "kind": kind, "processed": processed, "total": total})
        }
        SyncEvent::KindFinished { instance, kind, count } => json!({"type": "kind_finished", "instance": instance, "kind": kind, "count": count}),
        SyncEvent::DerivationsStarted { instance } => json!({"type": "derivations_started", "instance": instance}),
        SyncEvent::Finished { instance } => json!({"type": "finished", "instance": instance}),
        SyncEvent::Aborted { instance } => json!({"type": "aborted", "instance": instance}),
        SyncEvent::Failed { instance, error } => json!({"type": "failed", "instance": instance, "error": error}),
    }
}
