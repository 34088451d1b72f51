//! Route wiring for the JSON API (§6): one `Router<SharedState>` merging
//! the entity, sync, and admin handler groups.

mod admin;
mod entities;
mod sync;

use axum::routing::{get, post};
use axum::Router;
use serde_json::{Map, Value};
use stashcache_core::EntityKind;
use stashcache_query::{meta, rewrite_url};

use crate::error::{AppError, UnknownKindSnafu};
use crate::state::SharedState;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/{kind}/search", post(entities::list_entities))
        .route("/api/{kind}/{instance}/{id}", get(entities::get_entity))
        .route("/api/scenes/{instance}/{id}/clips", get(entities::list_clips_for_scene))
        .route("/api/users/{user_id}/hidden/{kind}/{instance}/{id}", post(entities::hide_entity).delete(entities::unhide_entity))
        .route("/api/sync/status", get(sync::sync_status))
        .route("/api/sync/events", get(sync::sync_events))
        .route("/api/sync/abort", post(sync::abort_sync))
        .route("/api/sync/{instance}/trigger", post(sync::trigger_sync))
        .route("/api/instances/{instance}/clear", post(admin::clear_instance_data))
        .route("/api/clips/reprobe", post(admin::reprobe_pending_clips))
        .with_state(state)
}

pub(crate) fn parse_kind(s: &str) -> Result<EntityKind, AppError> {
    EntityKind::from_plural(s).ok_or_else(|| UnknownKindSnafu { kind: s.to_string() }.build())
}

/// Rewrites every column in `kind`'s [`stashcache_query::KindMeta::media_fields`]
/// to a same-origin proxy path (§4.8), scoped to the row's own `instance`
/// column so a multi-instance list still proxies each item correctly.
pub(crate) fn rewrite_media_urls(kind: EntityKind, obj: &mut Map<String, Value>) {
    let m = meta(kind);
    let instance = obj.get("instance").and_then(Value::as_str).map(str::to_string);
    for field in m.media_fields {
        let Some(current) = obj.get(*field) else { continue };
        let raw = current.as_str().map(str::to_string);
        let rewritten = rewrite_url(raw.as_deref(), instance.as_deref());
        obj.insert((*field).to_string(), rewritten.map(Value::String).unwrap_or(Value::Null));
    }
}
