//! List/by-id/clips-for-scene/hide-unhide handlers (§6).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{Map, Value};
use stashcache_core::EntityKind;
use stashcache_query::{clips_for_scene, get_by_id, hydrate_junction, list, resolve_hierarchy_filters, row_to_json};

use super::{parse_kind, rewrite_media_urls};
use crate::dto::{SearchRequest, SearchResponse};
use crate::error::{AppResult, NotFoundSnafu};
use crate::state::SharedState;

fn primary_key(obj: &Map<String, Value>) -> (String, String) {
    let id = obj.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
    let instance = obj.get("instance").and_then(Value::as_str).unwrap_or_default().to_string();
    (id, instance)
}

pub async fn list_entities(
    State(state): State<SharedState>,
    Path(kind_str): Path<String>,
    Json(req): Json<SearchRequest>,
) -> AppResult<Json<SearchResponse>> {
    let kind = parse_kind(&kind_str)?;
    let m = stashcache_query::meta(kind);
    let (mut opts, with) = req.into_query_options(&m)?;
    let hierarchy_instance = opts.specific_instance_id.clone().unwrap_or_default();
    opts.filters = resolve_hierarchy_filters(state.db.pool(), &hierarchy_instance, &m, opts.filters).await?;

    let page = list(state.db.pool(), kind, &opts).await?;
    let mut items: Vec<Map<String, Value>> = page.items.iter().map(row_to_json).collect();
    let primary_keys: Vec<(String, String)> = items.iter().map(primary_key).collect();

    for other_kind in &with {
        let related = hydrate_junction(state.db.pool(), kind, *other_kind, &primary_keys).await?;
        for (obj, key) in items.iter_mut().zip(primary_keys.iter()) {
            let refs = related.get(key).cloned().unwrap_or_default();
            let value = refs.into_iter().map(|r| serde_json::json!({"id": r.id, "instance": r.instance, "name": r.name})).collect();
            obj.insert(other_kind.plural().to_string(), Value::Array(value));
        }
    }

    for obj in &mut items {
        rewrite_media_urls(kind, obj);
    }

    let items = items.into_iter().map(Value::Object).collect();
    Ok(Json(SearchResponse { items, total: page.total }))
}

pub async fn get_entity(
    State(state): State<SharedState>,
    Path((kind_str, instance, id)): Path<(String, String, String)>,
) -> AppResult<Json<Value>> {
    let kind = parse_kind(&kind_str)?;
    let row = get_by_id(state.db.pool(), kind, &id, &instance)
        .await?
        .ok_or_else(|| NotFoundSnafu { kind, id: id.clone() }.build())?;
    let mut obj = row_to_json(&row);
    rewrite_media_urls(kind, &mut obj);
    Ok(Json(Value::Object(obj)))
}

pub async fn list_clips_for_scene(
    State(state): State<SharedState>,
    Path((instance, scene_id)): Path<(String, String)>,
) -> AppResult<Json<Vec<Value>>> {
    let rows = clips_for_scene(state.db.pool(), &scene_id, &instance).await?;
    let items = rows
        .iter()
        .map(|row| {
            let mut obj = row_to_json(row);
            rewrite_media_urls(EntityKind::Clip, &mut obj);
            Value::Object(obj)
        })
        .collect();
    Ok(Json(items))
}

pub async fn hide_entity(
    State(state): State<SharedState>,
    Path((user_id, kind_str, instance, id)): Path<(String, String, String, String)>,
) -> AppResult<StatusCode> {
    let kind = parse_kind(&kind_str)?;
    state.exclusion.add_hidden_entity(&user_id, kind, &id, &instance).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unhide_entity(
    State(state): State<SharedState>,
    Path((user_id, kind_str, instance, id)): Path<(String, String, String, String)>,
) -> AppResult<StatusCode> {
    let kind = parse_kind(&kind_str)?;
    state.exclusion.remove_hidden_entity(&user_id, kind, &id, &instance).await?;
    Ok(StatusCode::NO_CONTENT)
}
