//! A `reqwest`-backed [`UpstreamClient`] speaking the upstream's GraphQL
//! API (§4.1). Query shapes follow the `find{Kind}s(filter, filter_type,
//! ids)` convention common to Stash-family catalog servers: a `count`
//! field alongside the item list, and a filter object of
//! `{ modifier, value }` pairs.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use snafu::{ensure, OptionExt as _, ResultExt as _};
use stashcache_core::EntityKind;
use tracing::debug;

use crate::client::UpstreamClient;
use crate::error::{GraphQlSnafu, MissingCountSnafu, MissingDataSnafu, RequestSnafu, StatusSnafu};
use crate::model::{
    Filter, Page, UpstreamClip, UpstreamGallery, UpstreamGroup, UpstreamImage, UpstreamItem,
    UpstreamPerformer, UpstreamScene, UpstreamStudio, UpstreamTag,
};
use crate::UpstreamResult;

pub const LOG_TARGET: &str = "stashcache::upstream";

fn root_field(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Scene => "findScenes",
        EntityKind::Image => "findImages",
        EntityKind::Gallery => "findGalleries",
        EntityKind::Performer => "findPerformers",
        EntityKind::Studio => "findStudios",
        EntityKind::Tag => "findTags",
        EntityKind::Group => "findGroups",
        EntityKind::Clip => "findSceneMarkers",
    }
}

fn items_field(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Scene => "scenes",
        EntityKind::Image => "images",
        EntityKind::Gallery => "galleries",
        EntityKind::Performer => "performers",
        EntityKind::Studio => "studios",
        EntityKind::Tag => "tags",
        EntityKind::Group => "groups",
        EntityKind::Clip => "sceneMarkers",
    }
}

fn selection(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Scene => {
            "id updated_at title code date details director duration play_count phash oshash \
             studio { id } files { path codec width height bit_rate size } \
             paths { screenshot preview sprite vtt stream caption } \
             performers { id } tags { id } groups { group { id } } galleries { id }"
        }
        EntityKind::Image => {
            "id updated_at title date photographer details studio { id } \
             files { path size width height } visual_files { path size width height } \
             performers { id } tags { id }"
        }
        EntityKind::Gallery => {
            "id updated_at title folder { path } cover { id } studio { id } date photographer \
             details performers { id } tags { id } images { id }"
        }
        EntityKind::Performer => "id updated_at name image_path tags { id }",
        EntityKind::Studio => "id updated_at name image_path parent_studio { id } tags { id }",
        EntityKind::Tag => "id updated_at name image_path parents { id }",
        EntityKind::Group => "id updated_at name front_image_path containing_groups { group { id } } tags { id }",
        EntityKind::Clip => {
            "id updated_at scene { id } title seconds end_seconds primary_tag { id } \
             stream screenshot preview tags { id }"
        }
    }
}

fn get_str<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str)
}

fn get_string(v: &Value, key: &str) -> Option<String> {
    get_str(v, key).map(str::to_string)
}

fn get_f64(v: &Value, key: &str) -> Option<f64> {
    v.get(key).and_then(Value::as_f64)
}

fn get_i64(v: &Value, key: &str) -> Option<i64> {
    v.get(key).and_then(Value::as_i64)
}

fn get_nested_id(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(|o| get_string(o, "id"))
}

fn get_id_list(v: &Value, key: &str) -> Vec<String> {
    v.get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|item| get_string(item, "id")).collect())
        .unwrap_or_default()
}

/// `files`/`visual_files` style: take the first element's field, if any.
fn first_file_field<T>(v: &Value, array_key: &str, field: &str, conv: impl Fn(&Value, &str) -> Option<T>) -> Option<T> {
    v.get(array_key)?.as_array()?.first().and_then(|f| conv(f, field))
}

fn parse_item(kind: EntityKind, node: &Value) -> UpstreamItem {
    let id = get_string(node, "id").unwrap_or_default();
    let updated_at = get_string(node, "updated_at").unwrap_or_default();
    match kind {
        EntityKind::Scene => UpstreamItem::Scene(UpstreamScene {
            id,
            updated_at,
            title: get_string(node, "title"),
            code: get_string(node, "code"),
            date: get_string(node, "date"),
            details: get_string(node, "details"),
            director: get_string(node, "director"),
            studio_id: get_nested_id(node, "studio"),
            duration: first_file_field(node, "files", "duration", get_f64),
            file_path: first_file_field(node, "files", "path", get_string),
            file_codec: first_file_field(node, "files", "codec", get_string),
            file_width: first_file_field(node, "files", "width", get_i64),
            file_height: first_file_field(node, "files", "height", get_i64),
            file_bitrate: first_file_field(node, "files", "bit_rate", get_i64),
            file_size: first_file_field(node, "files", "size", get_i64),
            screenshot_path: node.get("paths").and_then(|p| get_string(p, "screenshot")),
            preview_path: node.get("paths").and_then(|p| get_string(p, "preview")),
            sprite_path: node.get("paths").and_then(|p| get_string(p, "sprite")),
            vtt_path: node.get("paths").and_then(|p| get_string(p, "vtt")),
            stream_path: node.get("paths").and_then(|p| get_string(p, "stream")),
            captions_path: node.get("paths").and_then(|p| get_string(p, "caption")),
            play_count: get_i64(node, "play_count").unwrap_or(0),
            phash: get_string(node, "phash"),
            oshash: get_string(node, "oshash"),
            performer_ids: get_id_list(node, "performers"),
            tag_ids: get_id_list(node, "tags"),
            group_ids: node
                .get("groups")
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(|g| get_nested_id(g, "group")).collect())
                .unwrap_or_default(),
            gallery_ids: get_id_list(node, "galleries"),
        }),
        EntityKind::Image => UpstreamItem::Image(UpstreamImage {
            id,
            updated_at,
            title: get_string(node, "title"),
            date: get_string(node, "date"),
            studio_id: get_nested_id(node, "studio"),
            photographer: get_string(node, "photographer"),
            details: get_string(node, "details"),
            file_path: first_file_field(node, "visual_files", "path", get_string)
                .or_else(|| first_file_field(node, "files", "path", get_string)),
            file_size: first_file_field(node, "visual_files", "size", get_i64)
                .or_else(|| first_file_field(node, "files", "size", get_i64)),
            file_width: first_file_field(node, "visual_files", "width", get_i64)
                .or_else(|| first_file_field(node, "files", "width", get_i64)),
            file_height: first_file_field(node, "visual_files", "height", get_i64)
                .or_else(|| first_file_field(node, "files", "height", get_i64)),
            play_count: 0,
            performer_ids: get_id_list(node, "performers"),
            tag_ids: get_id_list(node, "tags"),
        }),
        EntityKind::Gallery => UpstreamItem::Gallery(UpstreamGallery {
            id,
            updated_at,
            title: get_string(node, "title"),
            folder_path: node.get("folder").and_then(|f| get_string(f, "path")),
            cover_image_id: get_nested_id(node, "cover"),
            studio_id: get_nested_id(node, "studio"),
            date: get_string(node, "date"),
            photographer: get_string(node, "photographer"),
            details: get_string(node, "details"),
            performer_ids: get_id_list(node, "performers"),
            tag_ids: get_id_list(node, "tags"),
            image_ids: get_id_list(node, "images"),
        }),
        EntityKind::Performer => UpstreamItem::Performer(UpstreamPerformer {
            id,
            updated_at,
            name: get_string(node, "name").unwrap_or_default(),
            image_path: get_string(node, "image_path"),
            tag_ids: get_id_list(node, "tags"),
        }),
        EntityKind::Studio => UpstreamItem::Studio(UpstreamStudio {
            id,
            updated_at,
            name: get_string(node, "name").unwrap_or_default(),
            parent_id: get_nested_id(node, "parent_studio"),
            image_path: get_string(node, "image_path"),
            tag_ids: get_id_list(node, "tags"),
        }),
        EntityKind::Tag => UpstreamItem::Tag(UpstreamTag {
            id,
            updated_at,
            name: get_string(node, "name").unwrap_or_default(),
            image_path: get_string(node, "image_path"),
            parent_ids: get_id_list(node, "parents"),
        }),
        EntityKind::Group => UpstreamItem::Group(UpstreamGroup {
            id,
            updated_at,
            name: get_string(node, "name").unwrap_or_default(),
            parent_id: node
                .get("containing_groups")
                .and_then(Value::as_array)
                .and_then(|items| items.first())
                .and_then(|g| get_nested_id(g, "group")),
            image_path: get_string(node, "front_image_path"),
            tag_ids: get_id_list(node, "tags"),
        }),
        EntityKind::Clip => UpstreamItem::Clip(UpstreamClip {
            id,
            updated_at,
            scene_id: get_nested_id(node, "scene").unwrap_or_default(),
            title: get_string(node, "title"),
            seconds: get_f64(node, "seconds").unwrap_or(0.0),
            end_seconds: get_f64(node, "end_seconds"),
            primary_tag_id: get_nested_id(node, "primary_tag"),
            preview_path: get_string(node, "preview"),
            screenshot_path: get_string(node, "screenshot"),
            stream_path: get_string(node, "stream"),
            tag_ids: get_id_list(node, "tags"),
        }),
    }
}

fn filter_json(filter: &Filter) -> Value {
    match &filter.updated_after {
        Some(value) => json!({ "updated_at": { "value": value, "modifier": "GREATER_THAN" } }),
        None => json!({}),
    }
}

pub struct GraphQlUpstreamClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GraphQlUpstreamClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client builds with static TLS config");
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    async fn post(&self, kind: EntityKind, query: &str, variables: Value) -> UpstreamResult<Value> {
        let url = format!("{}/graphql", self.base_url.trim_end_matches('/'));
        let body = json!({ "query": query, "variables": variables });
        debug!(target: LOG_TARGET, %kind, %url, "posting graphql query");

        let response = self
            .http
            .post(&url)
            .header("ApiKey", &self.api_key)
            .json(&body)
            .send()
            .await
            .context(RequestSnafu { url: url.clone() })?;

        let status = response.status();
        ensure!(status.is_success(), StatusSnafu { url: url.clone(), status });

        let payload: Value = response
            .json()
            .await
            .context(RequestSnafu { url: url.clone() })?;

        if let Some(errors) = payload.get("errors").filter(|e| !e.is_null()) {
            return GraphQlSnafu {
                kind,
                message: errors.to_string(),
            }
            .fail();
        }

        payload.get("data").cloned().context(MissingDataSnafu { kind })
    }
}

#[async_trait]
impl UpstreamClient for GraphQlUpstreamClient {
    async fn find(
        &self,
        kind: EntityKind,
        filter: &Filter,
        page: u32,
        per_page: u32,
    ) -> UpstreamResult<Page<UpstreamItem>> {
        let root = root_field(kind);
        let items_key = items_field(kind);
        let query = format!(
            "query($filter: Value, $find_filter: FindFilterType) {{ {root}(filter: $filter, \
             find_filter: $find_filter) {{ count {items_key} {{ {} }} }} }}",
            selection(kind)
        );
        let variables = json!({
            "filter": filter_json(filter),
            "find_filter": { "page": page, "per_page": per_page },
        });
        let data = self.post(kind, &query, variables).await?;
        let root_val = data.get(root).cloned().unwrap_or(Value::Null);
        let total_count = root_val
            .get("count")
            .and_then(Value::as_u64)
            .context(MissingCountSnafu { kind })?;
        let items = root_val
            .get(items_key)
            .and_then(Value::as_array)
            .map(|nodes| nodes.iter().map(|n| parse_item(kind, n)).collect())
            .unwrap_or_default();
        Ok(Page { items, total_count })
    }

    async fn find_ids(&self, kind: EntityKind, page: u32, per_page: u32) -> UpstreamResult<Page<String>> {
        let root = root_field(kind);
        let items_key = items_field(kind);
        let query = format!(
            "query($find_filter: FindFilterType) {{ {root}(find_filter: $find_filter) {{ count \
             {items_key} {{ id }} }} }}"
        );
        let variables = json!({ "find_filter": { "page": page, "per_page": per_page } });
        let data = self.post(kind, &query, variables).await?;
        let root_val = data.get(root).cloned().unwrap_or(Value::Null);
        let total_count = root_val
            .get("count")
            .and_then(Value::as_u64)
            .context(MissingCountSnafu { kind })?;
        let items = root_val
            .get(items_key)
            .and_then(Value::as_array)
            .map(|nodes| nodes.iter().filter_map(|n| get_string(n, "id")).collect())
            .unwrap_or_default();
        Ok(Page { items, total_count })
    }

    async fn find_one(&self, kind: EntityKind, id: &str) -> UpstreamResult<Option<UpstreamItem>> {
        let query = format!(
            "query($ids: [ID!]) {{ {root}(ids: $ids) {{ count {items_key} {{ {fields} }} }} }}",
            root = root_field(kind),
            items_key = items_field(kind),
            fields = selection(kind),
        );
        let variables = json!({ "ids": [id] });
        let data = self.post(kind, &query, variables).await?;
        let root_val = data.get(root_field(kind)).cloned().unwrap_or(Value::Null);
        let item = root_val
            .get(items_field(kind))
            .and_then(Value::as_array)
            .and_then(|nodes| nodes.first())
            .map(|n| parse_item(kind, n));
        Ok(item)
    }

    async fn count(&self, kind: EntityKind, filter: &Filter) -> UpstreamResult<u64> {
        let query = format!(
            "query($filter: Value) {{ {root}(filter: $filter) {{ count }} }}",
            root = root_field(kind)
        );
        let variables = json!({ "filter": filter_json(filter) });
        let data = self.post(kind, &query, variables).await?;
        data.get(root_field(kind))
            .and_then(|r| r.get("count"))
            .and_then(Value::as_u64)
            .context(MissingCountSnafu { kind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_json_empty_when_no_cursor() {
        assert_eq!(filter_json(&Filter::default()), json!({}));
    }

    #[test]
    fn filter_json_wraps_cursor_as_greater_than() {
        let filter = Filter {
            updated_after: Some("2024-01-01T00:00:00.999".to_string()),
        };
        assert_eq!(
            filter_json(&filter),
            json!({ "updated_at": { "value": "2024-01-01T00:00:00.999", "modifier": "GREATER_THAN" } })
        );
    }

    #[test]
    fn parse_item_scene_extracts_nested_fields() {
        let node = json!({
            "id": "42",
            "updated_at": "2024-05-01T12:00:00+00:00",
            "title": "A scene",
            "phash": "abc123",
            "studio": { "id": "7" },
            "files": [{ "path": "/a.mp4", "codec": "h264", "width": 1920, "height": 1080, "size": 100, "duration": 12.5 }],
            "paths": { "screenshot": "/s.jpg", "preview": "/p.mp4" },
            "performers": [{ "id": "1" }, { "id": "2" }],
            "tags": [{ "id": "9" }],
            "groups": [{ "group": { "id": "5" } }],
            "galleries": [{ "id": "3" }],
        });
        let UpstreamItem::Scene(scene) = parse_item(EntityKind::Scene, &node) else {
            panic!("expected scene");
        };
        assert_eq!(scene.id, "42");
        assert_eq!(scene.updated_at, "2024-05-01T12:00:00+00:00");
        assert_eq!(scene.studio_id.as_deref(), Some("7"));
        assert_eq!(scene.file_path.as_deref(), Some("/a.mp4"));
        assert_eq!(scene.duration, Some(12.5));
        assert_eq!(scene.performer_ids, vec!["1".to_string(), "2".to_string()]);
        assert_eq!(scene.group_ids, vec!["5".to_string()]);
        assert_eq!(scene.gallery_ids, vec!["3".to_string()]);
    }

    #[test]
    fn parse_item_missing_optional_fields_defaults_gracefully() {
        let node = json!({ "id": "1", "updated_at": "2024-01-01T00:00:00Z", "name": "Solo Tag" });
        let UpstreamItem::Tag(tag) = parse_item(EntityKind::Tag, &node) else {
            panic!("expected tag");
        };
        assert_eq!(tag.name, "Solo Tag");
        assert!(tag.parent_ids.is_empty());
        assert_eq!(tag.image_path, None);
    }
}
