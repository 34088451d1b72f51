//! Wire shapes for the JSON request/response bodies (§6). `FilterClause`
//! itself is never `Deserialize` -- its `field`s are `&'static str`
//! resolved against a kind's [`stashcache_query::KindMeta`] -- so a
//! [`WireFilter`] carries an owned `field: String` that gets validated
//! and interned against the kind's closed column set on the way in.

use serde::{Deserialize, Serialize};
use stashcache_core::{EntityKind, SortDirection};
use stashcache_query::{DateModifier, FilterClause, IdModifier, JunctionModifier, KindMeta, NumericModifier, QueryOptions, TextModifier};

use crate::error::{AppError, InvalidRequestSnafu};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireFilter {
    Id { modifier: IdModifier, ids: Vec<String> },
    Text { field: String, modifier: TextModifier, value: Option<String> },
    Numeric { field: String, modifier: NumericModifier, value: f64, value2: Option<f64> },
    Date { field: String, modifier: DateModifier, value: Option<String>, value2: Option<String> },
    Favorite { value: bool },
    Hierarchy { kind: EntityKind, ids: Vec<String>, depth: u32, modifier: IdModifier },
    Junction { other_kind: EntityKind, modifier: JunctionModifier, ids: Vec<String> },
}

fn resolve_filter(m: &KindMeta, w: WireFilter) -> Result<FilterClause, AppError> {
    Ok(match w {
        WireFilter::Id { modifier, ids } => FilterClause::Id { field: "id", modifier, ids },
        WireFilter::Text { field, modifier, value } => {
            let field = m.text_column(&field).ok_or_else(|| InvalidRequestSnafu { message: format!("unknown text field {field:?} for {}", m.kind) }.build())?;
            FilterClause::Text { field, modifier, value }
        }
        WireFilter::Numeric { field, modifier, value, value2 } => {
            let field = m.numeric_column(&field).ok_or_else(|| InvalidRequestSnafu { message: format!("unknown numeric field {field:?} for {}", m.kind) }.build())?;
            FilterClause::Numeric { field, modifier, value, value2 }
        }
        WireFilter::Date { field, modifier, value, value2 } => {
            let field = m.date_column(&field).ok_or_else(|| InvalidRequestSnafu { message: format!("unknown date field {field:?} for {}", m.kind) }.build())?;
            FilterClause::Date { field, modifier, value, value2 }
        }
        WireFilter::Favorite { value } => FilterClause::Favorite { value },
        WireFilter::Hierarchy { kind, ids, depth, modifier } => FilterClause::Hierarchy { kind, ids, depth, modifier },
        WireFilter::Junction { other_kind, modifier, ids } => FilterClause::Junction { other_kind, modifier, ids },
    })
}

/// The §4.5 option bag as it arrives over the wire. Defaults match
/// [`QueryOptions::default`] so an empty `{}` body is a valid "list
/// everything, page 1" request.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    pub user_id: Option<String>,
    pub filters: Vec<WireFilter>,
    pub sort_key: String,
    pub sort_direction: SortDirection,
    pub page: u32,
    pub per_page: u32,
    pub search: Option<String>,
    pub specific_instance_id: Option<String>,
    pub allowed_instance_ids: Option<Vec<String>>,
    pub random_seed: Option<i64>,
    /// Related kinds to hydrate onto each item (§4.6), e.g. `["tag",
    /// "performer"]` for a scene list that wants tag/performer chips.
    pub with: Vec<EntityKind>,
}

impl Default for SearchRequest {
    fn default() -> Self {
        let d = QueryOptions::default();
        Self {
            user_id: d.user_id,
            filters: Vec::new(),
            sort_key: d.sort_key,
            sort_direction: d.sort_direction,
            page: d.page,
            per_page: d.per_page,
            search: d.search,
            specific_instance_id: d.specific_instance_id,
            allowed_instance_ids: d.allowed_instance_ids,
            random_seed: d.random_seed,
            with: Vec::new(),
        }
    }
}

impl SearchRequest {
    /// Converts the wire request into the builder's option bag, resolving
    /// every filter's field name against `m`'s closed column set.
    /// [`stashcache_query::FilterClause::Hierarchy`] entries are left
    /// unresolved -- callers expand those with `resolve_hierarchy_filters`
    /// once they know which instance to scope the expansion to.
    pub fn into_query_options(self, m: &KindMeta) -> Result<(QueryOptions, Vec<EntityKind>), AppError> {
        if self.user_id.is_none() && self.filters.iter().any(|f| matches!(f, WireFilter::Favorite { .. })) {
            return Err(InvalidRequestSnafu { message: "a favorite filter requires user_id".to_string() }.build());
        }
        let filters = self.filters.into_iter().map(|f| resolve_filter(m, f)).collect::<Result<Vec<_>, _>>()?;
        let opts = QueryOptions {
            user_id: self.user_id,
            filters,
            sort_key: self.sort_key,
            sort_direction: self.sort_direction,
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, 200),
            search: self.search,
            allowed_instance_ids: self.allowed_instance_ids,
            specific_instance_id: self.specific_instance_id,
            random_seed: self.random_seed,
            apply_exclusions: true,
        };
        Ok((opts, self.with))
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub items: Vec<serde_json::Value>,
    pub total: u64,
}
