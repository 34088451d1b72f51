//! List/count query builders (C6), relation hydration (C7), and the
//! upstream-URL rewriter (C9) -- everything a kind's list endpoint needs
//! between "validated request" and "JSON-ready page" (§4.5, §4.6, §4.8).

mod builder;
mod error;
mod filter;
mod hierarchy;
mod hydrate;
mod meta;
mod options;
mod tojson;
mod urlrewrite;

pub use builder::{clips_for_scene, count, get_by_id, list, resolve_hierarchy_filters};
pub use error::{QueryError, QueryResult, LOG_TARGET};
pub use filter::{DateModifier, FilterClause, IdModifier, JunctionModifier, NumericModifier, TextModifier};
pub use hierarchy::{expand_studio_ids, expand_tag_ids};
pub use hydrate::{hydrate_junction, RelatedRef};
pub use meta::{meta, JunctionDef, KindMeta};
pub use options::{PageResult, QueryOptions};
pub use tojson::row_to_json;
pub use urlrewrite::rewrite_url;

#[cfg(test)]
mod tests;
