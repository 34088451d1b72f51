//! Batch-processor step 1 (§4.3): drop ids that can't be safely
//! interpolated into raw SQL, logging a warning instead of failing the
//! whole batch.

use stashcache_core::is_valid_upstream_id;
use stashcache_upstream::model::UpstreamItem;

use crate::LOG_TARGET;

/// Filters out items (and logs) whose own id is unsafe. Junction targets
/// are filtered separately by [`valid_ids`] at the call site that builds
/// junction children, since an invalid related id should drop just that
/// edge, not the whole item.
pub fn filter_valid_items(items: Vec<UpstreamItem>) -> Vec<UpstreamItem> {
    items
        .into_iter()
        .filter(|item| {
            let ok = is_valid_upstream_id(item.id());
            if !ok {
                tracing::warn!(target: LOG_TARGET, id = item.id(), "dropping item with unsafe id");
            }
            ok
        })
        .collect()
}

/// Filters a list of related-entity ids (junction targets), dropping and
/// warning on any that fail the id-safety check (§7 "invalid id
/// encountered" / "orphan junction").
pub fn valid_ids<'a>(ids: &'a [String], context: &str) -> Vec<&'a str> {
    ids.iter()
        .filter_map(|id| {
            if is_valid_upstream_id(id) {
                Some(id.as_str())
            } else {
                tracing::warn!(target: LOG_TARGET, id, context, "dropping unsafe related id");
                None
            }
        })
        .collect()
}
