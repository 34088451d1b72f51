use async_trait::async_trait;
use stashcache_core::EntityKind;

use crate::model::{Filter, Page, UpstreamItem};
use crate::UpstreamResult;

/// The upstream-transport seam (§4.1). Opaque to the rest of the system:
/// whatever backs this trait must preserve upstream ids and raw
/// `updated_at` strings verbatim, since timestamp normalization is C3's
/// job, not C1's.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn find(
        &self,
        kind: EntityKind,
        filter: &Filter,
        page: u32,
        per_page: u32,
    ) -> UpstreamResult<Page<UpstreamItem>>;

    async fn find_ids(&self, kind: EntityKind, page: u32, per_page: u32) -> UpstreamResult<Page<String>>;

    async fn find_one(&self, kind: EntityKind, id: &str) -> UpstreamResult<Option<UpstreamItem>>;

    async fn count(&self, kind: EntityKind, filter: &Filter) -> UpstreamResult<u64>;
}
