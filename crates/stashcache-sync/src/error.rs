use snafu::Snafu;
use stashcache_core::EntityKind;

#[derive(Debug, Snafu)]
pub enum SyncError {
    #[snafu(transparent)]
    Upstream { source: stashcache_upstream::UpstreamError },
    #[snafu(transparent)]
    Db { source: stashcache_db::DbError },
    #[snafu(transparent)]
    Exclusion { source: stashcache_exclusion::ExclusionError },
    #[snafu(display("cursor error for {kind}: {source}"))]
    Cursor { kind: EntityKind, source: stashcache_core::CursorError },
    /// Raised by the abort path; handled at the top level as "aborted", not
    /// "failed" (§4.3 concurrency).
    #[snafu(display("sync aborted"))]
    Aborted,
    #[snafu(display("a sync is already running"))]
    AlreadySyncing,
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Whether this should be surfaced to `SyncState.lastError` as a
    /// failure, vs. logged as a non-error cancellation (§7).
    pub fn is_cancellation(&self) -> bool {
        matches!(self, SyncError::Aborted)
    }
}
