//! The sync orchestrator (C3): full/smart-incremental/single-entity sync
//! per instance, gated process-wide by `isSyncing` (§4.3, §5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use chrono::Utc;
use snafu::{ensure, ResultExt as _};
use stashcache_core::{Cursor, EntityKind};
use stashcache_db::Database;
use stashcache_exclusion::ExclusionEngine;
use stashcache_upstream::model::Filter;
use stashcache_upstream::UpstreamClient;

use crate::batch::process_batch;
use crate::cleanup::cleanup_deleted;
use crate::derive::run_derivations;
use crate::error::{AlreadySyncingSnafu, CursorSnafu, SyncResult};
use crate::progress::{CancelToken, ProgressSink, SyncEvent};
use crate::LOG_TARGET;

const PAGE_SIZE: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Full,
    SmartIncremental,
}

pub struct SyncService {
    db: Database,
    exclusion: ExclusionEngine,
    progress: ProgressSink,
    is_syncing: Arc<AtomicBool>,
    cancel: Arc<StdMutex<Option<CancelToken>>>,
}

impl SyncService {
    pub fn new(db: Database, exclusion: ExclusionEngine) -> (Self, tokio::sync::broadcast::Receiver<SyncEvent>) {
        let (progress, rx) = ProgressSink::new(256);
        (
            Self {
                db,
                exclusion,
                progress,
                is_syncing: Arc::new(AtomicBool::new(false)),
                cancel: Arc::new(StdMutex::new(None)),
            },
            rx,
        )
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SyncEvent> {
        self.progress.subscribe()
    }

    pub fn is_syncing(&self) -> bool {
        self.is_syncing.load(Ordering::SeqCst)
    }

    /// Signals the running sync to stop at its next checkpoint. A no-op if
    /// nothing is running.
    pub fn abort(&self) {
        if let Some(cancel) = self.cancel.lock().expect("cancel mutex poisoned").as_ref() {
            cancel.cancel();
        }
    }

    fn acquire_gate(&self) -> SyncResult<CancelToken> {
        ensure!(!self.is_syncing.swap(true, Ordering::SeqCst), AlreadySyncingSnafu);
        let cancel = CancelToken::new();
        *self.cancel.lock().expect("cancel mutex poisoned") = Some(cancel.clone());
        Ok(cancel)
    }

    fn release_gate(&self) {
        *self.cancel.lock().expect("cancel mutex poisoned") = None;
        self.is_syncing.store(false, Ordering::SeqCst);
    }

    pub async fn run(&self, instance: &str, upstream: Arc<dyn UpstreamClient>, mode: SyncMode) -> SyncResult<()> {
        let cancel = self.acquire_gate()?;
        self.progress.emit(SyncEvent::Started { instance: instance.to_string() });
        let result = self.run_inner(instance, &upstream, mode, &cancel).await;
        self.release_gate();

        match &result {
            Ok(()) => {
                self.progress.emit(SyncEvent::Finished { instance: instance.to_string() });
            }
            Err(err) if err.is_cancellation() => {
                tracing::info!(target: LOG_TARGET, instance, "sync aborted");
                self.progress.emit(SyncEvent::Aborted { instance: instance.to_string() });
            }
            Err(err) => {
                tracing::warn!(target: LOG_TARGET, instance, error = %err, "sync failed");
                self.progress.emit(SyncEvent::Failed { instance: instance.to_string(), error: err.to_string() });
            }
        }
        result
    }

    async fn run_inner(
        &self,
        instance: &str,
        upstream: &Arc<dyn UpstreamClient>,
        mode: SyncMode,
        cancel: &CancelToken,
    ) -> SyncResult<()> {
        let mut touched_derivable_kind = false;
        for kind in EntityKind::SYNC_ORDER {
            cancel.check()?;
            self.progress.emit(SyncEvent::KindStarted { instance: instance.to_string(), kind });

            let processed = self.sync_kind(instance, upstream, kind, mode, cancel).await?;
            if matches!(kind, EntityKind::Scene | EntityKind::Gallery | EntityKind::Image) && processed > 0 {
                touched_derivable_kind = true;
            }

            cancel.check()?;
            cleanup_deleted(&self.db, upstream, instance, kind, cancel).await?;

            self.progress.emit(SyncEvent::KindFinished { instance: instance.to_string(), kind, count: processed });
        }

        if touched_derivable_kind || mode == SyncMode::Full {
            cancel.check()?;
            self.progress.emit(SyncEvent::DerivationsStarted { instance: instance.to_string() });
            run_derivations(&self.db, instance).await?;
            self.exclusion.recompute_all_users().await?;
        }
        Ok(())
    }

    async fn sync_kind(
        &self,
        instance: &str,
        upstream: &Arc<dyn UpstreamClient>,
        kind: EntityKind,
        mode: SyncMode,
        cancel: &CancelToken,
    ) -> SyncResult<u64> {
        let started = Instant::now();
        stashcache_db::record_run_started(self.db.pool(), instance, kind, &Utc::now().to_rfc3339()).await?;

        let filter = match mode {
            SyncMode::Full => Filter::default(),
            SyncMode::SmartIncremental => {
                let state = stashcache_db::get_sync_state(self.db.pool(), instance, kind).await?;
                let cursor = state.and_then(|s| s.last_incremental_cursor.or(s.last_full_cursor));
                match cursor {
                    None => Filter::default(),
                    Some(raw) => {
                        let filter_value = Cursor::new(raw).to_filter_value().context(CursorSnafu { kind })?;
                        let remaining = upstream.count(kind, &Filter { updated_after: Some(filter_value.clone()) }).await?;
                        if remaining == 0 {
                            tracing::debug!(target: LOG_TARGET, instance, %kind, "nothing changed, skipping");
                            return Ok(0);
                        }
                        Filter { updated_after: Some(filter_value) }
                    }
                }
            }
        };

        let outcome = self.page_through(instance, upstream, kind, &filter, cancel).await;
        match outcome {
            Ok((count, max_cursor)) => {
                let raw_cursor = max_cursor.map(|c| c.0);
                let (full_cursor, incremental_cursor) = match mode {
                    SyncMode::Full => (raw_cursor.as_deref(), None),
                    SyncMode::SmartIncremental => (None, raw_cursor.as_deref()),
                };
                stashcache_db::record_run_succeeded(
                    self.db.pool(),
                    instance,
                    kind,
                    full_cursor,
                    incremental_cursor,
                    started.elapsed().as_millis() as i64,
                    count as i64,
                )
                .await?;
                Ok(count)
            }
            Err(err) if err.is_cancellation() => Err(err),
            Err(err) => {
                stashcache_db::record_run_failed(self.db.pool(), instance, kind, &err.to_string()).await?;
                Err(err)
            }
        }
    }

    async fn page_through(
        &self,
        instance: &str,
        upstream: &Arc<dyn UpstreamClient>,
        kind: EntityKind,
        filter: &Filter,
        cancel: &CancelToken,
    ) -> SyncResult<(u64, Option<Cursor>)> {
        let mut page = 1;
        let mut total_processed = 0u64;
        let mut max_cursor: Option<Cursor> = None;
        loop {
            cancel.check()?;
            let result = upstream.find(kind, filter, page, PAGE_SIZE).await?;
            let got = result.items.len();
            let batch_outcome = process_batch(&self.db, instance, kind, result.items).await?;
            total_processed += batch_outcome.processed;
            max_cursor = match (max_cursor, batch_outcome.max_cursor) {
                (Some(a), Some(b)) => Some(a.max(&b).clone()),
                (a, None) => a,
                (None, b) => b,
            };
            self.progress.emit(SyncEvent::KindProgress {
                instance: instance.to_string(),
                kind,
                processed: total_processed,
                total: result.total_count,
            });
            if got < PAGE_SIZE as usize {
                break;
            }
            page += 1;
        }
        Ok((total_processed, max_cursor))
    }

    /// Fetches and upserts one entity through the same batch processor as
    /// paged sync (§4.3 "single-entity sync").
    pub async fn sync_one(
        &self,
        instance: &str,
        upstream: &Arc<dyn UpstreamClient>,
        kind: EntityKind,
        id: &str,
    ) -> SyncResult<()> {
        let cancel = self.acquire_gate()?;
        let result = async {
            match upstream.find_one(kind, id).await? {
                Some(item) => {
                    process_batch(&self.db, instance, kind, vec![item]).await?;
                    Ok(())
                }
                None => Ok(()),
            }
        }
        .await;
        self.release_gate();
        cancel.check().ok();
        result
    }

    pub async fn clear_instance_data(&self, instance: &str) -> SyncResult<()> {
        let _cancel = self.acquire_gate()?;
        let result = stashcache_db::clear_instance_data(self.db.pool(), instance).await;
        self.release_gate();
        result.map_err(Into::into)
    }
}
