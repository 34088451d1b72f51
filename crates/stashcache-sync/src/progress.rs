//! Sync progress events and cancellation, mirroring the teacher's
//! `watch`/`broadcast`-channel idiom for long-running background passes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use stashcache_core::EntityKind;
use tokio::sync::broadcast;

use crate::error::{AbortedSnafu, SyncResult};
use snafu::ensure;

/// One event emitted as a sync run progresses. Receivers are the HTTP
/// streaming handlers (§9 "Event emission"); sends are non-blocking and
/// drop for slow consumers, the standard `broadcast` behavior.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    Started { instance: String },
    KindStarted { instance: String, kind: EntityKind },
    KindProgress { instance: String, kind: EntityKind, processed: u64, total: u64 },
    KindFinished { instance: String, kind: EntityKind, count: u64 },
    DerivationsStarted { instance: String },
    Finished { instance: String },
    Aborted { instance: String },
    Failed { instance: String, error: String },
}

/// Shared cancellation flag, checked at every page boundary and before each
/// major pass (§5 "Cancellation and timeouts").
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> SyncResult<()> {
        ensure!(!self.is_cancelled(), AbortedSnafu);
        Ok(())
    }
}

#[derive(Clone)]
pub struct ProgressSink {
    tx: broadcast::Sender<SyncEvent>,
}

impl ProgressSink {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<SyncEvent>) {
        let (tx, rx) = broadcast::channel(capacity);
        (Self { tx }, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: SyncEvent) {
        // A slow/absent receiver must never block or fail the sync.
        let _ = self.tx.send(event);
    }
}
