//! Periodic + manually-triggered sync runs across every enabled instance
//! (C10), directly grounded on `FolloweeChecker::run`'s interval/select
//! shape.

use std::sync::Arc;
use std::time::Duration;

use stashcache_db::Database;
use stashcache_sync::{SyncMode, SyncService};
use stashcache_upstream::GraphQlUpstreamClient;
use tokio::sync::mpsc;
use tracing::{info, warn};

const LOG_TARGET: &str = "stashcache::scheduler";

/// Sent on the manual-trigger channel to wake the scheduler ahead of its
/// next tick; the scheduler still runs every configured instance on each
/// wake, so no payload is needed.
pub struct Wakeup;

pub struct Scheduler {
    db: Database,
    sync: Arc<SyncService>,
    interval: Duration,
    wakeups: mpsc::Receiver<Wakeup>,
}

impl Scheduler {
    pub fn new(db: Database, sync: Arc<SyncService>, interval: Duration) -> (Self, mpsc::Sender<Wakeup>) {
        let (tx, rx) = mpsc::channel(8);
        (Self { db, sync, interval, wakeups: rx }, tx)
    }

    #[tracing::instrument(skip(self), ret)]
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => (),
                res = self.wakeups.recv() => {
                    if res.is_none() {
                        break;
                    }
                }
            }

            self.run_all_instances().await;
        }
    }

    async fn run_all_instances(&self) {
        let instances = match stashcache_db::list_enabled_instances(self.db.pool()).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(target: LOG_TARGET, %err, "failed to list enabled instances");
                return;
            }
        };

        for row in instances {
            let upstream = Arc::new(GraphQlUpstreamClient::new(row.base_url.clone(), row.api_key.clone()));
            info!(target: LOG_TARGET, instance = %row.id, "running scheduled sync");
            if let Err(err) = self.sync.run(&row.id, upstream, SyncMode::SmartIncremental).await {
                warn!(target: LOG_TARGET, instance = %row.id, %err, "scheduled sync run failed");
            }
        }
    }
}
