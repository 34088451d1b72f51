//! Preview-generated classifier (C8, §4.7): Range-GET probes a clip's
//! preview URL, tells a real preview apart from the upstream's
//! placeholder, and writes the verdict back to the mirror.

mod classify;
mod error;
mod pool;

pub use classify::is_generated;
pub use error::{ProbeError, ProbeResult, LOG_TARGET};
pub use pool::{client, probe_batch, DEFAULT_CONCURRENCY};

use sqlx::SqlitePool;
use stashcache_db::set_clip_generated;
use tracing::warn;

/// A clip awaiting a preview-generated probe.
#[derive(Debug, Clone)]
pub struct PendingClip {
    pub id: String,
    pub instance: String,
    pub preview_url: String,
}

/// Probes every clip's preview URL (bounded concurrency,
/// [`DEFAULT_CONCURRENCY`] in flight) and writes each verdict to the
/// mirror via [`stashcache_db::set_clip_generated`]. A clip whose
/// probe failed is left untouched rather than written as `false`, so
/// the next run retries it instead of recording a wrong negative.
pub async fn probe_and_record(pool: &SqlitePool, http: &reqwest::Client, clips: &[PendingClip], concurrency: usize) {
    let urls: Vec<String> = clips.iter().map(|c| c.preview_url.clone()).collect();
    let results = probe_batch(http, &urls, concurrency).await;

    for clip in clips {
        let Some(&generated) = results.get(&clip.preview_url) else {
            continue;
        };
        if let Err(err) = set_clip_generated(pool, &clip.id, &clip.instance, generated).await {
            warn!(target: LOG_TARGET, clip_id = %clip.id, %err, "failed to write preview-generated verdict");
        }
    }
}

#[cfg(test)]
mod tests;
