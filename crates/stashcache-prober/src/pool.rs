//! Bounded worker pool over a batch of preview URLs (§4.7 batching:
//! "a bounded worker pool (default 10 in-flight) ... per-request
//! timeout 5 s"), grounded on `rostra-client`'s
//! `stream::iter(..).buffer_unordered(..)` fan-out idiom.

use std::collections::HashMap;
use std::time::Duration;

use futures::stream::{self, StreamExt as _};
use reqwest::Client;
use tracing::warn;

use crate::classify::is_generated;
use crate::LOG_TARGET;

pub const DEFAULT_CONCURRENCY: usize = 10;
const PER_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds the prober's HTTP client: short per-request timeout, no
/// retries (a probe is a point-in-time classification, not a
/// best-effort fetch).
pub fn client() -> Client {
    Client::builder()
        .timeout(PER_REQUEST_TIMEOUT)
        .build()
        .expect("reqwest client builds with static TLS config")
}

/// Classifies every url in `urls`, at most `concurrency` in flight at
/// once. A url whose probe errors (timeout, connection failure) is
/// omitted from the result rather than failing the whole batch, since
/// one unreachable preview shouldn't block classifying the rest.
pub async fn probe_batch(client: &Client, urls: &[String], concurrency: usize) -> HashMap<String, bool> {
    let concurrency = concurrency.max(1);
    stream::iter(urls.iter().cloned())
        .map(|url| {
            let client = client.clone();
            async move {
                match is_generated(&client, &url).await {
                    Ok(generated) => Some((url, generated)),
                    Err(err) => {
                        warn!(target: LOG_TARGET, %url, %err, "preview probe failed");
                        None
                    }
                }
            }
        })
        .buffer_unordered(concurrency)
        .filter_map(|result| async move { result })
        .collect()
        .await
}
