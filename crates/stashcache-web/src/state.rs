//! Shared request state (§9 "singletons are explicit dependencies"): the
//! mirror, the sync/exclusion engines, and the per-instance upstream
//! registry loaded once at startup (§6 Environment inputs).

use std::collections::HashMap;
use std::sync::Arc;

use stashcache_db::Database;
use stashcache_exclusion::ExclusionEngine;
use stashcache_sync::SyncService;
use stashcache_upstream::UpstreamClient;

/// Upstream clients keyed by instance id, built once at startup from the
/// `instance` table (§6). Looked up by id on every sync-trigger request
/// rather than rebuilt per call.
#[derive(Clone, Default)]
pub struct InstanceRegistry {
    clients: Arc<HashMap<String, Arc<dyn UpstreamClient>>>,
}

impl InstanceRegistry {
    pub fn new(clients: HashMap<String, Arc<dyn UpstreamClient>>) -> Self {
        Self { clients: Arc::new(clients) }
    }

    pub fn get(&self, instance: &str) -> Option<Arc<dyn UpstreamClient>> {
        self.clients.get(instance).cloned()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub sync: Arc<SyncService>,
    pub exclusion: ExclusionEngine,
    pub http: reqwest::Client,
    pub instances: InstanceRegistry,
}

pub type SharedState = Arc<AppState>;
