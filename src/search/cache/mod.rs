use crate::search::types::{SearchParameters, SearchResponse};
use crate::utils::json::canonical_json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// How often the background sweep evicts expired entries.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

struct CachedResponse {
    response: SearchResponse,
    cached_at: Instant,
}

/// Fixed-TTL cache of search responses keyed by a SHA-256 fingerprint of the
/// normalized parameters. A disabled cache is a no-op.
pub struct SearchCache {
    entries: RwLock<HashMap<String, CachedResponse>>,
    ttl: Duration,
    enabled: bool,
    sweeper: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl SearchCache {
    pub fn new(ttl: Duration, enabled: bool) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            enabled,
            sweeper: std::sync::Mutex::new(None),
        }
    }

    /// Stable fingerprint over the normalized parameter fields.
    pub fn fingerprint(params: &SearchParameters) -> String {
        let canonical = canonical_json(&params.fingerprint_fields());
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }

    /// Fresh copy of a cached response, marked `cached = true`.
    pub async fn get(&self, params: &SearchParameters) -> Option<SearchResponse> {
        if !self.enabled {
            return None;
        }
        let key = Self::fingerprint(params);
        let entries = self.entries.read().await;
        let cached = entries.get(&key)?;
        if cached.cached_at.elapsed() >= self.ttl {
            return None;
        }
        let mut response = cached.response.clone();
        response.cached = true;
        Some(response)
    }

    pub async fn put(&self, params: &SearchParameters, response: &SearchResponse) {
        if !self.enabled {
            return;
        }
        let key = Self::fingerprint(params);
        self.entries.write().await.insert(
            key,
            CachedResponse {
                response: response.clone(),
                cached_at: Instant::now(),
            },
        );
    }

    /// Drop expired entries. Returns the number removed.
    pub async fn sweep_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, cached| cached.cached_at.elapsed() < self.ttl);
        let removed = before - entries.len();
        if removed > 0 {
            debug!("search cache sweep removed {} expired entries", removed);
        }
        removed
    }

    /// Start the periodic expiry sweep. Idempotent; no-op when disabled.
    pub fn start_sweep(self: &Arc<Self>) {
        if !self.enabled {
            return;
        }
        let mut guard = self.sweeper.lock().expect("sweeper lock poisoned");
        if guard.is_some() {
            return;
        }
        let cache = Arc::clone(self);
        *guard = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            interval.tick().await;
            loop {
                interval.tick().await;
                cache.sweep_expired().await;
            }
        }));
    }

    /// Stop the background sweep. Called before teardown.
    pub fn close(&self) {
        if let Some(handle) = self.sweeper.lock().expect("sweeper lock poisoned").take() {
            handle.abort();
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
