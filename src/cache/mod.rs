pub mod policy;
pub mod storage;

use crate::plan::types::StepResult;
use crate::utils::json::canonical_json;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use policy::CachePolicy;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use storage::CacheStorage;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Fixed per-entry overhead added to the measured payload size.
const ENTRY_OVERHEAD: u64 = 512;

/// How often the background sweep evicts expired entries.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// One cached step result. Invisible to readers once `expires_at` passes.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub tool_name: String,
    pub arguments: Value,
    pub result: StepResult,
    pub created_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub ttl: Duration,
    pub hit_count: u64,
    pub size: u64,
    pub tags: HashSet<String>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
}

/// Point-in-time view of the cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub invalidations: u64,
}

/// Policy-driven store of prior step results.
///
/// Storage failures never fail the caller: reads degrade to a miss and
/// writes are dropped, both with a `warn!`.
pub struct ResultCache {
    storage: Arc<dyn CacheStorage>,
    policies: Vec<Arc<dyn CachePolicy>>,
    max_size: u64,
    counters: CacheCounters,
    sweeper: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ResultCache {
    pub fn new(storage: Arc<dyn CacheStorage>, max_size_mb: u64) -> Self {
        Self::with_max_size_bytes(storage, max_size_mb * 1024 * 1024)
    }

    pub fn with_max_size_bytes(storage: Arc<dyn CacheStorage>, max_size: u64) -> Self {
        Self {
            storage,
            policies: policy::default_policies(),
            max_size,
            counters: CacheCounters::default(),
            sweeper: std::sync::Mutex::new(None),
        }
    }

    pub fn with_policies(mut self, policies: Vec<Arc<dyn CachePolicy>>) -> Self {
        self.policies = policies;
        self
    }

    /// Cache key for a `(tool, args)` pair: the first policy-specific key
    /// wins, otherwise the default fingerprint over canonical JSON.
    pub fn generate_key(&self, tool_name: &str, arguments: &Value) -> String {
        for policy in &self.policies {
            if policy.applies_to(tool_name)
                && let Some(key) = policy.cache_key(tool_name, arguments)
                && !key.is_empty()
            {
                return key;
            }
        }
        let payload = serde_json::json!({"tool": tool_name, "args": arguments});
        let digest = Sha256::digest(canonical_json(&payload).as_bytes());
        format!("{}_{}", tool_name, hex::encode(digest))
    }

    /// Look up a fresh entry. Marks the returned result as a cache hit and
    /// bumps the entry's access stats off the read path.
    pub async fn get(&self, key: &str) -> Option<StepResult> {
        let entry = match self.storage.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("cache read failed for '{}', treating as miss: {}", key, e);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };
        let Some(entry) = entry else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let now = Utc::now();
        if entry.is_expired(now) {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            let storage = Arc::clone(&self.storage);
            let key = key.to_string();
            tokio::spawn(async move {
                let _ = storage.delete(&key).await;
            });
            return None;
        }

        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        let mut result = entry.result.clone();
        result.cache_hit = true;

        let storage = Arc::clone(&self.storage);
        let mut refreshed = entry;
        tokio::spawn(async move {
            refreshed.accessed_at = now;
            refreshed.hit_count += 1;
            let _ = storage.set(refreshed).await;
        });

        Some(result)
    }

    /// Non-expired presence check that does not touch the hit/miss counters
    /// (used by the planner when estimating cache-warm steps).
    pub async fn contains(&self, key: &str) -> bool {
        match self.storage.get(key).await {
            Ok(Some(entry)) => !entry.is_expired(Utc::now()),
            _ => false,
        }
    }

    /// Store a result if any policy wants it cached.
    pub async fn set(&self, key: &str, tool_name: &str, arguments: &Value, result: &StepResult) {
        let Some(policy) = self
            .policies
            .iter()
            .find(|p| p.applies_to(tool_name) && p.should_cache(tool_name, arguments, result))
        else {
            return;
        };

        let ttl = policy.ttl(tool_name, arguments);
        let data_len = result
            .data
            .as_ref()
            .map(|d| serde_json::to_string(d).map(|s| s.len()).unwrap_or(0))
            .unwrap_or(0);
        let size = result.content.len() as u64 + data_len as u64 + ENTRY_OVERHEAD;

        if let Err(e) = self.ensure_space(size).await {
            warn!("cache eviction failed, dropping write for '{}': {}", key, e);
            return;
        }

        let now = Utc::now();
        let expires_at = now
            + ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::seconds(3600));
        let entry = CacheEntry {
            key: key.to_string(),
            tool_name: tool_name.to_string(),
            arguments: arguments.clone(),
            result: result.clone(),
            created_at: now,
            accessed_at: now,
            expires_at,
            ttl,
            hit_count: 0,
            size,
            tags: policy.tags(tool_name),
        };
        if let Err(e) = self.storage.set(entry).await {
            warn!("cache write failed for '{}': {}", key, e);
        }
    }

    /// Remove every entry whose tool name matches `pattern` or whose tags
    /// contain it. Returns the number of entries removed.
    pub async fn invalidate(&self, pattern: &str) -> u64 {
        let keys = match self.storage.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("cache invalidation scan failed: {}", e);
                return 0;
            }
        };
        let mut removed = 0;
        for key in keys {
            let Ok(Some(entry)) = self.storage.get(&key).await else {
                continue;
            };
            if (entry.tool_name == pattern || entry.tags.contains(pattern))
                && matches!(self.storage.delete(&key).await, Ok(true))
            {
                removed += 1;
            }
        }
        self.counters
            .invalidations
            .fetch_add(removed, Ordering::Relaxed);
        if removed > 0 {
            debug!("cache invalidated {} entries for '{}'", removed, pattern);
        }
        removed
    }

    /// Hook for completed mutating steps: drops entries of every policy that
    /// declares itself invalidated by `tool_name`.
    pub async fn on_write_completed(&self, tool_name: &str) {
        let targets: Vec<String> = self
            .policies
            .iter()
            .filter(|p| p.invalidated_by().contains(&tool_name))
            .map(|p| p.name().to_string())
            .collect();
        for tag in targets {
            self.invalidate(&tag).await;
        }
    }

    /// Evict lowest-value entries until `required` additional bytes fit.
    async fn ensure_space(&self, required: u64) -> anyhow::Result<()> {
        let current = self.storage.size().await?;
        if current + required <= self.max_size {
            return Ok(());
        }

        let now = Utc::now();
        let mut candidates: Vec<(f64, String, u64)> = Vec::new();
        for key in self.storage.keys().await? {
            if let Some(entry) = self.storage.get(&key).await? {
                candidates.push((eviction_score(&entry, now), key, entry.size));
            }
        }
        candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut freed = 0;
        let need = (current + required).saturating_sub(self.max_size);
        for (_, key, size) in candidates {
            if freed >= need {
                break;
            }
            if matches!(self.storage.delete(&key).await, Ok(true)) {
                freed += size;
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Drop every expired entry. Returns the number removed.
    pub async fn sweep_expired(&self) -> u64 {
        let now = Utc::now();
        let Ok(keys) = self.storage.keys().await else {
            return 0;
        };
        let mut removed = 0;
        for key in keys {
            if let Ok(Some(entry)) = self.storage.get(&key).await
                && entry.is_expired(now)
                && matches!(self.storage.delete(&key).await, Ok(true))
            {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!("cache sweep removed {} expired entries", removed);
        }
        removed
    }

    /// Start the periodic expiry sweep. Idempotent.
    pub fn start_sweep(self: &Arc<Self>) {
        let mut guard = self.sweeper.lock().expect("sweeper lock poisoned");
        if guard.is_some() {
            return;
        }
        let cache = Arc::clone(self);
        *guard = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            interval.tick().await; // first tick fires immediately
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

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
        }
    }

    pub async fn clear(&self) {
        if let Err(e) = self.storage.clear().await {
            warn!("cache clear failed: {}", e);
        }
    }
}

/// Higher scores evict first: stale, near-expiry, rarely-hit, large.
fn eviction_score(entry: &CacheEntry, now: DateTime<Utc>) -> f64 {
    let since_access = (now - entry.accessed_at).num_seconds().max(0) as f64;
    let to_expiry = (entry.expires_at - now).num_seconds().max(0) as f64;
    0.4 * since_access
        + 0.3 * (1.0 / (to_expiry + 1.0))
        + 0.2 * (1.0 / (entry.hit_count as f64 + 1.0))
        + 0.1 * (entry.size as f64 / 1_000_000.0)
}

#[cfg(test)]
mod tests;
