use super::CacheEntry;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Abstract cache backend. The in-memory implementation is the default;
/// a persistent backend can be substituted without touching the cache.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<CacheEntry>>;
    async fn set(&self, entry: CacheEntry) -> anyhow::Result<()>;
    /// Returns true when the key was present.
    async fn delete(&self, key: &str) -> anyhow::Result<bool>;
    async fn clear(&self) -> anyhow::Result<()>;
    async fn keys(&self) -> anyhow::Result<Vec<String>>;
    /// Total stored bytes.
    async fn size(&self) -> anyhow::Result<u64>;
}

/// Default process-memory backend.
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn get(&self, key: &str) -> anyhow::Result<Option<CacheEntry>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, entry: CacheEntry) -> anyhow::Result<()> {
        self.entries.write().await.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }

    async fn keys(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn size(&self) -> anyhow::Result<u64> {
        Ok(self.entries.read().await.values().map(|e| e.size).sum())
    }
}
