use super::*;
use crate::cache::storage::MemoryStorage;
use crate::plan::types::StepResult;
use serde_json::json;

fn cache_with_storage() -> (Arc<ResultCache>, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let cache = Arc::new(ResultCache::new(
        Arc::clone(&storage) as Arc<dyn CacheStorage>,
        10,
    ));
    (cache, storage)
}

fn search_result(content: &str) -> StepResult {
    StepResult::success("s1", "web_search", content.to_string())
}

fn raw_entry(key: &str, size: u64, expires_at: DateTime<Utc>, accessed_at: DateTime<Utc>) -> CacheEntry {
    let now = Utc::now();
    CacheEntry {
        key: key.to_string(),
        tool_name: "web_search".to_string(),
        arguments: json!({"query": key}),
        result: search_result("cached"),
        created_at: now,
        accessed_at,
        expires_at,
        ttl: Duration::from_secs(3600),
        hit_count: 0,
        size,
        tags: HashSet::new(),
    }
}

#[tokio::test]
async fn set_then_get_round_trip() {
    let (cache, _storage) = cache_with_storage();
    let args = json!({"query": "rust"});
    let key = cache.generate_key("web_search", &args);
    cache
        .set(&key, "web_search", &args, &search_result("found things"))
        .await;

    let hit = cache.get(&key).await.expect("expected cache hit");
    assert!(hit.cache_hit);
    assert_eq!(hit.content, "found things");
    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 0);
}

#[tokio::test]
async fn miss_increments_counter() {
    let (cache, _storage) = cache_with_storage();
    assert!(cache.get("absent").await.is_none());
    assert_eq!(cache.stats().misses, 1);
}

#[tokio::test]
async fn generate_key_is_order_insensitive() {
    let (cache, _storage) = cache_with_storage();
    let a = cache.generate_key("web_search", &json!({"query": "x", "count": 5}));
    let b = cache.generate_key("web_search", &json!({"count": 5, "query": "x"}));
    assert_eq!(a, b);
    assert!(a.starts_with("web_search_"));

    let c = cache.generate_key("web_search", &json!({"query": "y", "count": 5}));
    assert_ne!(a, c);
}

#[tokio::test]
async fn expired_entry_reads_as_miss() {
    let (cache, storage) = cache_with_storage();
    let past = Utc::now() - chrono::Duration::minutes(5);
    storage
        .set(raw_entry("stale", 600, past, past))
        .await
        .unwrap();

    assert!(cache.get("stale").await.is_none());
    assert_eq!(cache.stats().misses, 1);
    assert_eq!(cache.stats().hits, 0);
}

#[tokio::test]
async fn policy_rejects_unworthy_results() {
    let (cache, storage) = cache_with_storage();
    let args = json!({"query": "x"});
    // Failures are never cached
    cache
        .set(
            "k",
            "web_search",
            &args,
            &StepResult::failure("s1", "web_search", "boom".to_string()),
        )
        .await;
    assert_eq!(storage.keys().await.unwrap().len(), 0);

    // Tools without a policy are not cached
    cache.set("k2", "exec", &json!({}), &search_result("out")).await;
    assert_eq!(storage.keys().await.unwrap().len(), 0);
}

#[tokio::test]
async fn invalidate_by_tag_round_trip() {
    let (cache, _storage) = cache_with_storage();
    let args = json!({"query": "x"});
    let key = cache.generate_key("memory_search", &args);
    let result = StepResult::success("s1", "memory_search", "remembered".to_string());
    cache.set(&key, "memory_search", &args, &result).await;
    assert!(cache.get(&key).await.is_some());

    let removed = cache.invalidate("memory_search_results").await;
    assert_eq!(removed, 1);
    assert!(cache.get(&key).await.is_none());
    assert_eq!(cache.stats().invalidations, 1);

    // Re-set and invalidate by tool name instead of tag
    cache.set(&key, "memory_search", &args, &result).await;
    assert_eq!(cache.invalidate("memory_search").await, 1);
}

#[tokio::test]
async fn write_completion_drops_memory_entries() {
    let (cache, _storage) = cache_with_storage();
    let args = json!({"query": "x"});
    let key = cache.generate_key("memory_search", &args);
    cache
        .set(
            &key,
            "memory_search",
            &args,
            &StepResult::success("s1", "memory_search", "remembered".to_string()),
        )
        .await;

    // Unrelated tool completes: entries stay
    cache.on_write_completed("message").await;
    assert!(cache.get(&key).await.is_some());

    // A write completes: memory results are dropped
    cache.on_write_completed("write_file").await;
    assert!(cache.get(&key).await.is_none());
}

#[tokio::test]
async fn eviction_removes_oldest_accessed_first() {
    let storage = Arc::new(MemoryStorage::new());
    let cache = ResultCache::with_max_size_bytes(
        Arc::clone(&storage) as Arc<dyn CacheStorage>,
        2000,
    );

    let now = Utc::now();
    let expires = now + chrono::Duration::hours(1);
    // Oldest access first: "old" was touched an hour ago, "fresh" just now.
    storage
        .set(raw_entry("old", 900, expires, now - chrono::Duration::hours(1)))
        .await
        .unwrap();
    storage
        .set(raw_entry("fresh", 900, expires, now))
        .await
        .unwrap();

    // Writing ~800 more bytes overflows the 2000-byte budget.
    let args = json!({"query": "new"});
    let key = cache.generate_key("web_search", &args);
    cache
        .set(&key, "web_search", &args, &search_result(&"x".repeat(300)))
        .await;

    assert!(storage.get("old").await.unwrap().is_none(), "oldest-accessed entry should be evicted");
    assert!(storage.get("fresh").await.unwrap().is_some());
    assert_eq!(cache.stats().evictions, 1);
}

#[tokio::test]
async fn sweep_removes_expired_entries() {
    let (cache, storage) = cache_with_storage();
    let now = Utc::now();
    storage
        .set(raw_entry("dead", 600, now - chrono::Duration::minutes(1), now))
        .await
        .unwrap();
    storage
        .set(raw_entry("alive", 600, now + chrono::Duration::hours(1), now))
        .await
        .unwrap();

    assert_eq!(cache.sweep_expired().await, 1);
    assert!(storage.get("dead").await.unwrap().is_none());
    assert!(storage.get("alive").await.unwrap().is_some());
}

#[tokio::test]
async fn sweep_task_starts_and_stops() {
    let (cache, _storage) = cache_with_storage();
    cache.start_sweep();
    cache.start_sweep(); // idempotent
    cache.close();
}

#[tokio::test]
async fn hit_bumps_access_stats() {
    let (cache, storage) = cache_with_storage();
    let args = json!({"query": "x"});
    let key = cache.generate_key("web_search", &args);
    cache
        .set(&key, "web_search", &args, &search_result("found"))
        .await;

    cache.get(&key).await.unwrap();
    // The access bump is spawned off the read path; give it a beat.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let entry = storage.get(&key).await.unwrap().unwrap();
    assert_eq!(entry.hit_count, 1);
}
