use crate::config::SearchConfig;
use crate::errors::ShuntError;
use crate::search::anthropic::AnthropicSearch;
use crate::search::cache::SearchCache;
use crate::search::strategy::SearchStrategy;
use crate::search::types::{ProviderStats, SearchError, SearchParameters, SearchResponse};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Routes search requests to a provider strategy based on the active model,
/// walks the fallback chain on failure, and keeps per-provider telemetry.
pub struct SearchRouter {
    strategies: RwLock<HashMap<String, Arc<dyn SearchStrategy>>>,
    stats: RwLock<HashMap<String, ProviderStats>>,
    current_model: RwLock<String>,
    cache: Option<Arc<SearchCache>>,
    config: SearchConfig,
}

impl SearchRouter {
    pub fn new(config: SearchConfig) -> Self {
        let cache = config
            .cache_enabled
            .then(|| Arc::new(SearchCache::new(config.cache_ttl(), true)));
        Self {
            strategies: RwLock::new(HashMap::new()),
            stats: RwLock::new(HashMap::new()),
            current_model: RwLock::new(String::new()),
            cache,
            config,
        }
    }

    /// Start the cache's periodic expiry sweep. Call once a runtime is up.
    pub fn start_background_sweep(&self) {
        if let Some(cache) = &self.cache {
            cache.start_sweep();
        }
    }

    pub async fn register_strategy(&self, strategy: Arc<dyn SearchStrategy>) {
        let name = strategy.name().to_string();
        self.strategies.write().await.insert(name, strategy);
    }

    pub async fn set_model(&self, model: impl Into<String>) {
        *self.current_model.write().await = model.into();
    }

    /// Choose a provider for a model string: anything Claude-shaped prefers
    /// the anthropic strategy when it is registered and available.
    async fn select_provider(&self, model: &str) -> String {
        let lower = model.to_lowercase();
        let claude_shaped = lower.starts_with("anthropic/")
            || lower.starts_with("claude-")
            || lower.contains("claude");
        if claude_shaped {
            let strategies = self.strategies.read().await;
            if strategies
                .get("anthropic")
                .is_some_and(|s| s.is_available())
            {
                return "anthropic".to_string();
            }
        }
        "brave".to_string()
    }

    /// Provider order to try for a selected primary.
    async fn fallback_chain(&self, primary: &str) -> Vec<String> {
        let strategies = self.strategies.read().await;
        let has_brave = strategies.contains_key("brave");
        let mut chain = Vec::new();
        match primary {
            "anthropic" => {
                chain.push("anthropic".to_string());
                if self.config.enable_fallback && has_brave {
                    chain.push("brave".to_string());
                }
            }
            "brave" => chain.push("brave".to_string()),
            _ => {
                if has_brave {
                    chain.push("brave".to_string());
                }
            }
        }
        chain
    }

    /// Route one search: validate, probe the shared cache, then walk the
    /// chain until a provider succeeds. The response is annotated with the
    /// provider that actually served it.
    pub async fn search(&self, params: &SearchParameters) -> Result<SearchResponse, SearchError> {
        let mut normalized = params.clone();
        normalized.validate()?;

        if let Some(cache) = &self.cache
            && let Some(cached) = cache.get(&normalized).await
        {
            debug!("search cache hit for '{}'", normalized.query);
            return Ok(cached);
        }

        let model = self.current_model.read().await.clone();
        let primary = self.select_provider(&model).await;
        let chain = self.fallback_chain(&primary).await;

        let mut last_attempted: Option<(String, String)> = None;
        for name in &chain {
            let strategy = {
                let strategies = self.strategies.read().await;
                strategies.get(name).cloned()
            };
            let Some(strategy) = strategy else {
                continue;
            };
            if !strategy.is_available() {
                debug!("skipping unavailable search provider '{}'", name);
                continue;
            }

            self.record_request(name).await;
            let started = Instant::now();
            match strategy.search(&normalized).await {
                Ok(mut response) => {
                    response.provider = name.clone();
                    self.record_success(name, started.elapsed()).await;
                    if let Some(cache) = &self.cache {
                        cache.put(&normalized, &response).await;
                    }
                    return Ok(response);
                }
                Err(e) => {
                    warn!("search provider '{}' failed: {}", name, e);
                    self.record_failure(name, &e).await;
                    last_attempted = Some((name.clone(), e.to_string()));
                }
            }
        }

        let (provider, message) = last_attempted.unwrap_or_else(|| {
            (
                primary,
                "no registered search provider is available".to_string(),
            )
        });
        Err(SearchError::AllProvidersFailed { provider, message })
    }

    /// Rebind a provider's API key at runtime. The anthropic strategy is
    /// constructed on the fly when it is not registered yet; Brave keys are
    /// immutable after construction.
    pub async fn set_api_key(&self, provider: &str, key: &str) -> Result<(), ShuntError> {
        {
            let strategies = self.strategies.read().await;
            if let Some(strategy) = strategies.get(provider)
                && strategy.set_api_key(key)
            {
                return Ok(());
            }
        }
        if provider == "anthropic" {
            let mut provider_config = self.config.provider("anthropic");
            provider_config.api_key = key.to_string();
            let strategy = AnthropicSearch::from_config(&provider_config);
            self.register_strategy(Arc::new(strategy)).await;
            return Ok(());
        }
        Err(ShuntError::Config(format!(
            "provider '{}' does not accept runtime API keys",
            provider
        )))
    }

    async fn record_request(&self, provider: &str) {
        let mut stats = self.stats.write().await;
        stats.entry(provider.to_string()).or_default().request_count += 1;
    }

    async fn record_success(&self, provider: &str, latency: std::time::Duration) {
        let mut stats = self.stats.write().await;
        let entry = stats.entry(provider.to_string()).or_default();
        entry.success_count += 1;
        entry.total_latency += latency;
        entry.average_latency = entry.total_latency / entry.success_count as u32;
        entry.last_used = Some(Utc::now());
    }

    async fn record_failure(&self, provider: &str, error: &SearchError) {
        let mut stats = self.stats.write().await;
        let entry = stats.entry(provider.to_string()).or_default();
        entry.failure_count += 1;
        entry.last_error = Some(error.to_string());
    }

    /// Deep-copied per-provider telemetry.
    pub async fn metrics(&self) -> HashMap<String, ProviderStats> {
        self.stats.read().await.clone()
    }

    pub async fn provider_stats(&self, provider: &str) -> Option<ProviderStats> {
        self.stats.read().await.get(provider).cloned()
    }

    /// Stop background work (the cache sweep).
    pub fn close(&self) {
        if let Some(cache) = &self.cache {
            cache.close();
        }
    }
}

#[cfg(test)]
mod tests;
