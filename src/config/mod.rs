use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::plan::types::Strategy;

fn default_true() -> bool {
    true
}

/// Planning and execution configuration for the tool dispatch core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Global cap on simultaneous tool executions.
    #[serde(default = "default_max_parallel", rename = "maxParallel")]
    pub max_parallel: usize,
    #[serde(default, rename = "defaultStrategy")]
    pub default_strategy: Strategy,
    #[serde(default = "default_true", rename = "cacheEnabled")]
    pub cache_enabled: bool,
    #[serde(default = "default_cache_max_size_mb", rename = "cacheMaxSizeMb")]
    pub cache_max_size_mb: u64,
    #[serde(default = "default_true", rename = "metricsEnabled")]
    pub metrics_enabled: bool,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default = "default_planning_timeout", rename = "planningTimeoutSecs")]
    pub planning_timeout_secs: u64,
    #[serde(default = "default_execution_timeout", rename = "executionTimeoutSecs")]
    pub execution_timeout_secs: u64,
    /// Batches smaller than this run sequentially without a plan.
    #[serde(default = "default_optimization_threshold", rename = "optimizationThreshold")]
    pub optimization_threshold: usize,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_parallel: default_max_parallel(),
            default_strategy: Strategy::default(),
            cache_enabled: true,
            cache_max_size_mb: default_cache_max_size_mb(),
            metrics_enabled: true,
            retry: RetryConfig::default(),
            planning_timeout_secs: default_planning_timeout(),
            execution_timeout_secs: default_execution_timeout(),
            optimization_threshold: default_optimization_threshold(),
        }
    }
}

impl PlanningConfig {
    pub fn planning_timeout(&self) -> Duration {
        Duration::from_secs(self.planning_timeout_secs)
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }
}

fn default_max_parallel() -> usize {
    4
}

fn default_cache_max_size_mb() -> u64 {
    50
}

fn default_planning_timeout() -> u64 {
    30
}

fn default_execution_timeout() -> u64 {
    600
}

fn default_optimization_threshold() -> usize {
    2
}

/// How inter-attempt delays grow across retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    #[default]
    Exponential,
    Linear,
    Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries", rename = "maxRetries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms", rename = "baseDelayMs")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms", rename = "maxDelayMs")]
    pub max_delay_ms: u64,
    #[serde(default, rename = "backoffStrategy")]
    pub backoff_strategy: BackoffStrategy,
    /// Error substrings considered retryable. Empty means the built-in set.
    #[serde(default, rename = "retryableErrors")]
    pub retryable_errors: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_strategy: BackoffStrategy::default(),
            retryable_errors: Vec::new(),
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

/// Search routing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_search_provider", rename = "defaultProvider")]
    pub default_provider: String,
    #[serde(default = "default_cache_ttl_minutes", rename = "cacheTtlMinutes")]
    pub cache_ttl_minutes: u64,
    #[serde(default = "default_true", rename = "cacheEnabled")]
    pub cache_enabled: bool,
    #[serde(default = "default_true", rename = "enableFallback")]
    pub enable_fallback: bool,
    #[serde(default = "default_fallback_timeout", rename = "fallbackTimeoutSecs")]
    pub fallback_timeout_secs: u64,
    #[serde(default = "default_true", rename = "metricsEnabled")]
    pub metrics_enabled: bool,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_provider: default_search_provider(),
            cache_ttl_minutes: default_cache_ttl_minutes(),
            cache_enabled: true,
            enable_fallback: true,
            fallback_timeout_secs: default_fallback_timeout(),
            metrics_enabled: true,
            providers: HashMap::new(),
        }
    }
}

impl SearchConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_minutes * 60)
    }

    pub fn provider(&self, name: &str) -> ProviderConfig {
        self.providers.get(name).cloned().unwrap_or_default()
    }
}

fn default_search_provider() -> String {
    "brave".to_string()
}

fn default_cache_ttl_minutes() -> u64 {
    15
}

fn default_fallback_timeout() -> u64 {
    10
}

/// Per-provider search backend configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, rename = "apiKey")]
    pub api_key: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_provider_timeout", rename = "timeoutSecs")]
    pub timeout_secs: u64,
    #[serde(default = "default_provider_retries", rename = "maxRetries")]
    pub max_retries: u32,
    #[serde(default = "default_results", rename = "defaultResults")]
    pub default_results: u32,
    #[serde(default = "default_max_results", rename = "maxResults")]
    pub max_results: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
            endpoint: String::new(),
            timeout_secs: default_provider_timeout(),
            max_retries: default_provider_retries(),
            default_results: default_results(),
            max_results: default_max_results(),
        }
    }
}

// api_key never appears in logs.
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("enabled", &self.enabled)
            .field("api_key", &"***")
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("default_results", &self.default_results)
            .field("max_results", &self.max_results)
            .finish()
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_provider_timeout() -> u64 {
    10
}

fn default_provider_retries() -> u32 {
    2
}

fn default_results() -> u32 {
    5
}

fn default_max_results() -> u32 {
    10
}

#[cfg(test)]
mod tests;
