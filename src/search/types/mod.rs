use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Accepted freshness windows: any-time, past day/week/month/year.
pub const VALID_FRESHNESS: &[&str] = &["", "pd", "pw", "pm", "py"];

const DEFAULT_COUNT: u32 = 5;
const MAX_COUNT: u32 = 10;

/// Normalized search request shared by every provider strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParameters {
    pub query: String,
    pub count: u32,
    pub country: String,
    pub search_lang: String,
    pub ui_lang: String,
    pub freshness: String,
}

impl Default for SearchParameters {
    fn default() -> Self {
        Self {
            query: String::new(),
            count: DEFAULT_COUNT,
            country: String::new(),
            search_lang: String::new(),
            ui_lang: String::new(),
            freshness: String::new(),
        }
    }
}

impl SearchParameters {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Validate and normalize in place: empty queries and unknown freshness
    /// values are errors, out-of-range counts silently reset to the default.
    pub fn validate(&mut self) -> Result<(), SearchError> {
        if self.query.trim().is_empty() {
            return Err(SearchError::InvalidQuery);
        }
        if !(1..=MAX_COUNT).contains(&self.count) {
            self.count = DEFAULT_COUNT;
        }
        if !VALID_FRESHNESS.contains(&self.freshness.as_str()) {
            return Err(SearchError::InvalidFreshness(self.freshness.clone()));
        }
        Ok(())
    }

    /// Canonical field map used for cache fingerprinting.
    pub fn fingerprint_fields(&self) -> Value {
        serde_json::json!({
            "query": self.query,
            "count": self.count,
            "country": self.country,
            "search_lang": self.search_lang,
            "ui_lang": self.ui_lang,
            "freshness": self.freshness,
        })
    }
}

/// One search hit.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

/// Provider-agnostic response. `provider` names whoever actually served it.
#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub query: String,
    pub total: usize,
    pub provider: String,
    pub cached: bool,
    pub timestamp: DateTime<Utc>,
    pub metadata: HashMap<String, Value>,
}

impl SearchResponse {
    pub fn new(query: impl Into<String>, provider: impl Into<String>, results: Vec<SearchResult>) -> Self {
        Self {
            total: results.len(),
            results,
            query: query.into(),
            provider: provider.into(),
            cached: false,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }
}

/// What one provider strategy can do.
#[derive(Debug, Clone, Copy)]
pub struct StrategyCapabilities {
    pub supports_country: bool,
    pub supports_language: bool,
    pub supports_freshness: bool,
    pub max_results: u32,
    pub default_results: u32,
    pub has_caching: bool,
    pub requires_api_key: bool,
}

/// Per-provider request telemetry.
#[derive(Debug, Clone, Default)]
pub struct ProviderStats {
    pub request_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub total_latency: Duration,
    pub average_latency: Duration,
    pub last_used: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid query: query must not be empty")]
    InvalidQuery,

    #[error("invalid freshness '{0}': expected one of pd, pw, pm, py")]
    InvalidFreshness(String),

    #[error("search provider rejected the API key (401)")]
    Unauthorized,

    #[error("search quota exceeded (402)")]
    QuotaExceeded,

    #[error("search rate limited (429)")]
    RateLimited,

    #[error("search provider server error ({0})")]
    ServerError(u16),

    #[error("search request failed: {0}")]
    Network(String),

    #[error("provider '{provider}' returned unexpected status {status}: {body}")]
    Unexpected {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("provider '{0}' is not available")]
    Unavailable(String),

    #[error("all search providers failed; last provider '{provider}': {message}")]
    AllProvidersFailed { provider: String, message: String },
}

impl SearchError {
    /// Transient failures worth retrying or falling through to the next
    /// provider without recording a configuration problem.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SearchError::RateLimited | SearchError::ServerError(_) | SearchError::Network(_)
        )
    }
}
