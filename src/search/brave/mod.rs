use crate::config::ProviderConfig;
use crate::search::strategy::{SearchStrategy, map_status, validate_parameters};
use crate::search::types::{
    SearchError, SearchParameters, SearchResponse, SearchResult, StrategyCapabilities,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";

const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Direct Brave Search API adapter. The key is fixed at construction time.
pub struct BraveSearch {
    client: Client,
    api_key: String,
    endpoint: String,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
    default_results: u32,
    max_results: u32,
    enabled: bool,
}

impl BraveSearch {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            client: crate::utils::http::default_http_client(),
            api_key: config.api_key.clone(),
            endpoint: if config.endpoint.is_empty() {
                DEFAULT_ENDPOINT.to_string()
            } else {
                config.endpoint.clone()
            },
            timeout: config.timeout(),
            max_retries: config.max_retries,
            retry_delay: DEFAULT_RETRY_DELAY,
            default_results: config.default_results,
            max_results: config.max_results,
            enabled: config.enabled,
        }
    }

    #[cfg(test)]
    fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// One GET against the Brave endpoint. Gzip responses are decompressed
    /// transparently by the client.
    async fn execute(&self, params: &SearchParameters) -> Result<SearchResponse, SearchError> {
        let count = params.count.to_string();
        let mut request = self
            .client
            .get(&self.endpoint)
            .query(&[("q", params.query.as_str()), ("count", count.as_str())])
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .timeout(self.timeout);
        if !params.country.is_empty() {
            request = request.query(&[("country", params.country.as_str())]);
        }
        if !params.search_lang.is_empty() {
            request = request.query(&[("search_lang", params.search_lang.as_str())]);
        }
        if !params.ui_lang.is_empty() {
            request = request.query(&[("ui_lang", params.ui_lang.as_str())]);
        }
        if !params.freshness.is_empty() {
            request = request.query(&[("freshness", params.freshness.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status("brave", status, &body));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| SearchError::Network(format!("malformed response body: {}", e)))?;
        Ok(parse_response(&json, params))
    }
}

fn parse_response(json: &Value, params: &SearchParameters) -> SearchResponse {
    let results: Vec<SearchResult> = json["web"]["results"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .take(params.count as usize)
                .map(|item| SearchResult {
                    title: item["title"].as_str().unwrap_or_default().to_string(),
                    url: item["url"].as_str().unwrap_or_default().to_string(),
                    description: item["description"].as_str().unwrap_or_default().to_string(),
                    published: item["published"]
                        .as_str()
                        .or_else(|| item["page_age"].as_str())
                        .map(String::from),
                    thumbnail: item["thumbnail"]["src"].as_str().map(String::from),
                })
                .collect()
        })
        .unwrap_or_default();

    let mut response = SearchResponse::new(&params.query, "brave", results);
    if let Some(altered) = json["query"]["altered"].as_str() {
        response
            .metadata
            .insert("altered_query".to_string(), Value::from(altered));
    }
    response
}

#[async_trait]
impl SearchStrategy for BraveSearch {
    fn name(&self) -> &str {
        "brave"
    }

    fn is_available(&self) -> bool {
        self.enabled && !self.api_key.is_empty()
    }

    fn capabilities(&self) -> StrategyCapabilities {
        StrategyCapabilities {
            supports_country: true,
            supports_language: true,
            supports_freshness: true,
            max_results: self.max_results,
            default_results: self.default_results,
            has_caching: true,
            requires_api_key: true,
        }
    }

    /// Retries transient failures only, waiting `retry_delay * attempt`
    /// between tries.
    async fn search(&self, params: &SearchParameters) -> Result<SearchResponse, SearchError> {
        let params = validate_parameters(params, &self.capabilities())?;
        let mut attempt = 0;
        loop {
            match self.execute(&params).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "brave search attempt {} failed, retrying: {}",
                        attempt, e
                    );
                    tokio::time::sleep(self.retry_delay * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
