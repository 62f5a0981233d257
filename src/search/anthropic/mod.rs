use crate::config::ProviderConfig;
use crate::search::strategy::{SearchStrategy, map_status, validate_parameters};
use crate::search::types::{
    SearchError, SearchParameters, SearchResponse, SearchResult, StrategyCapabilities,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::sync::RwLock;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";

const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
const SEARCH_TOOL_TYPE: &str = "web_search_20250305";
const MAX_TOKENS: u32 = 1024;

/// Adapter over the upstream model's server-side web search tool. The key is
/// rebindable at runtime (OAuth-derived keys rotate).
pub struct AnthropicSearch {
    client: Client,
    api_key: RwLock<String>,
    endpoint: String,
    model: String,
    timeout: Duration,
    default_results: u32,
    max_results: u32,
    enabled: bool,
}

impl AnthropicSearch {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            client: crate::utils::http::default_http_client(),
            api_key: RwLock::new(config.api_key.clone()),
            endpoint: if config.endpoint.is_empty() {
                DEFAULT_ENDPOINT.to_string()
            } else {
                config.endpoint.clone()
            },
            model: DEFAULT_MODEL.to_string(),
            timeout: config.timeout(),
            default_results: config.default_results,
            max_results: config.max_results,
            enabled: config.enabled,
        }
    }

    fn request_body(&self, params: &SearchParameters) -> Value {
        json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{
                "role": "user",
                "content": format!("Search the web for: {}", params.query),
            }],
            "tools": [{
                "type": SEARCH_TOOL_TYPE,
                "name": "web_search",
                "max_uses": 1,
            }],
        })
    }
}

/// Pull results out of a messages response: structured search-tool blocks
/// when present, otherwise a line-oriented scrape of the text blocks.
fn extract_results(body: &Value, limit: usize) -> Vec<SearchResult> {
    let mut results = Vec::new();
    let Some(blocks) = body["content"].as_array() else {
        return results;
    };

    for block in blocks {
        if block["type"] == "web_search_tool_result"
            && let Some(items) = block["content"].as_array()
        {
            for item in items {
                if item["type"] == "web_search_result" {
                    results.push(SearchResult {
                        title: item["title"].as_str().unwrap_or_default().to_string(),
                        url: item["url"].as_str().unwrap_or_default().to_string(),
                        description: item["description"].as_str().unwrap_or_default().to_string(),
                        published: item["page_age"].as_str().map(String::from),
                        thumbnail: None,
                    });
                }
            }
        }
    }

    if results.is_empty() {
        for block in blocks {
            if block["type"] == "text"
                && let Some(text) = block["text"].as_str()
            {
                results.extend(results_from_text(text));
            }
        }
    }

    results.truncate(limit);
    results
}

/// Opaque text→results extraction: each line mentioning a URL becomes one
/// result, with whatever precedes the URL as its title.
fn results_from_text(text: &str) -> Vec<SearchResult> {
    text.lines()
        .filter_map(|line| {
            let start = line.find("http://").or_else(|| line.find("https://"))?;
            let url: String = line[start..]
                .split_whitespace()
                .next()?
                .trim_end_matches([')', ']', ',', '.'])
                .to_string();
            let title = line[..start]
                .trim()
                .trim_end_matches(['-', ':', '(', '['])
                .trim()
                .to_string();
            Some(SearchResult {
                title,
                url,
                description: String::new(),
                published: None,
                thumbnail: None,
            })
        })
        .collect()
}

#[async_trait]
impl SearchStrategy for AnthropicSearch {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn is_available(&self) -> bool {
        self.enabled && !self.api_key.read().expect("api key lock poisoned").is_empty()
    }

    fn capabilities(&self) -> StrategyCapabilities {
        StrategyCapabilities {
            supports_country: false,
            supports_language: false,
            supports_freshness: false,
            max_results: self.max_results,
            default_results: self.default_results,
            has_caching: true,
            requires_api_key: true,
        }
    }

    async fn search(&self, params: &SearchParameters) -> Result<SearchResponse, SearchError> {
        let params = validate_parameters(params, &self.capabilities())?;
        let api_key = self.api_key.read().expect("api key lock poisoned").clone();

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .timeout(self.timeout)
            .json(&self.request_body(&params))
            .send()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status("anthropic", status, &body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchError::Network(format!("malformed response body: {}", e)))?;
        let results = extract_results(&body, params.count as usize);
        Ok(SearchResponse::new(&params.query, "anthropic", results))
    }

    fn set_api_key(&self, key: &str) -> bool {
        *self.api_key.write().expect("api key lock poisoned") = key.to_string();
        true
    }
}

#[cfg(test)]
mod tests;
