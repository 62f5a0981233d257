use crate::search::types::{
    SearchError, SearchParameters, SearchResponse, StrategyCapabilities,
};
use async_trait::async_trait;

/// Uniform contract every search provider adapter implements.
#[async_trait]
pub trait SearchStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the strategy is currently usable (configured, keyed, enabled).
    fn is_available(&self) -> bool;

    fn capabilities(&self) -> StrategyCapabilities;

    async fn search(&self, params: &SearchParameters) -> Result<SearchResponse, SearchError>;

    /// Rebind the API key at runtime. Returns false for strategies whose key
    /// is immutable after construction.
    fn set_api_key(&self, _key: &str) -> bool {
        false
    }
}

/// Shared validation: returns a normalized copy of the parameters with the
/// count clamped to the strategy's maximum.
pub fn validate_parameters(
    params: &SearchParameters,
    capabilities: &StrategyCapabilities,
) -> Result<SearchParameters, SearchError> {
    let mut normalized = params.clone();
    normalized.validate()?;
    if normalized.count > capabilities.max_results {
        normalized.count = capabilities.default_results;
    }
    Ok(normalized)
}

/// Map an upstream HTTP status to the shared error taxonomy.
pub fn map_status(provider: &str, status: u16, body: &str) -> SearchError {
    match status {
        401 | 403 => SearchError::Unauthorized,
        402 => SearchError::QuotaExceeded,
        429 => SearchError::RateLimited,
        500 | 502 | 503 => SearchError::ServerError(status),
        _ => SearchError::Unexpected {
            provider: provider.to_string(),
            status,
            body: body.chars().take(200).collect(),
        },
    }
}
