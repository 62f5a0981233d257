use super::*;
use crate::plan::types::Strategy;

#[test]
fn planning_defaults() {
    let config = PlanningConfig::default();
    assert!(config.enabled);
    assert_eq!(config.max_parallel, 4);
    assert_eq!(config.default_strategy, Strategy::Balanced);
    assert_eq!(config.optimization_threshold, 2);
    assert_eq!(config.planning_timeout(), Duration::from_secs(30));
    assert_eq!(config.execution_timeout(), Duration::from_secs(600));
}

#[test]
fn planning_deserializes_camel_case() {
    let config: PlanningConfig = serde_json::from_str(
        r#"{
            "maxParallel": 8,
            "defaultStrategy": "speed",
            "cacheEnabled": false,
            "optimizationThreshold": 5,
            "retry": {"maxRetries": 1, "backoffStrategy": "linear"}
        }"#,
    )
    .unwrap();
    assert_eq!(config.max_parallel, 8);
    assert_eq!(config.default_strategy, Strategy::Speed);
    assert!(!config.cache_enabled);
    assert_eq!(config.optimization_threshold, 5);
    assert_eq!(config.retry.max_retries, 1);
    assert_eq!(config.retry.backoff_strategy, BackoffStrategy::Linear);
}

#[test]
fn retry_defaults() {
    let retry = RetryConfig::default();
    assert_eq!(retry.max_retries, 3);
    assert_eq!(retry.base_delay(), Duration::from_millis(500));
    assert_eq!(retry.max_delay(), Duration::from_secs(10));
    assert_eq!(retry.backoff_strategy, BackoffStrategy::Exponential);
    assert!(retry.retryable_errors.is_empty());
}

#[test]
fn search_defaults() {
    let config = SearchConfig::default();
    assert_eq!(config.default_provider, "brave");
    assert_eq!(config.cache_ttl(), Duration::from_secs(15 * 60));
    assert!(config.enable_fallback);
}

#[test]
fn search_deserializes_providers() {
    let config: SearchConfig = serde_json::from_str(
        r#"{
            "defaultProvider": "anthropic",
            "cacheTtlMinutes": 30,
            "providers": {
                "brave": {"apiKey": "k", "maxResults": 7}
            }
        }"#,
    )
    .unwrap();
    assert_eq!(config.default_provider, "anthropic");
    assert_eq!(config.cache_ttl(), Duration::from_secs(30 * 60));
    let brave = config.provider("brave");
    assert_eq!(brave.api_key, "k");
    assert_eq!(brave.max_results, 7);
    assert_eq!(brave.default_results, 5);
}

#[test]
fn unknown_provider_falls_back_to_defaults() {
    let config = SearchConfig::default();
    let p = config.provider("missing");
    assert!(p.enabled);
    assert!(p.api_key.is_empty());
    assert_eq!(p.timeout(), Duration::from_secs(10));
}

#[test]
fn provider_debug_redacts_api_key() {
    let p = ProviderConfig {
        api_key: "secret-token".to_string(),
        ..ProviderConfig::default()
    };
    let debug = format!("{:?}", p);
    assert!(!debug.contains("secret-token"));
    assert!(debug.contains("***"));
}
