use super::*;
use crate::search::types::{SearchResult, StrategyCapabilities};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Scripted strategy: fails the first `fail_first` calls, then succeeds.
struct FakeStrategy {
    name: String,
    available: AtomicBool,
    fail_first: usize,
    calls: AtomicUsize,
}

impl FakeStrategy {
    fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            available: AtomicBool::new(true),
            fail_first: 0,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(name: &str, fail_first: usize) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            available: AtomicBool::new(true),
            fail_first,
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchStrategy for FakeStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn capabilities(&self) -> StrategyCapabilities {
        StrategyCapabilities {
            supports_country: false,
            supports_language: false,
            supports_freshness: false,
            max_results: 10,
            default_results: 5,
            has_caching: false,
            requires_api_key: false,
        }
    }

    async fn search(&self, params: &SearchParameters) -> Result<SearchResponse, SearchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            return Err(SearchError::ServerError(503));
        }
        Ok(SearchResponse::new(
            &params.query,
            &self.name,
            vec![SearchResult {
                title: format!("{} result", self.name),
                url: "https://example.com".to_string(),
                description: String::new(),
                published: None,
                thumbnail: None,
            }],
        ))
    }
}

fn router() -> SearchRouter {
    SearchRouter::new(SearchConfig::default())
}

fn uncached_router() -> SearchRouter {
    let config = SearchConfig {
        cache_enabled: false,
        ..SearchConfig::default()
    };
    SearchRouter::new(config)
}

#[tokio::test]
async fn claude_models_prefer_anthropic() {
    let router = router();
    router.register_strategy(FakeStrategy::new("brave")).await;
    router.register_strategy(FakeStrategy::new("anthropic")).await;

    for model in ["anthropic/claude-3", "claude-sonnet-4", "some-claude-variant"] {
        router.set_model(model).await;
        let response = router.search(&SearchParameters::new(model)).await.unwrap();
        assert_eq!(response.provider, "anthropic", "model {}", model);
    }
}

#[tokio::test]
async fn non_claude_models_use_brave() {
    let router = uncached_router();
    router.register_strategy(FakeStrategy::new("brave")).await;
    router.register_strategy(FakeStrategy::new("anthropic")).await;

    for model in ["gpt-4o", "gemini-2.0-flash", ""] {
        router.set_model(model).await;
        let response = router.search(&SearchParameters::new("q")).await.unwrap();
        assert_eq!(response.provider, "brave", "model {}", model);
    }
}

#[tokio::test]
async fn unavailable_anthropic_falls_through_to_brave() {
    let router = uncached_router();
    router.register_strategy(FakeStrategy::new("brave")).await;
    let anthropic = FakeStrategy::new("anthropic");
    anthropic.available.store(false, Ordering::SeqCst);
    router.register_strategy(anthropic).await;

    router.set_model("claude-3-opus").await;
    let response = router.search(&SearchParameters::new("q")).await.unwrap();
    assert_eq!(response.provider, "brave");
}

#[tokio::test]
async fn failed_primary_falls_back_and_records_stats() {
    let router = uncached_router();
    let anthropic = FakeStrategy::failing("anthropic", usize::MAX);
    let brave = FakeStrategy::new("brave");
    router.register_strategy(anthropic.clone()).await;
    router.register_strategy(brave.clone()).await;
    router.set_model("anthropic/claude-3").await;

    let response = router.search(&SearchParameters::new("q")).await.unwrap();
    assert_eq!(response.provider, "brave");
    assert_eq!(anthropic.call_count(), 1);
    assert_eq!(brave.call_count(), 1);

    let stats = router.metrics().await;
    assert_eq!(stats["anthropic"].request_count, 1);
    assert_eq!(stats["anthropic"].failure_count, 1);
    assert!(stats["anthropic"].last_error.as_ref().unwrap().contains("503"));
    assert_eq!(stats["brave"].request_count, 1);
    assert_eq!(stats["brave"].success_count, 1);
    assert!(stats["brave"].last_used.is_some());
}

#[tokio::test]
async fn all_failures_surface_last_provider() {
    let router = uncached_router();
    router
        .register_strategy(FakeStrategy::failing("anthropic", usize::MAX))
        .await;
    router
        .register_strategy(FakeStrategy::failing("brave", usize::MAX))
        .await;
    router.set_model("claude-3").await;

    let err = router.search(&SearchParameters::new("q")).await.unwrap_err();
    match err {
        SearchError::AllProvidersFailed { provider, message } => {
            assert_eq!(provider, "brave");
            assert!(message.contains("503"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn no_strategies_reports_primary() {
    let router = uncached_router();
    router.set_model("gpt-4").await;
    let err = router.search(&SearchParameters::new("q")).await.unwrap_err();
    assert!(matches!(
        err,
        SearchError::AllProvidersFailed { provider, .. } if provider == "brave"
    ));
}

#[tokio::test]
async fn fallback_disabled_stops_after_primary() {
    let config = SearchConfig {
        enable_fallback: false,
        cache_enabled: false,
        ..SearchConfig::default()
    };
    let router = SearchRouter::new(config);
    router
        .register_strategy(FakeStrategy::failing("anthropic", usize::MAX))
        .await;
    let brave = FakeStrategy::new("brave");
    router.register_strategy(brave.clone()).await;
    router.set_model("claude-3").await;

    assert!(router.search(&SearchParameters::new("q")).await.is_err());
    assert_eq!(brave.call_count(), 0);
}

#[tokio::test]
async fn cached_responses_skip_providers() {
    let router = router();
    let brave = FakeStrategy::new("brave");
    router.register_strategy(brave.clone()).await;

    let params = SearchParameters::new("repeatable");
    let first = router.search(&params).await.unwrap();
    assert!(!first.cached);
    let second = router.search(&params).await.unwrap();
    assert!(second.cached);
    assert_eq!(brave.call_count(), 1);
}

#[tokio::test]
async fn invalid_parameters_are_rejected_before_routing() {
    let router = uncached_router();
    let brave = FakeStrategy::new("brave");
    router.register_strategy(brave.clone()).await;

    assert!(matches!(
        router.search(&SearchParameters::new("")).await,
        Err(SearchError::InvalidQuery)
    ));
    assert_eq!(brave.call_count(), 0);
}

#[tokio::test]
async fn set_api_key_constructs_anthropic_on_the_fly() {
    let router = uncached_router();
    router.set_api_key("anthropic", "sk-new").await.unwrap();
    let strategies = router.strategies.read().await;
    assert!(strategies.get("anthropic").is_some_and(|s| s.is_available()));
}

#[tokio::test]
async fn brave_key_is_immutable() {
    let router = uncached_router();
    let brave_config = crate::config::ProviderConfig {
        api_key: "k".to_string(),
        ..crate::config::ProviderConfig::default()
    };
    router
        .register_strategy(Arc::new(crate::search::brave::BraveSearch::from_config(
            &brave_config,
        )))
        .await;
    assert!(router.set_api_key("brave", "other").await.is_err());
}

#[tokio::test]
async fn metrics_snapshot_is_a_deep_copy() {
    let router = uncached_router();
    let brave = FakeStrategy::new("brave");
    router.register_strategy(brave).await;
    router.search(&SearchParameters::new("q")).await.unwrap();

    let mut snapshot = router.metrics().await;
    snapshot.get_mut("brave").unwrap().success_count = 99;
    assert_eq!(router.provider_stats("brave").await.unwrap().success_count, 1);
}
