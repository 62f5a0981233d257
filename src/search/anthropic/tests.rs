use super::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> ProviderConfig {
    ProviderConfig {
        api_key: "sk-test".to_string(),
        endpoint: format!("{}/v1/messages", server.uri()),
        ..ProviderConfig::default()
    }
}

fn tool_result_body() -> serde_json::Value {
    json!({
        "id": "msg_01",
        "role": "assistant",
        "content": [
            {"type": "text", "text": "Here is what I found."},
            {
                "type": "web_search_tool_result",
                "tool_use_id": "tu_01",
                "content": [
                    {
                        "type": "web_search_result",
                        "title": "Tokio",
                        "url": "https://tokio.rs/",
                        "description": "Async runtime",
                        "page_age": "2024-06-01"
                    },
                    {
                        "type": "web_search_result",
                        "title": "Async book",
                        "url": "https://rust-lang.github.io/async-book/",
                        "description": "The async book"
                    }
                ]
            }
        ]
    })
}

#[tokio::test]
async fn parses_search_tool_result_blocks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "tools": [{"type": "web_search_20250305", "name": "web_search"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_result_body()))
        .mount(&server)
        .await;

    let strategy = AnthropicSearch::from_config(&config_for(&server));
    let response = strategy
        .search(&SearchParameters::new("rust async"))
        .await
        .unwrap();

    assert_eq!(response.provider, "anthropic");
    assert_eq!(response.total, 2);
    assert_eq!(response.results[0].title, "Tokio");
    assert_eq!(response.results[0].url, "https://tokio.rs/");
    assert_eq!(response.results[0].published.as_deref(), Some("2024-06-01"));
}

#[tokio::test]
async fn falls_back_to_text_extraction() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{
                "type": "text",
                "text": "Top results:\nTokio - https://tokio.rs/\nRust blog: https://blog.rust-lang.org/latest.\n"
            }]
        })))
        .mount(&server)
        .await;

    let strategy = AnthropicSearch::from_config(&config_for(&server));
    let response = strategy.search(&SearchParameters::new("rust")).await.unwrap();
    assert_eq!(response.total, 2);
    assert_eq!(response.results[0].title, "Tokio");
    assert_eq!(response.results[0].url, "https://tokio.rs/");
    assert_eq!(response.results[1].url, "https://blog.rust-lang.org/latest");
}

#[tokio::test]
async fn upstream_auth_errors_map() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let strategy = AnthropicSearch::from_config(&config_for(&server));
    let err = strategy.search(&SearchParameters::new("x")).await.unwrap_err();
    assert!(matches!(err, SearchError::Unauthorized));
}

#[test]
fn api_key_is_rebindable() {
    let strategy = AnthropicSearch::from_config(&ProviderConfig::default());
    assert!(!strategy.is_available());
    assert!(strategy.set_api_key("sk-new"));
    assert!(strategy.is_available());
}

#[test]
fn text_extraction_shapes() {
    let results = results_from_text("Tokio docs - https://tokio.rs/ great runtime\nno link here\n");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "Tokio docs");
    assert_eq!(results[0].url, "https://tokio.rs/");

    let results = results_from_text("see (https://example.com/page).");
    assert_eq!(results[0].url, "https://example.com/page");
}

#[test]
fn result_limit_is_enforced() {
    let body = json!({
        "content": [{
            "type": "text",
            "text": "a https://a.example\nb https://b.example\nc https://c.example\n"
        }]
    });
    assert_eq!(extract_results(&body, 2).len(), 2);
}
