use super::*;
use crate::plan::types::StepResult;
use serde_json::json;

fn ok_result(content: &str) -> StepResult {
    StepResult::success("s1", "web_search", content.to_string())
}

fn failed_result() -> StepResult {
    StepResult::failure("s1", "web_search", "boom".to_string())
}

#[test]
fn web_search_skips_failures_and_empties() {
    let policy = WebSearchPolicy;
    assert!(policy.should_cache("web_search", &json!({}), &ok_result("results")));
    assert!(!policy.should_cache("web_search", &json!({}), &failed_result()));
    assert!(!policy.should_cache("web_search", &json!({}), &ok_result("   ")));

    let mut empty_list = ok_result("No results");
    empty_list.data = Some(json!({"results": []}));
    assert!(!policy.should_cache("web_search", &json!({}), &empty_list));

    let mut with_list = ok_result("Results");
    with_list.data = Some(json!({"results": [{"title": "t"}]}));
    assert!(policy.should_cache("web_search", &json!({}), &with_list));
}

#[test]
fn web_search_ttl_shrinks_with_freshness() {
    let policy = WebSearchPolicy;
    assert_eq!(
        policy.ttl("web_search", &json!({"freshness": "pd"})),
        Duration::from_secs(30 * 60)
    );
    assert_eq!(
        policy.ttl("web_search", &json!({"freshness": ""})),
        Duration::from_secs(60 * 60)
    );
    assert_eq!(
        policy.ttl("web_search", &json!({})),
        Duration::from_secs(60 * 60)
    );
}

#[test]
fn web_fetch_bounds_content_length() {
    let policy = WebFetchPolicy;
    let args = json!({"url": "https://example.com"});
    assert!(!policy.should_cache("web_fetch", &args, &ok_result("tiny")));
    assert!(policy.should_cache("web_fetch", &args, &ok_result(&"x".repeat(100))));
    assert!(policy.should_cache("web_fetch", &args, &ok_result(&"x".repeat(499_999))));
    assert!(!policy.should_cache("web_fetch", &args, &ok_result(&"x".repeat(500_000))));
    assert!(!policy.should_cache("web_fetch", &args, &failed_result()));
}

#[test]
fn memory_search_caches_all_successes() {
    let policy = MemorySearchPolicy;
    assert!(policy.should_cache("memory_search", &json!({}), &ok_result("")));
    assert!(!policy.should_cache("memory_search", &json!({}), &failed_result()));
    assert_eq!(policy.ttl("memory_search", &json!({})), Duration::from_secs(600));
    assert_eq!(policy.invalidated_by(), &["write_file", "exec"]);
}

#[test]
fn tags_include_policy_and_tool() {
    let policy = MemorySearchPolicy;
    let tags = policy.tags("memory_search");
    assert!(tags.contains("memory_search"));
    assert!(tags.contains("memory_search_results"));
}
