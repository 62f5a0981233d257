use super::*;
use crate::plan::types::StepResult;

fn ok_step(tool: &str, millis: u64) -> StepResult {
    let mut result = StepResult::success("s1", tool, "ok".to_string());
    result.duration = Duration::from_millis(millis);
    result
}

fn failed_step(tool: &str, error: &str) -> StepResult {
    StepResult::failure("s1", tool, error.to_string())
}

#[test]
fn records_basic_counters() {
    let collector = MetricsCollector::new();
    collector.record_step(&ok_step("web_search", 100), 0.005);
    collector.record_step(&failed_step("web_search", "timeout talking upstream"), 0.005);

    let m = collector.tool("web_search").unwrap();
    assert_eq!(m.total_executions, 2);
    assert_eq!(m.successes, 1);
    assert_eq!(m.failures, 1);
    assert!((m.success_rate() - 0.5).abs() < f64::EPSILON);
    assert_eq!(m.error_types["timeout"], 1);
    assert!((m.total_cost - 0.01).abs() < 1e-9);
    assert!(m.last_execution.is_some());
}

#[test]
fn tracks_latency_extremes() {
    let collector = MetricsCollector::new();
    collector.record_step(&ok_step("t", 50), 0.0);
    collector.record_step(&ok_step("t", 200), 0.0);
    collector.record_step(&ok_step("t", 110), 0.0);

    let m = collector.tool("t").unwrap();
    assert_eq!(m.min_latency, Some(Duration::from_millis(50)));
    assert_eq!(m.max_latency, Duration::from_millis(200));
    assert_eq!(m.average_latency(), Duration::from_millis(120));
}

#[test]
fn cache_and_retry_counters() {
    let collector = MetricsCollector::new();
    let mut hit = ok_step("t", 1);
    hit.cache_hit = true;
    collector.record_step(&hit, 0.0);
    let mut retried = ok_step("t", 1);
    retried.retries = 2;
    retried.fallback_used = true;
    collector.record_step(&retried, 0.0);

    let m = collector.tool("t").unwrap();
    assert_eq!(m.cache_hits, 1);
    assert_eq!(m.cache_misses, 1);
    assert_eq!(m.retries, 2);
    assert_eq!(m.fallbacks, 1);
    assert!((m.cache_hit_rate() - 0.5).abs() < f64::EPSILON);
}

#[test]
fn percentiles_need_ten_samples() {
    let collector = MetricsCollector::new();
    for i in 0..9 {
        collector.record_step(&ok_step("t", 10 * (i + 1)), 0.0);
    }
    assert_eq!(collector.tool("t").unwrap().p95, Duration::ZERO);

    collector.record_step(&ok_step("t", 100), 0.0);
    let m = collector.tool("t").unwrap();
    assert_eq!(m.p50, Duration::from_millis(60));
    assert_eq!(m.p95, Duration::from_millis(100));
    assert_eq!(m.p99, Duration::from_millis(100));
}

#[test]
fn ring_buffer_is_bounded() {
    let collector = MetricsCollector::new();
    for _ in 0..150 {
        collector.record_step(&ok_step("t", 10), 0.0);
    }
    assert_eq!(collector.tool("t").unwrap().recent.len(), 100);
}

#[test]
fn error_categorization() {
    assert_eq!(categorize_error("request timeout after 30s"), "timeout");
    assert_eq!(categorize_error("context deadline exceeded"), "timeout");
    assert_eq!(categorize_error("connection refused"), "network");
    assert_eq!(categorize_error("permission denied"), "permission");
    assert_eq!(categorize_error("resource not found"), "not_found");
    assert_eq!(categorize_error("rate limit exceeded"), "rate_limit");
    assert_eq!(categorize_error("HTTP 429"), "rate_limit");
    assert_eq!(categorize_error("something odd"), "unknown");
}

#[test]
fn ranking_orders_by_score() {
    let collector = MetricsCollector::new();
    collector.record_step(&ok_step("fast_reliable", 10), 0.0);
    for _ in 0..4 {
        collector.record_step(&failed_step("flaky", "boom"), 0.0);
    }
    collector.record_step(&ok_step("flaky", 5000), 0.0);

    let top = collector.top_performers(1);
    assert_eq!(top[0].0, "fast_reliable");
    let bottom = collector.bottom_performers(1);
    assert_eq!(bottom[0].0, "flaky");
}

#[test]
fn recommendations_trigger_on_thresholds() {
    let collector = MetricsCollector::new();
    // Low success rate
    for _ in 0..8 {
        collector.record_step(&ok_step("unreliable", 10), 0.0);
    }
    for _ in 0..2 {
        collector.record_step(&failed_step("unreliable", "boom"), 0.0);
    }
    // Heavy cache missing over >= 20 probes
    for _ in 0..25 {
        collector.record_step(&ok_step("cold", 10), 0.0);
    }

    let recs = collector.recommendations();
    assert!(recs.iter().any(|r| r.kind == "reliability" && r.tool == "unreliable"));
    assert!(recs.iter().any(|r| r.kind == "caching" && r.tool == "cold"));
}

#[test]
fn export_and_reset() {
    let collector = MetricsCollector::new();
    collector.record_step(&ok_step("t", 10), 0.002);
    collector.record_plan();

    let export = collector.export();
    assert_eq!(export["plansExecuted"], 1);
    assert_eq!(export["tools"]["t"]["totalExecutions"], 1);

    let before_reset = Utc::now();
    collector.reset();
    assert!(collector.snapshot().is_empty());
    assert_eq!(collector.export()["plansExecuted"], 0);
    assert!(collector.start_time() >= before_reset);
}

#[test]
fn snapshot_is_a_deep_copy() {
    let collector = MetricsCollector::new();
    collector.record_step(&ok_step("t", 10), 0.0);
    let mut snapshot = collector.snapshot();
    snapshot.get_mut("t").unwrap().successes = 999;
    assert_eq!(collector.tool("t").unwrap().successes, 1);
}
