use crate::plan::types::StepResult;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::Duration;

/// Ring-buffer depth for recent latencies.
const RECENT_SAMPLES: usize = 100;

/// Minimum samples before percentiles are computed.
const PERCENTILE_MIN_SAMPLES: usize = 10;

/// Per-tool counters and latency statistics.
#[derive(Debug, Clone, Default)]
pub struct ToolMetrics {
    pub total_executions: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_latency: Duration,
    pub min_latency: Option<Duration>,
    pub max_latency: Duration,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub retries: u64,
    pub fallbacks: u64,
    pub total_cost: f64,
    pub error_types: HashMap<String, u64>,
    pub last_execution: Option<DateTime<Utc>>,
    pub recent: VecDeque<Duration>,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

impl ToolMetrics {
    pub fn success_rate(&self) -> f64 {
        if self.total_executions == 0 {
            1.0
        } else {
            self.successes as f64 / self.total_executions as f64
        }
    }

    pub fn average_latency(&self) -> Duration {
        if self.total_executions == 0 {
            Duration::ZERO
        } else {
            self.total_latency / self.total_executions as u32
        }
    }

    pub fn cache_hit_rate(&self) -> f64 {
        let probes = self.cache_hits + self.cache_misses;
        if probes == 0 {
            0.0
        } else {
            self.cache_hits as f64 / probes as f64
        }
    }

    pub fn cost_per_call(&self) -> f64 {
        if self.total_executions == 0 {
            0.0
        } else {
            self.total_cost / self.total_executions as f64
        }
    }
}

/// A tuning suggestion derived from aggregate metrics.
#[derive(Debug, Clone)]
pub struct Recommendation {
    pub kind: String,
    pub tool: String,
    pub priority: String,
    pub description: String,
    pub impact: String,
    pub effort: String,
}

struct Inner {
    tools: HashMap<String, ToolMetrics>,
    plans_executed: u64,
    start_time: DateTime<Utc>,
}

/// Process-wide collector of per-tool and per-plan metrics. Counter updates
/// happen under the collector lock; snapshot reads are deep copies.
pub struct MetricsCollector {
    inner: RwLock<Inner>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                tools: HashMap::new(),
                plans_executed: 0,
                start_time: Utc::now(),
            }),
        }
    }

    /// Record one step outcome along with its estimated cost.
    pub fn record_step(&self, result: &StepResult, cost: f64) {
        let mut inner = self.inner.write().expect("metrics lock poisoned");
        let metrics = inner.tools.entry(result.tool_name.clone()).or_default();

        metrics.total_executions += 1;
        if result.success {
            metrics.successes += 1;
        } else {
            metrics.failures += 1;
            let category = categorize_error(result.error.as_deref().unwrap_or(""));
            *metrics.error_types.entry(category.to_string()).or_insert(0) += 1;
        }

        metrics.total_latency += result.duration;
        metrics.max_latency = metrics.max_latency.max(result.duration);
        metrics.min_latency = Some(
            metrics
                .min_latency
                .map_or(result.duration, |m| m.min(result.duration)),
        );

        if result.cache_hit {
            metrics.cache_hits += 1;
        } else {
            metrics.cache_misses += 1;
        }
        metrics.retries += u64::from(result.retries);
        if result.fallback_used {
            metrics.fallbacks += 1;
        }
        metrics.total_cost += cost;
        metrics.last_execution = Some(result.executed_at);

        if metrics.recent.len() == RECENT_SAMPLES {
            metrics.recent.pop_front();
        }
        metrics.recent.push_back(result.duration);
        if metrics.recent.len() >= PERCENTILE_MIN_SAMPLES {
            let mut sorted: Vec<Duration> = metrics.recent.iter().copied().collect();
            sorted.sort_unstable();
            metrics.p50 = percentile(&sorted, 0.50);
            metrics.p95 = percentile(&sorted, 0.95);
            metrics.p99 = percentile(&sorted, 0.99);
        }
    }

    pub fn record_plan(&self) {
        self.inner.write().expect("metrics lock poisoned").plans_executed += 1;
    }

    /// Deep copy of one tool's metrics.
    pub fn tool(&self, name: &str) -> Option<ToolMetrics> {
        self.inner
            .read()
            .expect("metrics lock poisoned")
            .tools
            .get(name)
            .cloned()
    }

    /// Deep copy of every tool's metrics.
    pub fn snapshot(&self) -> HashMap<String, ToolMetrics> {
        self.inner
            .read()
            .expect("metrics lock poisoned")
            .tools
            .clone()
    }

    /// Weighted score in [0, 1]: success rate, inverse latency, inverse
    /// cost, and cache hit rate.
    pub fn performance_score(metrics: &ToolMetrics) -> f64 {
        let latency_score = 1.0 / (1.0 + metrics.average_latency().as_secs_f64());
        let cost_score = 1.0 / (1.0 + metrics.cost_per_call() * 100.0);
        0.4 * metrics.success_rate()
            + 0.3 * latency_score
            + 0.2 * cost_score
            + 0.1 * metrics.cache_hit_rate()
    }

    /// Tools ranked by performance score, best first.
    pub fn ranked(&self) -> Vec<(String, f64)> {
        let mut scores: Vec<(String, f64)> = self
            .snapshot()
            .into_iter()
            .map(|(name, m)| (name, Self::performance_score(&m)))
            .collect();
        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scores
    }

    pub fn top_performers(&self, n: usize) -> Vec<(String, f64)> {
        self.ranked().into_iter().take(n).collect()
    }

    pub fn bottom_performers(&self, n: usize) -> Vec<(String, f64)> {
        let mut ranked = self.ranked();
        ranked.reverse();
        ranked.into_iter().take(n).collect()
    }

    /// Threshold-triggered tuning suggestions.
    pub fn recommendations(&self) -> Vec<Recommendation> {
        let mut out = Vec::new();
        for (name, m) in self.snapshot() {
            let probes = m.cache_hits + m.cache_misses;
            if probes >= 20 && m.cache_misses > 3 * m.cache_hits {
                out.push(Recommendation {
                    kind: "caching".to_string(),
                    tool: name.clone(),
                    priority: "medium".to_string(),
                    description: format!(
                        "'{}' misses cache {} times against {} hits; review its cache policy or TTL",
                        name, m.cache_misses, m.cache_hits
                    ),
                    impact: "lower latency and upstream load".to_string(),
                    effort: "low".to_string(),
                });
            }
            if m.total_executions > 0 && m.success_rate() < 0.9 {
                out.push(Recommendation {
                    kind: "reliability".to_string(),
                    tool: name.clone(),
                    priority: "high".to_string(),
                    description: format!(
                        "'{}' succeeds only {:.0}% of the time; add a fallback or raise retries",
                        name,
                        m.success_rate() * 100.0
                    ),
                    impact: "fewer failed plans".to_string(),
                    effort: "medium".to_string(),
                });
            }
            if m.average_latency() > Duration::from_secs(5) && m.retries > m.successes / 2 {
                out.push(Recommendation {
                    kind: "latency".to_string(),
                    tool: name.clone(),
                    priority: "medium".to_string(),
                    description: format!(
                        "'{}' is slow ({}ms avg) and retries heavily; check its timeout budget",
                        name,
                        m.average_latency().as_millis()
                    ),
                    impact: "shorter plan wall time".to_string(),
                    effort: "medium".to_string(),
                });
            }
            if m.cost_per_call() > 0.01 && m.successes > 50 {
                out.push(Recommendation {
                    kind: "cost".to_string(),
                    tool: name.clone(),
                    priority: "low".to_string(),
                    description: format!(
                        "'{}' costs {:.3} per call at volume; consider a cheaper provider or more caching",
                        name,
                        m.cost_per_call()
                    ),
                    impact: "lower spend".to_string(),
                    effort: "high".to_string(),
                });
            }
        }
        out.sort_by(|a, b| a.tool.cmp(&b.tool).then(a.kind.cmp(&b.kind)));
        out
    }

    /// Serialized snapshot of everything the collector tracks.
    pub fn export(&self) -> Value {
        let inner = self.inner.read().expect("metrics lock poisoned");
        let tools: serde_json::Map<String, Value> = inner
            .tools
            .iter()
            .map(|(name, m)| {
                (
                    name.clone(),
                    json!({
                        "totalExecutions": m.total_executions,
                        "successes": m.successes,
                        "failures": m.failures,
                        "successRate": m.success_rate(),
                        "averageLatencyMs": m.average_latency().as_millis() as u64,
                        "minLatencyMs": m.min_latency.unwrap_or(Duration::ZERO).as_millis() as u64,
                        "maxLatencyMs": m.max_latency.as_millis() as u64,
                        "p50Ms": m.p50.as_millis() as u64,
                        "p95Ms": m.p95.as_millis() as u64,
                        "p99Ms": m.p99.as_millis() as u64,
                        "cacheHits": m.cache_hits,
                        "cacheMisses": m.cache_misses,
                        "retries": m.retries,
                        "fallbacks": m.fallbacks,
                        "totalCost": m.total_cost,
                        "errorTypes": m.error_types,
                        "lastExecution": m.last_execution.map(|t| t.to_rfc3339()),
                    }),
                )
            })
            .collect();
        json!({
            "startTime": inner.start_time.to_rfc3339(),
            "plansExecuted": inner.plans_executed,
            "tools": tools,
        })
    }

    /// Wipe all counters and restart the clock.
    pub fn reset(&self) {
        let mut inner = self.inner.write().expect("metrics lock poisoned");
        inner.tools.clear();
        inner.plans_executed = 0;
        inner.start_time = Utc::now();
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.inner.read().expect("metrics lock poisoned").start_time
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Substring classification of an error message. Underscores normalize to
/// spaces so `rate_limit` and `rate limit` land in the same bucket.
pub fn categorize_error(error: &str) -> &'static str {
    let lower = error.to_lowercase().replace('_', " ");
    if lower.contains("timeout") || lower.contains("deadline") {
        "timeout"
    } else if lower.contains("connection")
        || lower.contains("network")
        || lower.contains("dns")
        || lower.contains("refused")
    {
        "network"
    } else if lower.contains("permission")
        || lower.contains("forbidden")
        || lower.contains("unauthorized")
        || lower.contains("denied")
    {
        "permission"
    } else if lower.contains("not found") || lower.contains("404") || lower.contains("no such") {
        "not_found"
    } else if lower.contains("rate limit") || lower.contains("429") || lower.contains("quota") {
        "rate_limit"
    } else {
        "unknown"
    }
}

fn percentile(sorted: &[Duration], q: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() - 1) as f64 * q).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests;
