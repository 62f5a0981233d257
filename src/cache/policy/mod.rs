use crate::plan::types::StepResult;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Per-tool caching rules: whether a result is worth keeping, for how long,
/// which mutating tools invalidate it, and how valuable it is under pressure.
pub trait CachePolicy: Send + Sync {
    /// Policy identifier, also used as the invalidation tag.
    fn name(&self) -> &str;

    fn applies_to(&self, tool_name: &str) -> bool;

    fn should_cache(&self, tool_name: &str, arguments: &Value, result: &StepResult) -> bool;

    fn ttl(&self, tool_name: &str, arguments: &Value) -> Duration;

    /// Mutating tools whose completion drops this policy's entries.
    fn invalidated_by(&self) -> &[&str] {
        &[]
    }

    /// Relative retention value in [0, 1]. Unused by the default eviction
    /// scorer but available to custom storage backends.
    fn priority(&self, _tool_name: &str, _arguments: &Value) -> f64 {
        0.5
    }

    /// Policy-specific cache key. `None` falls through to the default
    /// fingerprint.
    fn cache_key(&self, _tool_name: &str, _arguments: &Value) -> Option<String> {
        None
    }

    fn tags(&self, tool_name: &str) -> HashSet<String> {
        [self.name().to_string(), tool_name.to_string()]
            .into_iter()
            .collect()
    }
}

pub fn default_policies() -> Vec<Arc<dyn CachePolicy>> {
    vec![
        Arc::new(WebSearchPolicy),
        Arc::new(WebFetchPolicy),
        Arc::new(MemorySearchPolicy),
    ]
}

/// Successful, non-empty search results. Fresh queries get a shorter TTL.
pub struct WebSearchPolicy;

impl CachePolicy for WebSearchPolicy {
    fn name(&self) -> &str {
        "web_search_results"
    }

    fn applies_to(&self, tool_name: &str) -> bool {
        tool_name == "web_search"
    }

    fn should_cache(&self, _tool_name: &str, _arguments: &Value, result: &StepResult) -> bool {
        if !result.success || result.content.trim().is_empty() {
            return false;
        }
        // An explicit empty result list is not worth caching.
        result.data.as_ref().is_none_or(|data| {
            data["results"]
                .as_array()
                .is_none_or(|results| !results.is_empty())
        })
    }

    fn ttl(&self, _tool_name: &str, arguments: &Value) -> Duration {
        let freshness_set = arguments["freshness"]
            .as_str()
            .is_some_and(|f| !f.is_empty());
        if freshness_set {
            Duration::from_secs(30 * 60)
        } else {
            Duration::from_secs(60 * 60)
        }
    }

    fn priority(&self, _tool_name: &str, _arguments: &Value) -> f64 {
        0.7
    }
}

/// Successful fetches of a sane size: big enough to be real content, small
/// enough not to crowd out everything else.
pub struct WebFetchPolicy;

impl CachePolicy for WebFetchPolicy {
    fn name(&self) -> &str {
        "web_fetch_content"
    }

    fn applies_to(&self, tool_name: &str) -> bool {
        tool_name == "web_fetch"
    }

    fn should_cache(&self, _tool_name: &str, _arguments: &Value, result: &StepResult) -> bool {
        result.success && (100..500_000).contains(&result.content.len())
    }

    fn ttl(&self, _tool_name: &str, _arguments: &Value) -> Duration {
        Duration::from_secs(30 * 60)
    }
}

/// All successful memory lookups, dropped as soon as anything writes to the
/// workspace.
pub struct MemorySearchPolicy;

impl CachePolicy for MemorySearchPolicy {
    fn name(&self) -> &str {
        "memory_search_results"
    }

    fn applies_to(&self, tool_name: &str) -> bool {
        tool_name == "memory_search"
    }

    fn should_cache(&self, _tool_name: &str, _arguments: &Value, result: &StepResult) -> bool {
        result.success
    }

    fn ttl(&self, _tool_name: &str, _arguments: &Value) -> Duration {
        Duration::from_secs(10 * 60)
    }

    fn invalidated_by(&self) -> &[&str] {
        &["write_file", "exec"]
    }

    fn priority(&self, _tool_name: &str, _arguments: &Value) -> f64 {
        0.4
    }
}

#[cfg(test)]
mod tests;
