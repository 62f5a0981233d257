use crate::cache::ResultCache;
use crate::config::PlanningConfig;
use crate::errors::ShuntError;
use crate::plan::analyzer::DependencyAnalyzer;
use crate::plan::optimizer::ExecutionOptimizer;
use crate::plan::profiles::ProfileStore;
use crate::plan::types::{
    EstimatedMetrics, ExecutionPlan, ExecutionStep, Strategy, ToolCall,
};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Tools below this success rate (or above the cost bar) get a synthesized
/// fallback variant attached. Reliability plans skip the thresholds and
/// attach one to every step.
const FALLBACK_SUCCESS_RATE: f64 = 0.95;
const FALLBACK_COST: f64 = 0.01;

/// Priority offset pushing synthesized fallbacks far behind their parents.
const FALLBACK_PRIORITY: i32 = 10_000;

static LAST_PLAN_NANOS: AtomicU64 = AtomicU64::new(0);

/// Allocate `plan_<nanos>` ids that stay unique even when the wall clock
/// stalls or planning happens concurrently.
fn next_plan_id() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let mut prev = LAST_PLAN_NANOS.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev + 1);
        match LAST_PLAN_NANOS.compare_exchange_weak(
            prev,
            next,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return format!("plan_{}", next),
            Err(actual) => prev = actual,
        }
    }
}

/// Composes dependency analysis, optimization, profiles, and the result
/// cache into concrete execution plans.
pub struct ExecutionPlanner {
    profiles: Arc<ProfileStore>,
    analyzer: DependencyAnalyzer,
    optimizer: ExecutionOptimizer,
    cache: Option<Arc<ResultCache>>,
    config: PlanningConfig,
}

impl ExecutionPlanner {
    pub fn new(
        profiles: Arc<ProfileStore>,
        cache: Option<Arc<ResultCache>>,
        config: PlanningConfig,
    ) -> Self {
        let optimizer = ExecutionOptimizer::new(Arc::clone(&profiles), config.max_parallel);
        Self {
            profiles,
            analyzer: DependencyAnalyzer::new(),
            optimizer,
            cache,
            config,
        }
    }

    /// Build an optimized plan for a tool-call batch.
    pub async fn create_plan(
        &self,
        calls: &[ToolCall],
        strategy: Strategy,
    ) -> Result<ExecutionPlan, ShuntError> {
        if calls.is_empty() {
            return Err(ShuntError::Planning(
                "cannot plan an empty tool-call batch".to_string(),
            ));
        }
        let mut ids = HashSet::new();
        for call in calls {
            if !ids.insert(call.id.as_str()) {
                return Err(ShuntError::Planning(format!(
                    "duplicate step id '{}' in batch",
                    call.id
                )));
            }
        }

        let mut steps = Vec::with_capacity(calls.len());
        for call in calls {
            let profile = self.profiles.profile_for(&call.name);
            let mut step = ExecutionStep::new(&call.id, &call.name, call.arguments.clone());
            step.timeout = profile.timeout;
            step.retries = profile.max_retries;
            step.complexity = profile.complexity;
            step.cost_weight = profile.cost_per_call;

            if profile.cache_compatible
                && let Some(cache) = &self.cache
            {
                step.cache_key = Some(cache.generate_key(&call.name, &call.arguments));
            }

            if wants_fallback(strategy, &profile) {
                step.fallbacks.push(synthesize_fallback(&step));
            }
            steps.push(step);
        }

        let report = self.analyzer.analyze(calls)?;
        let warm = self.warm_steps(&steps).await;

        let plan = ExecutionPlan {
            id: next_plan_id(),
            steps,
            dependencies: report.dependencies,
            parallel: Vec::new(),
            estimated: EstimatedMetrics::default(),
            optimized_for: strategy,
            created_at: Utc::now(),
        };
        let mut plan = self.optimizer.optimize(plan, strategy, &warm);
        plan.estimated = self.estimate(&plan, &warm);

        debug!(
            "planned {}: {} steps in {} groups, est {}ms, strategy {}",
            plan.id,
            plan.steps.len(),
            plan.parallel.len(),
            plan.estimated.duration.as_millis(),
            strategy
        );
        Ok(plan)
    }

    /// Ids of steps whose cache key is already present and fresh.
    async fn warm_steps(&self, steps: &[ExecutionStep]) -> HashSet<String> {
        let Some(cache) = &self.cache else {
            return HashSet::new();
        };
        let mut warm = HashSet::new();
        for step in steps {
            if let Some(key) = &step.cache_key
                && cache.contains(key).await
            {
                warm.insert(step.id.clone());
            }
        }
        warm
    }

    /// Duration is the max step latency per group summed across groups; the
    /// global concurrency cap is deliberately ignored (known under-estimate).
    fn estimate(&self, plan: &ExecutionPlan, warm: &HashSet<String>) -> EstimatedMetrics {
        let mut duration = Duration::ZERO;
        let mut cache_hit_probability = 0.0;
        for group in &plan.parallel {
            let group_max = group
                .iter()
                .filter_map(|id| plan.step(id))
                .map(|s| self.profiles.profile_for(&s.tool_name).average_latency)
                .max()
                .unwrap_or(Duration::ZERO);
            duration += group_max;
            if !group.is_empty() {
                let warm_fraction =
                    group.iter().filter(|id| warm.contains(*id)).count() as f64
                        / group.len() as f64;
                cache_hit_probability += warm_fraction;
            }
        }
        if !plan.parallel.is_empty() {
            cache_hit_probability /= plan.parallel.len() as f64;
        }

        let cost = plan.steps.iter().map(|s| s.cost_weight).sum();
        let reliability = plan
            .steps
            .iter()
            .map(|s| self.profiles.profile_for(&s.tool_name).success_rate)
            .product();

        EstimatedMetrics {
            duration,
            cost,
            reliability,
            cache_hit_probability,
        }
    }

    pub fn default_strategy(&self) -> Strategy {
        self.config.default_strategy
    }
}

/// Whether a step planned under `strategy` should carry a synthesized
/// fallback. Reliability plans back up every step; the other strategies only
/// cover tools that are unreliable or expensive enough to be worth the
/// second attempt.
fn wants_fallback(strategy: Strategy, profile: &crate::plan::profiles::ToolProfile) -> bool {
    match strategy {
        Strategy::Reliability => true,
        Strategy::Speed | Strategy::Cost | Strategy::Balanced => {
            profile.success_rate < FALLBACK_SUCCESS_RATE || profile.cost_per_call > FALLBACK_COST
        }
    }
}

/// A cheaper, faster, less thorough variant of a step, tried only after the
/// primary exhausts its retries.
fn synthesize_fallback(step: &ExecutionStep) -> ExecutionStep {
    let mut fallback = ExecutionStep::new(
        format!("{}_fallback", step.id),
        &step.tool_name,
        simplify_arguments(&step.arguments),
    );
    fallback.timeout = step.timeout / 2;
    fallback.retries = 1;
    fallback.priority = step.priority + FALLBACK_PRIORITY;
    fallback.complexity = step.complexity;
    fallback.cost_weight = step.cost_weight;
    fallback
}

/// Shrink a request to its cheapest useful form.
fn simplify_arguments(arguments: &Value) -> Value {
    let mut simplified = arguments.clone();
    let Some(map) = simplified.as_object_mut() else {
        return simplified;
    };
    if let Some(count) = map.get("count").and_then(Value::as_u64) {
        map.insert("count".to_string(), Value::from(count.min(5)));
    }
    if let Some(max_chars) = map.get("maxChars").and_then(Value::as_u64) {
        map.insert("maxChars".to_string(), Value::from(max_chars.min(1000)));
    }
    if map.contains_key("extractMode") {
        map.insert("extractMode".to_string(), Value::from("text"));
    }
    if let Some(query) = map.get("query").and_then(Value::as_str).map(String::from) {
        let trimmed = query
            .split_whitespace()
            .take(3)
            .collect::<Vec<_>>()
            .join(" ");
        map.insert("query".to_string(), Value::from(trimmed));
    }
    simplified
}
