use crate::cache::ResultCache;
use crate::cache::storage::{CacheStorage, MemoryStorage};
use crate::config::PlanningConfig;
use crate::errors::ShuntError;
use crate::exec::{ParallelExecutor, ToolExecutor};
use crate::metrics::MetricsCollector;
use crate::plan::planner::ExecutionPlanner;
use crate::plan::profiles::ProfileStore;
use crate::plan::types::{PlanResult, StepResult, Strategy, ToolCall};
use crate::tools::ToolRegistry;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Composition root of the planning core. Owns startup wiring
/// (storage → cache → metrics → planner → executor) and teardown.
///
/// Small batches and planning failures take the naive path: the original
/// batch runs sequentially, in order, without a plan.
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    planner: ExecutionPlanner,
    executor: ParallelExecutor,
    cache: Option<Arc<ResultCache>>,
    metrics: Option<Arc<MetricsCollector>>,
    profiles: Arc<ProfileStore>,
    config: PlanningConfig,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, config: PlanningConfig) -> Self {
        let profiles = Arc::new(ProfileStore::with_defaults());

        let cache = config.cache_enabled.then(|| {
            let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
            Arc::new(ResultCache::new(storage, config.cache_max_size_mb))
        });
        let metrics = config.metrics_enabled.then(|| Arc::new(MetricsCollector::new()));

        let planner = ExecutionPlanner::new(Arc::clone(&profiles), cache.clone(), config.clone());
        let mut executor = ParallelExecutor::new(
            Arc::clone(&registry) as Arc<dyn ToolExecutor>,
            Arc::clone(&profiles),
            &config,
        );
        if let Some(cache) = &cache {
            executor = executor.with_cache(Arc::clone(cache));
        }
        if let Some(metrics) = &metrics {
            executor = executor.with_metrics(Arc::clone(metrics));
        }

        Self {
            registry,
            planner,
            executor,
            cache,
            metrics,
            profiles,
            config,
        }
    }

    /// Start background maintenance (the cache expiry sweep). Idempotent.
    pub fn start(&self) {
        if let Some(cache) = &self.cache {
            cache.start_sweep();
        }
    }

    /// Stop background work. Call before dropping the runtime.
    pub fn shutdown(&self) {
        if let Some(cache) = &self.cache {
            cache.close();
        }
    }

    pub fn cache(&self) -> Option<&Arc<ResultCache>> {
        self.cache.as_ref()
    }

    pub fn metrics(&self) -> Option<&Arc<MetricsCollector>> {
        self.metrics.as_ref()
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run a tool-call batch. Batches under the optimization threshold (or
    /// with planning disabled) run sequentially without a plan; planning
    /// errors and timeouts also fall back to sequential execution with the
    /// error logged, never surfaced. An empty batch is the one planning
    /// error that does not fall back.
    pub async fn run_batch(
        &self,
        calls: &[ToolCall],
        strategy: Option<Strategy>,
        ctx: &crate::tools::base::ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<PlanResult, ShuntError> {
        if calls.is_empty() {
            return Err(ShuntError::Planning(
                "cannot plan an empty tool-call batch".to_string(),
            ));
        }

        if !self.config.enabled || calls.len() < self.config.optimization_threshold {
            debug!(
                "batch of {} below optimization threshold, running sequentially",
                calls.len()
            );
            return Ok(self.run_sequential(calls, ctx, cancel).await);
        }

        let strategy = strategy.unwrap_or(self.config.default_strategy);
        let planned = tokio::time::timeout(
            self.config.planning_timeout(),
            self.planner.create_plan(calls, strategy),
        )
        .await;

        match planned {
            Ok(Ok(plan)) => Ok(self.executor.execute_plan(&plan, ctx, cancel).await),
            Ok(Err(e)) => {
                warn!("planning failed, executing batch sequentially: {}", e);
                Ok(self.run_sequential(calls, ctx, cancel).await)
            }
            Err(_) => {
                warn!(
                    "planning timed out after {:?}, executing batch sequentially",
                    self.config.planning_timeout()
                );
                Ok(self.run_sequential(calls, ctx, cancel).await)
            }
        }
    }

    /// Naive path: every call in batch order, one at a time, no plan.
    async fn run_sequential(
        &self,
        calls: &[ToolCall],
        ctx: &crate::tools::base::ExecutionContext,
        cancel: &CancellationToken,
    ) -> PlanResult {
        let start_time = Utc::now();
        let batch_id = format!(
            "batch_{}",
            start_time.timestamp_nanos_opt().unwrap_or_default()
        );
        let mut results: HashMap<String, StepResult> = HashMap::new();

        for call in calls {
            if cancel.is_cancelled() {
                results.insert(
                    call.id.clone(),
                    StepResult::failure(&call.id, &call.name, "execution cancelled".to_string()),
                );
                continue;
            }
            let started = std::time::Instant::now();
            let mut result = match self
                .registry
                .execute_tool(&call.name, &call.arguments, ctx)
                .await
            {
                Ok(tool_result) if !tool_result.is_error => {
                    let mut result =
                        StepResult::success(&call.id, &call.name, tool_result.content);
                    result.data = tool_result.data;
                    result
                }
                Ok(tool_result) => {
                    StepResult::failure(&call.id, &call.name, tool_result.content)
                }
                Err(e) => StepResult::failure(&call.id, &call.name, e.to_string()),
            };
            result.duration = started.elapsed();
            if let Some(metrics) = &self.metrics {
                let cost = self.profiles.profile_for(&call.name).cost_per_call;
                metrics.record_step(&result, cost);
            }
            results.insert(call.id.clone(), result);
        }

        PlanResult::from_results(batch_id, results, start_time, Utc::now())
    }
}
