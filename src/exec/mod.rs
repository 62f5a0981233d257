use crate::cache::ResultCache;
use crate::config::{BackoffStrategy, PlanningConfig, RetryConfig};
use crate::metrics::MetricsCollector;
use crate::plan::profiles::ProfileStore;
use crate::plan::types::{ExecutionPlan, ExecutionStep, PlanResult, StepResult};
use crate::tools::base::{ExecutionContext, ToolResult};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Error substrings retried when the configuration supplies none.
const DEFAULT_RETRYABLE: &[&str] = &[
    "timeout",
    "deadline exceeded",
    "connection refused",
    "temporary failure",
    "rate limit",
    "500",
    "502",
    "503",
];

/// Bridge from the executor to the tool registry (or any other dispatcher).
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute_tool(
        &self,
        name: &str,
        params: &Value,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<ToolResult>;
}

/// One exhausted or aborted retry loop.
struct AttemptFailure {
    error: String,
    failed_attempts: u32,
    cancelled: bool,
}

/// Runs execution plans: groups in order with a strict barrier between them,
/// steps within a group concurrently under a global semaphore, each step
/// through a cache probe, retry loop, and ordered fallbacks.
pub struct ParallelExecutor {
    executor: Arc<dyn ToolExecutor>,
    profiles: Arc<ProfileStore>,
    cache: Option<Arc<ResultCache>>,
    metrics: Option<Arc<MetricsCollector>>,
    semaphore: Arc<Semaphore>,
    retry: RetryConfig,
    execution_timeout: Duration,
}

impl ParallelExecutor {
    pub fn new(
        executor: Arc<dyn ToolExecutor>,
        profiles: Arc<ProfileStore>,
        config: &PlanningConfig,
    ) -> Self {
        Self {
            executor,
            profiles,
            cache: None,
            metrics: None,
            semaphore: Arc::new(Semaphore::new(config.max_parallel.max(1))),
            retry: config.retry.clone(),
            execution_timeout: config.execution_timeout(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Execute every parallel group in order. A failing group never aborts
    /// the plan; cancellation (or the execution deadline) skips the rest,
    /// reporting skipped steps as failed with the cancellation reason.
    pub async fn execute_plan(
        &self,
        plan: &ExecutionPlan,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> PlanResult {
        let start_time = Utc::now();
        let deadline = tokio::time::Instant::now() + self.execution_timeout;
        let mut results: HashMap<String, StepResult> = HashMap::new();

        for (index, group) in plan.parallel.iter().enumerate() {
            if cancel.is_cancelled() || tokio::time::Instant::now() >= deadline {
                let reason = if cancel.is_cancelled() {
                    "execution cancelled"
                } else {
                    "execution deadline exceeded"
                };
                warn!("plan {}: skipping groups from {} ({})", plan.id, index, reason);
                for id in plan.parallel[index..].iter().flatten() {
                    if let Some(step) = plan.step(id) {
                        let result =
                            StepResult::failure(&step.id, &step.tool_name, reason.to_string());
                        self.record(&result);
                        results.insert(step.id.clone(), result);
                    }
                }
                break;
            }

            let outcomes = futures_util::future::join_all(
                group
                    .iter()
                    .filter_map(|id| plan.step(id))
                    .map(|step| self.run_step(step, ctx, cancel, deadline)),
            )
            .await;
            for result in outcomes {
                results.insert(result.step_id.clone(), result);
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_plan();
        }
        let plan_result =
            PlanResult::from_results(plan.id.as_str(), results, start_time, Utc::now());
        debug!(
            "plan {}: {} steps, {} cache hits, success={}",
            plan.id, plan_result.total_steps, plan_result.cache_hits, plan_result.success
        );
        plan_result
    }

    /// Cache probe → retry loop → ordered fallbacks → cache write-back.
    async fn run_step(
        &self,
        step: &ExecutionStep,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
        deadline: tokio::time::Instant,
    ) -> StepResult {
        let _permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return StepResult::failure(&step.id, &step.tool_name, "executor shut down".into());
            }
        };
        let started = tokio::time::Instant::now();

        if let (Some(key), Some(cache)) = (&step.cache_key, &self.cache)
            && let Some(mut hit) = cache.get(key).await
        {
            hit.step_id = step.id.clone();
            hit.duration = started.elapsed();
            hit.executed_at = Utc::now();
            self.record(&hit);
            return hit;
        }

        let mut fallback_used = false;
        let outcome = match self
            .try_with_retries(step, &step.arguments, step.timeout, step.retries, ctx, cancel, deadline)
            .await
        {
            Ok((tool_result, failed)) => Ok((tool_result, failed)),
            Err(failure) if failure.cancelled => {
                let mut result =
                    StepResult::failure(&step.id, &step.tool_name, failure.error);
                result.retries = failure.failed_attempts;
                result.duration = started.elapsed();
                self.record(&result);
                return result;
            }
            Err(failure) => {
                let mut recovered = None;
                for fallback in &step.fallbacks {
                    debug!(
                        "step {}: trying fallback '{}' after {} failed attempts",
                        step.id, fallback.id, failure.failed_attempts
                    );
                    match self
                        .try_with_retries(
                            fallback,
                            &fallback.arguments,
                            fallback.timeout,
                            1,
                            ctx,
                            cancel,
                            deadline,
                        )
                        .await
                    {
                        Ok((tool_result, _)) => {
                            fallback_used = true;
                            recovered = Some((tool_result, failure.failed_attempts));
                            break;
                        }
                        Err(fb_failure) if fb_failure.cancelled => break,
                        Err(_) => {}
                    }
                }
                recovered.ok_or(failure)
            }
        };

        let result = match outcome {
            Ok((tool_result, failed_attempts)) => {
                let mut result =
                    StepResult::success(&step.id, &step.tool_name, tool_result.content);
                result.data = tool_result.data;
                result.retries = failed_attempts;
                result.fallback_used = fallback_used;
                result.duration = started.elapsed();
                result
            }
            Err(failure) => {
                let mut result = StepResult::failure(&step.id, &step.tool_name, failure.error);
                result.retries = failure.failed_attempts;
                result.fallback_used = false;
                result.duration = started.elapsed();
                result
            }
        };

        if result.success && let Some(cache) = &self.cache {
            if let Some(key) = &step.cache_key {
                cache.set(key, &step.tool_name, &step.arguments, &result).await;
            }
            // A completed mutating step drops whatever it invalidates.
            cache.on_write_completed(&step.tool_name).await;
        }
        self.record(&result);
        result
    }

    /// Run one target (primary step or fallback) through its retry budget.
    /// Retries only on configured (or default) retryable error substrings,
    /// waiting the backoff delay between attempts.
    #[allow(clippy::too_many_arguments)]
    async fn try_with_retries(
        &self,
        step: &ExecutionStep,
        arguments: &Value,
        timeout: Duration,
        retries: u32,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
        deadline: tokio::time::Instant,
    ) -> Result<(ToolResult, u32), AttemptFailure> {
        let max_attempts = retries.max(1);
        let mut failed = 0u32;
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = backoff_delay(attempt - 1, &self.retry);
                tokio::select! {
                    () = cancel.cancelled() => {
                        return Err(AttemptFailure {
                            error: "execution cancelled".to_string(),
                            failed_attempts: failed,
                            cancelled: true,
                        });
                    }
                    () = tokio::time::sleep(delay) => {}
                }
            }

            let now = tokio::time::Instant::now();
            if cancel.is_cancelled() || now >= deadline {
                return Err(AttemptFailure {
                    error: if cancel.is_cancelled() {
                        "execution cancelled".to_string()
                    } else {
                        "execution deadline exceeded".to_string()
                    },
                    failed_attempts: failed,
                    cancelled: true,
                });
            }

            let attempt_timeout = timeout.min(deadline - now);
            let attempt_result: Result<ToolResult, (String, bool)> = tokio::select! {
                () = cancel.cancelled() => Err(("execution cancelled".to_string(), true)),
                outcome = tokio::time::timeout(
                    attempt_timeout,
                    self.executor.execute_tool(&step.tool_name, arguments, ctx),
                ) => match outcome {
                    Err(_) => Err((
                        format!("timeout after {}ms", attempt_timeout.as_millis()),
                        false,
                    )),
                    Ok(Err(e)) => Err((e.to_string(), false)),
                    Ok(Ok(result)) if result.is_error => Err((result.content, false)),
                    Ok(Ok(result)) => Ok(result),
                },
            };

            match attempt_result {
                Ok(result) => return Ok((result, failed)),
                Err((error, true)) => {
                    return Err(AttemptFailure {
                        error,
                        failed_attempts: failed,
                        cancelled: true,
                    });
                }
                Err((error, false)) => {
                    failed += 1;
                    let retryable = self.is_retryable(&error);
                    last_error = error;
                    if failed >= max_attempts || !retryable {
                        break;
                    }
                    debug!(
                        "step {}: attempt {}/{} failed, will retry: {}",
                        step.id, attempt, max_attempts, last_error
                    );
                }
            }
        }

        Err(AttemptFailure {
            error: last_error,
            failed_attempts: failed,
            cancelled: false,
        })
    }

    fn is_retryable(&self, error: &str) -> bool {
        is_retryable_error(error, &self.retry.retryable_errors)
    }

    fn record(&self, result: &StepResult) {
        if let Some(metrics) = &self.metrics {
            let cost = self.profiles.profile_for(&result.tool_name).cost_per_call;
            metrics.record_step(result, cost);
        }
    }
}

/// Substring match against the configured retryable set, or the default set
/// when the configuration is empty. Underscores normalize to spaces so
/// `rate_limit` and `rate limit` classify the same.
pub fn is_retryable_error(error: &str, configured: &[String]) -> bool {
    let lower = error.to_lowercase().replace('_', " ");
    if configured.is_empty() {
        DEFAULT_RETRYABLE.iter().any(|p| lower.contains(p))
    } else {
        configured
            .iter()
            .any(|p| lower.contains(&p.to_lowercase().replace('_', " ")))
    }
}

/// Delay before retry `k` (1-based), clamped to the configured maximum,
/// with ±10% jitter so synchronized callers spread out.
pub fn backoff_delay(k: u32, retry: &RetryConfig) -> Duration {
    let base = retry.base_delay();
    let raw = match retry.backoff_strategy {
        BackoffStrategy::Exponential => base.saturating_mul(1u32 << (k - 1).min(16)),
        BackoffStrategy::Linear => base.saturating_mul(k),
        BackoffStrategy::Fixed => base,
    };
    let clamped = raw.min(retry.max_delay());
    let jitter = 0.9 + fastrand::f64() * 0.2;
    clamped.mul_f64(jitter)
}
