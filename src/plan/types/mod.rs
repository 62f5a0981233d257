use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// A single tool invocation request as emitted by the model-driven controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Optimization objective a plan is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Speed,
    Reliability,
    Cost,
    #[default]
    Balanced,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Speed => "speed",
            Strategy::Reliability => "reliability",
            Strategy::Cost => "cost",
            Strategy::Balanced => "balanced",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One schedulable unit of a plan. Fallback steps are owned by their parent.
#[derive(Debug, Clone)]
pub struct ExecutionStep {
    pub id: String,
    pub tool_name: String,
    pub arguments: Value,
    pub cache_key: Option<String>,
    pub timeout: Duration,
    pub retries: u32,
    pub fallbacks: Vec<ExecutionStep>,
    /// Lower priorities are scheduled earlier.
    pub priority: i32,
    /// Relative computational weight in [0, 1].
    pub complexity: f64,
    pub cost_weight: f64,
}

impl ExecutionStep {
    pub fn new(id: impl Into<String>, tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments,
            cache_key: None,
            timeout: Duration::from_secs(30),
            retries: 1,
            fallbacks: Vec::new(),
            priority: 0,
            complexity: 0.5,
            cost_weight: 0.0,
        }
    }
}

/// Planner estimates for a whole plan.
#[derive(Debug, Clone, Default)]
pub struct EstimatedMetrics {
    pub duration: Duration,
    pub cost: f64,
    pub reliability: f64,
    pub cache_hit_probability: f64,
}

/// An optimized schedule for a batch of tool calls.
///
/// Invariants:
/// - every dependency target exists in `steps`
/// - `parallel` is a topological batching: for any edge u→v, the group
///   holding v comes strictly after the group holding u
/// - step ids are unique and the union of groups equals the step set
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub id: String,
    pub steps: Vec<ExecutionStep>,
    /// step id → prerequisite step ids
    pub dependencies: HashMap<String, HashSet<String>>,
    /// Ordered parallel groups of step ids.
    pub parallel: Vec<Vec<String>>,
    pub estimated: EstimatedMetrics,
    pub optimized_for: Strategy,
    pub created_at: DateTime<Utc>,
}

impl ExecutionPlan {
    pub fn step(&self, id: &str) -> Option<&ExecutionStep> {
        self.steps.iter().find(|s| s.id == id)
    }
}

/// Outcome of executing one step.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub step_id: String,
    pub tool_name: String,
    pub success: bool,
    pub content: String,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub duration: Duration,
    pub executed_at: DateTime<Utc>,
    pub cache_hit: bool,
    /// Failed attempts before the final outcome.
    pub retries: u32,
    pub fallback_used: bool,
}

impl StepResult {
    pub fn success(step_id: impl Into<String>, tool_name: impl Into<String>, content: String) -> Self {
        Self {
            step_id: step_id.into(),
            tool_name: tool_name.into(),
            success: true,
            content,
            data: None,
            error: None,
            duration: Duration::ZERO,
            executed_at: Utc::now(),
            cache_hit: false,
            retries: 0,
            fallback_used: false,
        }
    }

    pub fn failure(
        step_id: impl Into<String>,
        tool_name: impl Into<String>,
        error: String,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            tool_name: tool_name.into(),
            success: false,
            content: String::new(),
            data: None,
            error: Some(error),
            duration: Duration::ZERO,
            executed_at: Utc::now(),
            cache_hit: false,
            retries: 0,
            fallback_used: false,
        }
    }
}

/// Aggregate outcome of a plan run. `success` holds only when every step
/// succeeded (directly or via fallback).
#[derive(Debug, Clone)]
pub struct PlanResult {
    pub plan_id: String,
    pub step_results: HashMap<String, StepResult>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: Duration,
    pub success: bool,
    pub total_steps: usize,
    pub cache_hits: usize,
    pub failed_steps: Vec<String>,
}

impl PlanResult {
    pub fn from_results(
        plan_id: impl Into<String>,
        step_results: HashMap<String, StepResult>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let success = step_results.values().all(|r| r.success);
        let cache_hits = step_results.values().filter(|r| r.cache_hit).count();
        let mut failed_steps: Vec<String> = step_results
            .values()
            .filter(|r| !r.success)
            .map(|r| r.step_id.clone())
            .collect();
        failed_steps.sort();
        let duration = (end_time - start_time).to_std().unwrap_or(Duration::ZERO);
        Self {
            plan_id: plan_id.into(),
            total_steps: step_results.len(),
            step_results,
            start_time,
            end_time,
            duration,
            success,
            cache_hits,
            failed_steps,
        }
    }
}
