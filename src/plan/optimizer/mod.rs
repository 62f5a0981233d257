use crate::plan::profiles::ProfileStore;
use crate::plan::types::{ExecutionPlan, ExecutionStep, Strategy};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Expensive steps are serialized under the cost strategy above this weight.
const EXPENSIVE_COST: f64 = 0.01;

/// Priority offset that pushes a step behind every normally-scheduled one.
const SEQUENTIAL_BASE: i32 = 1000;

/// Pure rearrangement pass: reorders steps, assigns priorities, scales
/// timeouts and retry budgets, and partitions the plan into parallel groups
/// according to the selected strategy. Never adds or removes steps.
pub struct ExecutionOptimizer {
    profiles: Arc<ProfileStore>,
    max_parallel: usize,
}

struct StrategyParams {
    timeout_factor: f64,
    retry_factor: f64,
    parallel_factor: f64,
    /// Schedule steps with warm cache keys first.
    cache_first: bool,
}

fn params_for(strategy: Strategy) -> StrategyParams {
    match strategy {
        Strategy::Speed => StrategyParams {
            timeout_factor: 0.7,
            retry_factor: 0.5,
            parallel_factor: 1.0,
            cache_first: true,
        },
        Strategy::Reliability => StrategyParams {
            timeout_factor: 1.5,
            retry_factor: 1.5,
            parallel_factor: 0.6,
            cache_first: false,
        },
        Strategy::Cost => StrategyParams {
            timeout_factor: 0.8,
            retry_factor: 0.7,
            parallel_factor: 1.0,
            cache_first: true,
        },
        Strategy::Balanced => StrategyParams {
            timeout_factor: 1.0,
            retry_factor: 1.0,
            parallel_factor: 0.8,
            cache_first: false,
        },
    }
}

impl ExecutionOptimizer {
    pub fn new(profiles: Arc<ProfileStore>, max_parallel: usize) -> Self {
        Self {
            profiles,
            max_parallel: max_parallel.max(1),
        }
    }

    /// Produce an optimized copy of the plan: same steps, updated priorities,
    /// timeouts, retry budgets, order, and `parallel` partitioning.
    /// `warm_steps` holds the ids of steps whose cache key is already warm.
    pub fn optimize(
        &self,
        mut plan: ExecutionPlan,
        strategy: Strategy,
        warm_steps: &HashSet<String>,
    ) -> ExecutionPlan {
        let params = params_for(strategy);
        let effective_max = ((self.max_parallel as f64) * params.parallel_factor)
            .floor()
            .max(1.0) as usize;

        for step in &mut plan.steps {
            step.timeout = step.timeout.mul_f64(params.timeout_factor);
            step.retries = ((f64::from(step.retries) * params.retry_factor).round() as u32).max(1);
        }

        let ranks: HashMap<String, f64> = plan
            .steps
            .iter()
            .map(|step| {
                let mut rank = self.rank(step, strategy);
                if params.cache_first && warm_steps.contains(&step.id) {
                    rank -= 1000.0;
                }
                (step.id.clone(), rank)
            })
            .collect();

        self.assign_priorities(&mut plan.steps, strategy, &ranks);

        let order = topological_order(&plan, &ranks);
        let index: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        plan.steps.sort_by_key(|s| index[s.id.as_str()]);
        plan.parallel = build_groups(&plan, &order, effective_max);
        plan.optimized_for = strategy;

        debug!(
            "optimized plan {}: strategy={}, {} groups, max {} wide",
            plan.id,
            strategy,
            plan.parallel.len(),
            effective_max
        );
        plan
    }

    /// Lower rank schedules earlier.
    fn rank(&self, step: &ExecutionStep, strategy: Strategy) -> f64 {
        let profile = self.profiles.profile_for(&step.tool_name);
        let latency = profile.average_latency.as_secs_f64();
        match strategy {
            Strategy::Speed => latency,
            Strategy::Reliability => -profile.success_rate,
            Strategy::Cost => step.cost_weight,
            Strategy::Balanced => {
                let speed_score = 1.0 / (1.0 + latency);
                let cost_score = 1.0 / (1.0 + step.cost_weight);
                -(0.4 * speed_score + 0.35 * profile.success_rate + 0.25 * cost_score)
            }
        }
    }

    /// Set step priorities: 0 for normally-parallel steps, unique ascending
    /// values for steps a strategy forces sequential.
    fn assign_priorities(
        &self,
        steps: &mut [ExecutionStep],
        strategy: Strategy,
        ranks: &HashMap<String, f64>,
    ) {
        let mut sequential = 0;
        let mut order: Vec<usize> = (0..steps.len()).collect();
        order.sort_by(|&a, &b| {
            ranks[&steps[a].id]
                .partial_cmp(&ranks[&steps[b].id])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for i in order {
            let step = &mut steps[i];
            let force_sequential = match strategy {
                Strategy::Reliability => {
                    matches!(step.tool_name.as_str(), "write_file" | "exec")
                }
                Strategy::Cost => step.cost_weight > EXPENSIVE_COST,
                _ => false,
            };
            step.priority = if force_sequential {
                sequential += 1;
                SEQUENTIAL_BASE + sequential
            } else {
                0
            };
        }
    }
}

/// Kahn's algorithm with a rank-ordered ready set, so the topological order
/// follows the strategy's preference wherever dependencies allow.
fn topological_order(plan: &ExecutionPlan, ranks: &HashMap<String, f64>) -> Vec<String> {
    let priorities: HashMap<&str, i32> =
        plan.steps.iter().map(|s| (s.id.as_str(), s.priority)).collect();
    let mut in_degree: HashMap<&str, usize> =
        plan.steps.iter().map(|s| (s.id.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for (to, froms) in &plan.dependencies {
        if let Some(degree) = in_degree.get_mut(to.as_str()) {
            *degree = froms.len();
        }
        for from in froms {
            dependents
                .entry(from.as_str())
                .or_default()
                .push(to.as_str());
        }
    }

    let mut ready: Vec<&str> = plan
        .steps
        .iter()
        .map(|s| s.id.as_str())
        .filter(|id| in_degree[id] == 0)
        .collect();
    let mut order = Vec::with_capacity(plan.steps.len());

    while !ready.is_empty() {
        // Pick the best-ranked ready step: lowest priority bucket first,
        // then lowest strategy rank.
        let best = ready
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (priorities[*a], ranks[*a as &str])
                    .partial_cmp(&(priorities[*b], ranks[*b as &str]))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i)
            .expect("ready set is non-empty");
        let id = ready.swap_remove(best);
        order.push(id.to_string());
        for &next in dependents.get(id).map(Vec::as_slice).unwrap_or_default() {
            let degree = in_degree.get_mut(next).expect("unknown dependency target");
            *degree -= 1;
            if *degree == 0 {
                ready.push(next);
            }
        }
    }
    order
}

/// Partition a topological order into parallel groups. A step opens a new
/// group when its priority bucket changes, when the group is full, or when
/// one of its prerequisites sits in the current group.
fn build_groups(plan: &ExecutionPlan, order: &[String], effective_max: usize) -> Vec<Vec<String>> {
    let priorities: HashMap<&str, i32> =
        plan.steps.iter().map(|s| (s.id.as_str(), s.priority)).collect();
    let mut groups: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_priority = 0;

    for id in order {
        let priority = priorities[id.as_str()];
        let depends_on_current = plan
            .dependencies
            .get(id)
            .is_some_and(|deps| current.iter().any(|c| deps.contains(c)));
        let full = current.len() >= effective_max;
        if !current.is_empty() && (priority != current_priority || full || depends_on_current) {
            groups.push(std::mem::take(&mut current));
        }
        current_priority = priority;
        current.push(id.clone());
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}
