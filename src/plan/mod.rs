pub mod analyzer;
pub mod optimizer;
pub mod planner;
pub mod profiles;
pub mod types;

pub use analyzer::{DependencyAnalyzer, DependencyReport};
pub use optimizer::ExecutionOptimizer;
pub use planner::ExecutionPlanner;
pub use profiles::{ProfileStore, ToolProfile};
pub use types::{
    EstimatedMetrics, ExecutionPlan, ExecutionStep, PlanResult, StepResult, Strategy, ToolCall,
};
