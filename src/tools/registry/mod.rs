use crate::tools::base::{
    DiscoveryData, ErrorDetails, ExecutionContext, Tool, ToolResult, ValidationReport,
};
use anyhow::Result;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Indexes tool handlers by name and dispatches invocations through
/// enablement checks, parameter validation, and a guarded execution path.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Names allowed at dispatch time. `None` means every registered tool.
    enabled: Option<HashSet<String>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            enabled: None,
        }
    }

    /// Restrict dispatch to the given tool names.
    pub fn with_enabled<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tools: HashMap::new(),
            enabled: Some(names.into_iter().map(Into::into).collect()),
        }
    }

    pub fn set_enabled<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enabled = Some(names.into_iter().map(Into::into).collect());
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if name.is_empty() || name.len() > 256 || name.chars().any(char::is_control) {
            warn!(
                "tool registry: rejecting tool with invalid name (len={})",
                name.len()
            );
            return;
        }
        if self.tools.contains_key(&name) {
            warn!("tool registry: overwriting duplicate tool '{}'", name);
        }
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Returns a sorted list of all registered tool names.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    fn is_enabled(&self, name: &str) -> bool {
        self.enabled.as_ref().is_none_or(|set| set.contains(name))
    }

    fn enabled_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tools
            .keys()
            .filter(|n| self.is_enabled(n))
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Execute a tool by name:
    /// 1. Reject disabled or unknown tools with a structured error result
    /// 2. Run the tool's parameter validator when it has one
    /// 3. Run the handler in a spawned task with timeout and panic isolation
    pub async fn execute(
        &self,
        name: &str,
        params: Value,
        ctx: &ExecutionContext,
    ) -> Result<ToolResult> {
        if !self.is_enabled(name) {
            return Ok(ToolResult::error(format!("Tool '{}' is not enabled", name))
                .with_details(ErrorDetails {
                    kind: "validation".to_string(),
                    parameter: Some("name".to_string()),
                    provided_value: Some(Value::String(name.to_string())),
                    available_values: self.enabled_names(),
                    ..ErrorDetails::default()
                }));
        }

        let Some(tool) = self.tools.get(name).cloned() else {
            return Ok(ToolResult::error(format!("Tool '{}' not found", name))
                .with_details(ErrorDetails {
                    kind: "not_found".to_string(),
                    parameter: Some("name".to_string()),
                    provided_value: Some(Value::String(name.to_string())),
                    available_values: self.tool_names(),
                    ..ErrorDetails::default()
                }));
        };

        if let Some(validator) = tool.validator() {
            let report = validator.validate_parameters(&params, ctx);
            if !report.valid {
                return Ok(validation_failure(name, &report));
            }
        }

        debug!("dispatching '{}' with arguments: {}", name, params);
        let result = self.run_guarded(tool, params, ctx).await?;
        if result.is_error {
            warn!("'{}' returned an error result: {}", name, result.content);
        } else {
            info!("'{}' produced {} chars", name, result.content.len());
        }
        Ok(result)
    }

    /// Handlers run in their own task so a panicking or runaway tool cannot
    /// take the dispatch loop down with it. A handler that outlives its
    /// per-tool budget is aborted.
    async fn run_guarded(
        &self,
        tool: Arc<dyn Tool>,
        params: Value,
        ctx: &ExecutionContext,
    ) -> Result<ToolResult> {
        let name = tool.name().to_string();
        let budget = tool.execution_timeout();
        let ctx = ctx.clone();

        let mut task = tokio::task::spawn(async move { tool.execute(params, &ctx).await });

        let joined = match tokio::time::timeout(budget, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                task.abort();
                warn!("'{}' exceeded its {}s budget, aborting", name, budget.as_secs());
                return Ok(ToolResult::error(format!(
                    "'{}' gave no result within {}s",
                    name,
                    budget.as_secs()
                )));
            }
        };

        match joined {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => {
                let payload = join_err.into_panic();
                let cause = payload
                    .downcast_ref::<&str>()
                    .copied()
                    .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                    .unwrap_or("opaque panic payload");
                error!("'{}' panicked mid-execution: {}", name, cause);
                Ok(ToolResult::error(format!(
                    "'{}' aborted on a panic: {}",
                    name, cause
                )))
            }
            Err(_) => Err(anyhow::anyhow!("'{}' task went away before finishing", name)),
        }
    }

    /// Produce the tool's parameter schema enriched with per-parameter
    /// examples, validation hints, and discovery-derived enums (live
    /// channels, workspace paths).
    pub fn enhanced_schema(&self, name: &str, discovery: &DiscoveryData) -> Option<Value> {
        let tool = self.tools.get(name)?;
        let mut schema = tool.parameters();
        let hints = tool.schema_hints();
        if hints.is_empty() {
            return Some(schema);
        }

        let Some(props) = schema
            .get_mut("properties")
            .and_then(Value::as_object_mut)
        else {
            return Some(schema);
        };

        for (param, hint) in hints {
            let Some(prop) = props.get_mut(&param).and_then(Value::as_object_mut) else {
                continue;
            };
            if !hint.examples.is_empty() {
                prop.insert("examples".to_string(), serde_json::json!(hint.examples));
            }
            if !hint.validation_hints.is_empty() {
                prop.insert(
                    "validationHints".to_string(),
                    serde_json::json!(hint.validation_hints),
                );
            }
            if let Some(kind) = hint.discovery {
                let values = discovery.values_for(kind);
                if hint.enum_from_discovery && !values.is_empty() {
                    prop.insert("enum".to_string(), serde_json::json!(values));
                } else if !values.is_empty() {
                    prop.insert("availableValues".to_string(), serde_json::json!(values));
                }
            }
        }
        Some(schema)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl crate::exec::ToolExecutor for ToolRegistry {
    async fn execute_tool(
        &self,
        name: &str,
        params: &Value,
        ctx: &ExecutionContext,
    ) -> Result<ToolResult> {
        self.execute(name, params.clone(), ctx).await
    }
}

/// Build a rich error result from a failed validation report.
fn validation_failure(tool: &str, report: &ValidationReport) -> ToolResult {
    let first = report.errors.first();
    let message = first.map_or_else(
        || format!("Tool '{}' rejected the parameters", tool),
        |e| format!("Tool '{}': {}: {}", tool, e.parameter, e.message),
    );
    let details = first.map(|e| ErrorDetails {
        kind: if e.error_type.is_empty() {
            "validation".to_string()
        } else {
            e.error_type.clone()
        },
        parameter: Some(e.parameter.clone()),
        provided_value: e.provided_value.clone(),
        available_values: e.available_values.clone(),
        examples: e.examples.clone(),
        suggestions: report.suggestions.clone(),
        context: e.discovery_hint.clone(),
    });
    let mut result = ToolResult::error(message);
    if let Some(details) = details {
        result = result.with_details(details);
    }
    result
}
