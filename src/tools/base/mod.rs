use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Structured detail attached to validation and lookup failures so a
/// model-driven caller can self-correct instead of retrying blindly.
#[derive(Debug, Clone, Default)]
pub struct ErrorDetails {
    /// Error class: "validation", "not_found", "permission", ...
    pub kind: String,
    pub parameter: Option<String>,
    pub provided_value: Option<Value>,
    pub available_values: Vec<String>,
    pub examples: Vec<String>,
    pub suggestions: Vec<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
    /// Structured payload alongside the human-readable content.
    pub data: Option<Value>,
    pub error_details: Option<ErrorDetails>,
}

impl ToolResult {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
            data: None,
            error_details: None,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
            data: None,
            error_details: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.error_details = Some(details);
        self
    }

    /// Convert a `Result<String>` into a `ToolResult`, formatting errors with
    /// the given prefix (e.g. `"Search"`).
    pub fn from_result(result: anyhow::Result<String>, error_prefix: &str) -> Self {
        match result {
            Ok(content) => Self::new(content),
            Err(e) => Self::error(format!("{} error: {}", error_prefix, e)),
        }
    }
}

impl std::fmt::Display for ToolResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.content)
    }
}

/// Context passed to every tool execution: the originating channel, chat ID,
/// and any message metadata the adapter wants to thread through.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub channel: String,
    pub chat_id: String,
    pub metadata: HashMap<String, Value>,
}

/// One failed parameter in a validation report.
#[derive(Debug, Clone, Default)]
pub struct ValidationError {
    pub parameter: String,
    pub message: String,
    pub provided_value: Option<Value>,
    pub available_values: Vec<String>,
    pub examples: Vec<String>,
    pub discovery_hint: Option<String>,
    pub error_type: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub suggestions: Vec<String>,
}

impl ValidationReport {
    pub fn ok() -> Self {
        Self {
            valid: true,
            ..Self::default()
        }
    }

    pub fn invalid(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: false,
            errors,
            suggestions: Vec::new(),
        }
    }
}

/// Optional capability: tools that can pre-validate parameters and produce a
/// rich report instead of failing mid-execution.
pub trait ParameterValidator: Send + Sync {
    fn validate_parameters(&self, params: &Value, ctx: &ExecutionContext) -> ValidationReport;
}

/// What kind of runtime discovery feeds an enum for a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryKind {
    Channels,
    WorkspacePaths,
}

/// Per-parameter enhancement hints a tool can supply for schema enrichment.
#[derive(Debug, Clone, Default)]
pub struct ParamHints {
    pub examples: Vec<String>,
    pub validation_hints: Vec<String>,
    pub discovery: Option<DiscoveryKind>,
    /// Turn the discovery data into a JSON-schema enum for this parameter.
    pub enum_from_discovery: bool,
}

/// Runtime discovery data merged into enhanced schemas (supplied by the
/// embedding gateway, which knows the live channels and workspaces).
#[derive(Debug, Clone, Default)]
pub struct DiscoveryData {
    pub channels: Vec<String>,
    pub workspace_paths: Vec<String>,
}

impl DiscoveryData {
    pub fn values_for(&self, kind: DiscoveryKind) -> &[String] {
        match kind {
            DiscoveryKind::Channels => &self.channels,
            DiscoveryKind::WorkspacePaths => &self.workspace_paths,
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value; // JSON Schema

    async fn execute(&self, params: Value, ctx: &ExecutionContext) -> anyhow::Result<ToolResult>;

    /// Per-tool execution timeout. Overrides the registry-level default.
    fn execution_timeout(&self) -> Duration {
        Duration::from_secs(120)
    }

    /// Optional parameter pre-validation. Tools that implement
    /// [`ParameterValidator`] return `Some(self)` here.
    fn validator(&self) -> Option<&dyn ParameterValidator> {
        None
    }

    /// Optional per-parameter enhancement hints for schema enrichment.
    fn schema_hints(&self) -> HashMap<String, ParamHints> {
        HashMap::new()
    }

    fn to_schema(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name(),
                "description": self.description(),
                "parameters": self.parameters()
            }
        })
    }
}
