use crate::search::SearchRouter;
use crate::search::types::{SearchParameters, VALID_FRESHNESS};
use crate::tools::base::{
    ExecutionContext, ParamHints, ParameterValidator, Tool, ToolResult, ValidationError,
    ValidationReport,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry-facing web search handler. All provider selection, fallback,
/// and caching concerns live behind the router.
pub struct WebSearchTool {
    router: Arc<SearchRouter>,
    default_results: u32,
}

impl WebSearchTool {
    pub fn new(router: Arc<SearchRouter>, default_results: u32) -> Self {
        Self {
            router,
            default_results,
        }
    }

    fn parse_params(&self, params: &Value) -> SearchParameters {
        let mut search = SearchParameters::new(params["query"].as_str().unwrap_or_default());
        search.count = params["count"]
            .as_u64()
            .map_or(self.default_results, |n| n as u32);
        if let Some(country) = params["country"].as_str() {
            search.country = country.to_string();
        }
        if let Some(freshness) = params["freshness"].as_str() {
            search.freshness = freshness.to_string();
        }
        search
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web. Returns titles, URLs, and snippets. Provider selection and fallback are automatic."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                },
                "count": {
                    "type": "integer",
                    "description": "Results (1-10)",
                    "minimum": 1,
                    "maximum": 10
                },
                "country": {
                    "type": "string",
                    "description": "Two-letter country code biasing results"
                },
                "freshness": {
                    "type": "string",
                    "enum": ["", "pd", "pw", "pm", "py"],
                    "description": "Recency window: past day/week/month/year"
                }
            },
            "required": ["query"]
        })
    }

    fn validator(&self) -> Option<&dyn ParameterValidator> {
        Some(self)
    }

    fn schema_hints(&self) -> HashMap<String, ParamHints> {
        let mut hints = HashMap::new();
        hints.insert(
            "query".to_string(),
            ParamHints {
                examples: vec![
                    "rust tokio tutorial".to_string(),
                    "weather in berlin".to_string(),
                ],
                validation_hints: vec!["must not be empty".to_string()],
                ..ParamHints::default()
            },
        );
        hints.insert(
            "freshness".to_string(),
            ParamHints {
                examples: vec!["pd".to_string(), "pw".to_string()],
                validation_hints: vec!["empty means any time".to_string()],
                ..ParamHints::default()
            },
        );
        hints
    }

    async fn execute(&self, params: Value, _ctx: &ExecutionContext) -> anyhow::Result<ToolResult> {
        let search = self.parse_params(&params);
        match self.router.search(&search).await {
            Ok(response) => {
                if response.results.is_empty() {
                    return Ok(ToolResult::new(format!("No results for: {}", search.query)));
                }
                let mut lines = vec![format!("Results for: {}\n", search.query)];
                for (i, item) in response.results.iter().enumerate() {
                    lines.push(format!("{}. {}\n   {}", i + 1, item.title, item.url));
                    if !item.description.is_empty() {
                        lines.push(format!("   {}", item.description));
                    }
                }
                let data = serde_json::json!({
                    "results": response.results,
                    "provider": response.provider,
                    "cached": response.cached,
                    "total": response.total,
                });
                Ok(ToolResult::new(lines.join("\n")).with_data(data))
            }
            Err(e) => Ok(ToolResult::error(format!("search failed: {}", e))),
        }
    }
}

impl ParameterValidator for WebSearchTool {
    fn validate_parameters(&self, params: &Value, _ctx: &ExecutionContext) -> ValidationReport {
        let mut errors = Vec::new();
        if params["query"].as_str().is_none_or(|q| q.trim().is_empty()) {
            errors.push(ValidationError {
                parameter: "query".to_string(),
                message: "query must be a non-empty string".to_string(),
                provided_value: Some(params["query"].clone()),
                examples: vec!["rust tokio tutorial".to_string()],
                error_type: "validation".to_string(),
                ..ValidationError::default()
            });
        }
        if let Some(freshness) = params["freshness"].as_str()
            && !VALID_FRESHNESS.contains(&freshness)
        {
            errors.push(ValidationError {
                parameter: "freshness".to_string(),
                message: "unknown freshness window".to_string(),
                provided_value: Some(params["freshness"].clone()),
                available_values: VALID_FRESHNESS.iter().map(ToString::to_string).collect(),
                error_type: "validation".to_string(),
                ..ValidationError::default()
            });
        }
        if errors.is_empty() {
            ValidationReport::ok()
        } else {
            ValidationReport::invalid(errors)
        }
    }
}
