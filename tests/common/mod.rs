// Shared test helpers — not all items used by every test binary.
#![allow(unused)]

use async_trait::async_trait;
use serde_json::{Value, json};
use shunt::tools::base::{ExecutionContext, Tool, ToolResult};
use shunt::tools::ToolRegistry;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A stub tool that records invocations, optionally sleeps, and fails its
/// first `fail_times` calls with a configurable error message.
pub struct StubTool {
    pub name: String,
    pub delay: Duration,
    pub fail_times: usize,
    pub fail_message: String,
    pub calls: Arc<AtomicUsize>,
    pub log: Arc<std::sync::Mutex<Vec<String>>>,
}

impl StubTool {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            delay: Duration::ZERO,
            fail_times: 0,
            fail_message: "stub failure".to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
            log: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, times: usize, message: &str) -> Self {
        self.fail_times = times;
        self.fail_message = message.to_string();
        self
    }

    pub fn shared_log(mut self, log: Arc<std::sync::Mutex<Vec<String>>>) -> Self {
        self.log = log;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for StubTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "test stub"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {"query": {"type": "string"}}})
    }

    async fn execute(&self, params: Value, _ctx: &ExecutionContext) -> anyhow::Result<ToolResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.log
            .lock()
            .unwrap()
            .push(format!("start:{}", self.name));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.log.lock().unwrap().push(format!("end:{}", self.name));
        if call < self.fail_times {
            return Ok(ToolResult::error(self.fail_message.clone()));
        }
        let echo = params["query"].as_str().unwrap_or_default();
        Ok(ToolResult::new(format!(
            "{} completed for '{}' with plenty of content to satisfy cache policies \
             that require a minimum body size before they keep anything around",
            self.name, echo
        )))
    }
}

/// Registry preloaded with well-known stub tools.
pub fn stub_registry(tools: Vec<StubTool>) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(Arc::new(tool));
    }
    Arc::new(registry)
}
