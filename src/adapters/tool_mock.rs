//! Mock tool executor for demo wiring and tests (spec §4.6 "execute the
//! tool" step — a real deployment plugs in per-tool handlers behind the
//! same `ToolExecutor` trait without the guard changing).
//!
//! Grounded on `adapters::provider_mock::MockProviderAdapter`'s
//! canned-outcome/queued-override shape, narrowed to a single result value
//! instead of a provider response.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::domain::errors::{KernelError, KernelResult};
use crate::domain::ports::ToolExecutor;

/// Executes every tool call with a canned per-tool-name result, falling
/// back to echoing the call's parameters when no override is registered.
pub struct MockToolExecutor {
    results: RwLock<HashMap<String, Value>>,
}

impl Default for MockToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockToolExecutor {
    pub fn new() -> Self {
        Self { results: RwLock::new(HashMap::new()) }
    }

    pub async fn set_result(&self, tool_name: impl Into<String>, result: Value) {
        self.results.write().await.insert(tool_name.into(), result);
    }
}

#[async_trait]
impl ToolExecutor for MockToolExecutor {
    async fn execute(&self, tool_name: &str, parameters: &Value) -> KernelResult<Value> {
        if let Some(result) = self.results.read().await.get(tool_name) {
            return Ok(result.clone());
        }
        Ok(serde_json::json!({"tool": tool_name, "echoed_parameters": parameters, "status": "ok"}))
    }
}

/// A `ToolExecutor` whose every call fails, for testing the guard's
/// record-audit-entry-on-failure path (spec §4.6 step 7).
pub struct FailingToolExecutor {
    pub reason: String,
}

#[async_trait]
impl ToolExecutor for FailingToolExecutor {
    async fn execute(&self, _tool_name: &str, _parameters: &Value) -> KernelResult<Value> {
        Err(KernelError::ProviderTransient(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_parameters_with_no_override() {
        let executor = MockToolExecutor::new();
        let params = serde_json::json!({"path": "/workspace/a.txt"});
        let result = executor.execute("file_write", &params).await.unwrap();
        assert_eq!(result["tool"], serde_json::json!("file_write"));
    }

    #[tokio::test]
    async fn registered_override_takes_precedence() {
        let executor = MockToolExecutor::new();
        executor.set_result("file_write", serde_json::json!({"bytes_written": 42})).await;
        let result = executor.execute("file_write", &serde_json::json!({})).await.unwrap();
        assert_eq!(result["bytes_written"], serde_json::json!(42));
    }
}
