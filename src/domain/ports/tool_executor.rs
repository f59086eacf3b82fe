//! Tool executor port (spec §4.6 "execute the tool" step of the guard
//! pipeline).
//!
//! Grounded on `domain::ports::provider_adapter::ProviderAdapter`: the tool
//! registry/guard are wire-format-agnostic, the same way the provider
//! router never inspects a provider's HTTP shape. A real deployment plugs
//! in handlers per tool name (shell, file I/O, HTTP fetch); this kernel
//! ships only the mock used for demo wiring and tests.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::KernelResult;

/// Executes one already-authorized tool call and returns its raw output.
/// Implementations never see an unauthorized call: `ToolGuard::authorize`
/// always runs first.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, tool_name: &str, parameters: &Value) -> KernelResult<Value>;
}
