//! Tool invocation guard: validation, confinement, rate limiting and
//! approval gating before any tool call reaches its handler (spec §4.6 / C6).
//!
//! Grounded on the teacher's `infrastructure::logging::secret_scrubbing`
//! redaction approach (apply the same redact-before-persist discipline to
//! tool parameters) and the rate limiter/circuit breaker service shape
//! already established in this module for the guard's own state.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use crate::domain::errors::{KernelError, KernelResult};
use crate::domain::models::agent_contract::AgentContractRegistry;
use crate::domain::models::tool::{RatePolicy as ToolRatePolicy, ToolRegistry};
use crate::domain::models::ApprovalRequest;
use crate::domain::ports::ApprovalRepository;
use crate::services::rate_limiter::{RateLimitRule, RateLimiter};

/// Decision returned by the guard for a single tool call.
pub enum GuardDecision {
    /// The call may proceed immediately.
    Allowed,
    /// A high-risk call is parked pending a human decision. The caller
    /// should surface `approval_id` to the operator and fail the task with
    /// `KernelError::PendingApproval` until it resolves.
    NeedsApproval { approval_id: uuid::Uuid },
}

/// Redact any forbidden-parameter keys (and common secret-shaped keys)
/// from a tool's parameters before they are logged or persisted.
pub fn redact_parameters(parameters: &Value, forbidden: &HashSet<String>) -> Value {
    match parameters {
        Value::Object(map) => {
            let redacted = map
                .iter()
                .map(|(k, v)| {
                    if forbidden.contains(k) || is_secret_shaped_key(k) {
                        (k.clone(), Value::String("[redacted]".to_string()))
                    } else {
                        (k.clone(), redact_parameters(v, forbidden))
                    }
                })
                .collect();
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| redact_parameters(v, forbidden)).collect()),
        other => other.clone(),
    }
}

fn is_secret_shaped_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    ["password", "secret", "token", "api_key", "apikey", "credential"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// Check that every path-valued parameter resolves under one of the tool's
/// allowed path prefixes, rejecting traversal attempts (spec §4.6
/// "confined to a configured allowlist").
fn check_path_confinement(parameters: &Value, allowed_prefixes: &[String]) -> KernelResult<()> {
    if allowed_prefixes.is_empty() {
        return Ok(());
    }
    let mut violations = Vec::new();
    collect_path_violations(parameters, allowed_prefixes, &mut violations);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(KernelError::ContractViolation(format!(
            "path parameter(s) outside allowed prefixes: {}",
            violations.join(", ")
        )))
    }
}

fn collect_path_violations(value: &Value, allowed_prefixes: &[String], violations: &mut Vec<String>) {
    match value {
        Value::String(s) if looks_like_path(s) => {
            let normalized = normalize_path(s);
            if normalized.contains("..") || !allowed_prefixes.iter().any(|p| normalized.starts_with(p.as_str())) {
                violations.push(s.clone());
            }
        }
        Value::Object(map) => {
            for v in map.values() {
                collect_path_violations(v, allowed_prefixes, violations);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_path_violations(v, allowed_prefixes, violations);
            }
        }
        _ => {}
    }
}

fn looks_like_path(s: &str) -> bool {
    s.starts_with('/') || s.starts_with("./") || s.starts_with("../")
}

fn normalize_path(s: &str) -> String {
    s.replace('\\', "/")
}

/// Gates tool invocations through validation, path confinement, rate
/// limiting and human approval.
pub struct ToolGuard {
    tools: Arc<ToolRegistry>,
    contracts: Arc<AgentContractRegistry>,
    rate_limiter: Arc<RateLimiter>,
    approvals: Arc<dyn ApprovalRepository>,
    approval_ttl: chrono::Duration,
}

impl ToolGuard {
    pub fn new(
        tools: Arc<ToolRegistry>,
        contracts: Arc<AgentContractRegistry>,
        rate_limiter: Arc<RateLimiter>,
        approvals: Arc<dyn ApprovalRepository>,
        approval_ttl: chrono::Duration,
    ) -> Self {
        Self { tools, contracts, rate_limiter, approvals, approval_ttl }
    }

    /// Run the full gate pipeline for one call. On `NeedsApproval`, the
    /// caller must halt this tool call and retry once the approval resolves
    /// (spec §4.6 approval semantics: same `(agent_id, tool, parameter_hash)`
    /// reuses the existing request rather than creating a duplicate).
    pub async fn authorize(
        &self,
        agent_id: &str,
        principal: &str,
        tool_name: &str,
        parameters: &Value,
        parameter_hash: &str,
    ) -> KernelResult<GuardDecision> {
        let tool = self.tools.get(tool_name).ok_or_else(|| KernelError::UnknownTool(tool_name.to_string()))?;

        let contract = self
            .contracts
            .get(agent_id)
            .ok_or_else(|| KernelError::AgentNotFound(agent_id.to_string()))?;
        if !contract.allows_capability(&tool.capability) {
            return Err(KernelError::ContractViolation(format!(
                "agent '{agent_id}' is not authorized for capability '{}' required by tool '{tool_name}'",
                tool.capability
            )));
        }

        for forbidden in &tool.forbidden_parameters {
            if parameters.get(forbidden).is_some() {
                return Err(KernelError::ContractViolation(format!(
                    "tool '{tool_name}' forbids parameter '{forbidden}'"
                )));
            }
        }

        check_path_confinement(parameters, &tool.allowed_path_prefixes)?;

        let ToolRatePolicy { limit, window_secs } = tool.rate_policy;
        self.rate_limiter
            .admit(principal, tool_name, RateLimitRule { limit, window: std::time::Duration::from_secs(window_secs) })
            .await?;

        if !tool.requires_approval {
            return Ok(GuardDecision::Allowed);
        }

        if let Some(mut existing) = self.approvals.find_by_key(agent_id, tool_name, parameter_hash).await? {
            return match existing.state {
                crate::domain::models::ApprovalState::Approved => Ok(GuardDecision::Allowed),
                crate::domain::models::ApprovalState::Pending => {
                    if existing.is_expired(chrono::Utc::now()) {
                        existing.state = crate::domain::models::ApprovalState::Expired;
                        self.approvals.update(&existing).await?;
                        Err(KernelError::ApprovalExpired { approval_id: existing.id })
                    } else {
                        Ok(GuardDecision::NeedsApproval { approval_id: existing.id })
                    }
                }
                crate::domain::models::ApprovalState::Rejected | crate::domain::models::ApprovalState::Expired => {
                    Err(KernelError::ContractViolation(format!(
                        "approval for tool '{tool_name}' was {:?}",
                        existing.state
                    )))
                }
            };
        }

        let redacted = redact_parameters(parameters, &tool.forbidden_parameters);
        let request = ApprovalRequest::new(agent_id, tool_name, parameter_hash, redacted, self.approval_ttl);
        let approval_id = request.id;
        self.approvals.create(&request).await?;
        Ok(GuardDecision::NeedsApproval { approval_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_forbidden_and_secret_shaped_keys() {
        let params = serde_json::json!({"path": "/tmp/x", "api_key": "sk-123", "system_path": "/etc"});
        let forbidden = HashSet::from(["system_path".to_string()]);
        let redacted = redact_parameters(&params, &forbidden);
        assert_eq!(redacted["api_key"], serde_json::json!("[redacted]"));
        assert_eq!(redacted["system_path"], serde_json::json!("[redacted]"));
        assert_eq!(redacted["path"], serde_json::json!("/tmp/x"));
    }

    #[test]
    fn rejects_path_traversal_outside_allowlist() {
        let params = serde_json::json!({"file": "/workspace/../etc/passwd"});
        let err = check_path_confinement(&params, &["/workspace".to_string()]).unwrap_err();
        assert!(matches!(err, KernelError::ContractViolation(_)));
    }

    #[test]
    fn allows_path_within_allowlist() {
        let params = serde_json::json!({"file": "/workspace/reports/out.txt"});
        assert!(check_path_confinement(&params, &["/workspace".to_string()]).is_ok());
    }
}
