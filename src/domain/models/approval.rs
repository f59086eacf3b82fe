//! ApprovalRequest domain model (spec §3 "ApprovalRequest", §4.6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Pending,
    Approved,
    Rejected,
    Expired,
}

/// A request to approve a single high-risk tool call, keyed by
/// `(agent_id, tool, parameter_hash)` so identical re-invocations reuse the
/// same approval (spec §4.6 "Approval semantics").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub agent_id: String,
    pub tool_name: String,
    pub parameter_hash: String,
    /// Parameters with secret-valued fields redacted before persistence.
    pub parameters_redacted: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub state: ApprovalState,
    pub decided_at: Option<DateTime<Utc>>,
    pub approver_id: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl ApprovalRequest {
    pub fn new(
        agent_id: impl Into<String>,
        tool_name: impl Into<String>,
        parameter_hash: impl Into<String>,
        parameters_redacted: serde_json::Value,
        ttl: chrono::Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            tool_name: tool_name.into(),
            parameter_hash: parameter_hash.into(),
            parameters_redacted,
            created_at: now,
            state: ApprovalState::Pending,
            decided_at: None,
            approver_id: None,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.state == ApprovalState::Pending && now > self.expires_at
    }

    pub fn decide(&mut self, approved: bool, approver_id: impl Into<String>) {
        self.state = if approved { ApprovalState::Approved } else { ApprovalState::Rejected };
        self.decided_at = Some(Utc::now());
        self.approver_id = Some(approver_id.into());
    }
}
