//! Approval-gate scenario: a high-risk tool call parks behind a
//! `PendingApproval` until a human decides, and re-invocation with the
//! same (agent, tool, parameter-hash) reuses that decision.

use std::collections::HashSet;
use std::sync::Arc;

use amas_kernel::adapters::sqlite::{create_migrated_test_pool, SqliteApprovalRepository};
use amas_kernel::domain::models::agent_contract::{
    AgentContract, AgentContractRegistry, ExecutionConstraints, QualityGates,
};
use amas_kernel::domain::models::tool::{RatePolicy, ToolCostModel, ToolDefinition, ToolRegistry, RiskLevel};
use amas_kernel::domain::ports::ApprovalRepository;
use amas_kernel::services::rate_limiter::{InMemoryRateLimiter, RateLimiter};
use amas_kernel::services::tool_guard::{GuardDecision, ToolGuard};

fn file_write_tool() -> ToolDefinition {
    ToolDefinition {
        name: "file_write".to_string(),
        capability: "file_write".to_string(),
        risk_level: RiskLevel::High,
        requires_approval: true,
        parameter_schema: serde_json::json!({"type": "object"}),
        forbidden_parameters: HashSet::new(),
        allowed_path_prefixes: vec!["/workspace".to_string()],
        rate_policy: RatePolicy { limit: 100, window_secs: 60 },
        cost_model: ToolCostModel::default(),
    }
}

async fn build_guard() -> (ToolGuard, Arc<SqliteApprovalRepository>) {
    let pool = create_migrated_test_pool().await.expect("migrated test pool");
    let approvals = Arc::new(SqliteApprovalRepository::new(pool));
    let rate_limiter = Arc::new(RateLimiter::InMemory(InMemoryRateLimiter::new()));
    let tools = Arc::new(ToolRegistry::new(vec![file_write_tool()]));
    let contracts = Arc::new(AgentContractRegistry::new(vec![AgentContract {
        agent_id: "writer".to_string(),
        role_tag: "writer".to_string(),
        input_schema: serde_json::json!({"type": "object"}),
        output_schema: serde_json::json!({"type": "object"}),
        allowed_capabilities: HashSet::from(["file_write".to_string()]),
        constraints: ExecutionConstraints::default(),
        quality_gates: QualityGates::default(),
        rate_policy: std::collections::HashMap::new(),
    }]));
    let guard = ToolGuard::new(tools, contracts, rate_limiter, approvals.clone(), chrono::Duration::minutes(10));
    (guard, approvals)
}

#[tokio::test]
async fn first_invocation_parks_pending_and_reinvocation_after_approval_executes() {
    let (guard, approvals) = build_guard().await;
    let params = serde_json::json!({"path": "/workspace/report.txt"});
    let hash = "hash-a";

    let first = guard.authorize("writer", "alice", "file_write", &params, hash).await.expect("authorize");
    let approval_id = match first {
        GuardDecision::NeedsApproval { approval_id } => approval_id,
        GuardDecision::Allowed => panic!("first invocation of a high-risk tool must not be allowed immediately"),
    };

    let mut request = approvals.get(approval_id).await.unwrap().expect("approval request persisted");
    request.decide(true, "approver-bob");
    approvals.update(&request).await.unwrap();

    let second = guard.authorize("writer", "alice", "file_write", &params, hash).await.expect("authorize");
    assert!(matches!(second, GuardDecision::Allowed));
}

#[tokio::test]
async fn agent_without_capability_is_denied_before_approval_gate() {
    let (guard, _approvals) = build_guard().await;
    let params = serde_json::json!({"path": "/workspace/report.txt"});

    let err = guard
        .authorize("reader-only", "alice", "file_write", &params, "hash-c")
        .await
        .expect_err("agent lacking the file_write capability must be denied");
    assert!(matches!(err, amas_kernel::domain::errors::KernelError::ContractViolation(_)));
}

#[tokio::test]
async fn expired_pending_approval_is_marked_expired_and_rejected() {
    let (guard, approvals) = build_guard().await;
    let params = serde_json::json!({"path": "/workspace/report.txt"});
    let hash = "hash-d";

    let first = guard.authorize("writer", "alice", "file_write", &params, hash).await.expect("authorize");
    let approval_id = match first {
        GuardDecision::NeedsApproval { approval_id } => approval_id,
        GuardDecision::Allowed => panic!("first invocation of a high-risk tool must not be allowed immediately"),
    };

    let mut request = approvals.get(approval_id).await.unwrap().expect("approval request persisted");
    request.expires_at = chrono::Utc::now() - chrono::Duration::minutes(1);
    approvals.update(&request).await.unwrap();

    let err = guard
        .authorize("writer", "alice", "file_write", &params, hash)
        .await
        .expect_err("a pending approval past its TTL must not be re-issued as NeedsApproval");
    assert!(matches!(err, amas_kernel::domain::errors::KernelError::ApprovalExpired { .. }));

    let reloaded = approvals.get(approval_id).await.unwrap().expect("approval still present");
    assert!(matches!(reloaded.state, amas_kernel::domain::models::ApprovalState::Expired));
}

#[tokio::test]
async fn different_parameters_create_a_new_approval_request() {
    let (guard, _approvals) = build_guard().await;
    let params_a = serde_json::json!({"path": "/workspace/a.txt"});
    let params_b = serde_json::json!({"path": "/workspace/b.txt"});

    let first = guard.authorize("writer", "alice", "file_write", &params_a, "hash-a").await.expect("authorize");
    let second = guard.authorize("writer", "alice", "file_write", &params_b, "hash-b").await.expect("authorize");

    let (GuardDecision::NeedsApproval { approval_id: id_a }, GuardDecision::NeedsApproval { approval_id: id_b }) = (first, second) else {
        panic!("both distinct-parameter invocations should park pending approval");
    };
    assert_ne!(id_a, id_b);
}
