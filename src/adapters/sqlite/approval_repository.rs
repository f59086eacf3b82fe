//! SQLite implementation of `ApprovalRepository` (spec §4.6 approval gate).

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::KernelResult;
use crate::domain::models::approval::{ApprovalRequest, ApprovalState};
use crate::domain::ports::ApprovalRepository;

use super::{parse_datetime, parse_optional_datetime, parse_uuid};

#[derive(Clone)]
pub struct SqliteApprovalRepository {
    pool: SqlitePool,
}

impl SqliteApprovalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ApprovalRow {
    id: String,
    agent_id: String,
    tool_name: String,
    parameter_hash: String,
    parameters_redacted: String,
    created_at: String,
    state: String,
    decided_at: Option<String>,
    approver_id: Option<String>,
    expires_at: String,
}

impl TryFrom<ApprovalRow> for ApprovalRequest {
    type Error = crate::domain::errors::KernelError;

    fn try_from(row: ApprovalRow) -> KernelResult<Self> {
        Ok(ApprovalRequest {
            id: parse_uuid(&row.id)?,
            agent_id: row.agent_id,
            tool_name: row.tool_name,
            parameter_hash: row.parameter_hash,
            parameters_redacted: serde_json::from_str(&row.parameters_redacted)?,
            created_at: parse_datetime(&row.created_at)?,
            state: state_from_str(&row.state),
            decided_at: parse_optional_datetime(row.decided_at)?,
            approver_id: row.approver_id,
            expires_at: parse_datetime(&row.expires_at)?,
        })
    }
}

fn state_from_str(s: &str) -> ApprovalState {
    match s {
        "approved" => ApprovalState::Approved,
        "rejected" => ApprovalState::Rejected,
        "expired" => ApprovalState::Expired,
        _ => ApprovalState::Pending,
    }
}

fn state_as_str(s: ApprovalState) -> &'static str {
    match s {
        ApprovalState::Pending => "pending",
        ApprovalState::Approved => "approved",
        ApprovalState::Rejected => "rejected",
        ApprovalState::Expired => "expired",
    }
}

#[async_trait]
impl ApprovalRepository for SqliteApprovalRepository {
    async fn create(&self, approval: &ApprovalRequest) -> KernelResult<()> {
        let parameters_json = serde_json::to_string(&approval.parameters_redacted)?;

        sqlx::query(
            r#"INSERT INTO approval_requests (id, agent_id, tool_name, parameter_hash,
               parameters_redacted, created_at, state, decided_at, approver_id, expires_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(approval.id.to_string())
        .bind(&approval.agent_id)
        .bind(&approval.tool_name)
        .bind(&approval.parameter_hash)
        .bind(&parameters_json)
        .bind(approval.created_at.to_rfc3339())
        .bind(state_as_str(approval.state))
        .bind(approval.decided_at.map(|t| t.to_rfc3339()))
        .bind(&approval.approver_id)
        .bind(approval.expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> KernelResult<Option<ApprovalRequest>> {
        let row: Option<ApprovalRow> = sqlx::query_as("SELECT * FROM approval_requests WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(ApprovalRequest::try_from).transpose()
    }

    async fn update(&self, approval: &ApprovalRequest) -> KernelResult<()> {
        sqlx::query(
            r#"UPDATE approval_requests SET state = ?, decided_at = ?, approver_id = ?
               WHERE id = ?"#,
        )
        .bind(state_as_str(approval.state))
        .bind(approval.decided_at.map(|t| t.to_rfc3339()))
        .bind(&approval.approver_id)
        .bind(approval.id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_key(
        &self,
        agent_id: &str,
        tool_name: &str,
        parameter_hash: &str,
    ) -> KernelResult<Option<ApprovalRequest>> {
        let row: Option<ApprovalRow> = sqlx::query_as(
            "SELECT * FROM approval_requests WHERE agent_id = ? AND tool_name = ? AND parameter_hash = ?
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(agent_id)
        .bind(tool_name)
        .bind(parameter_hash)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ApprovalRequest::try_from).transpose()
    }
}
