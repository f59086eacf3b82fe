//! SQLite implementation of `ExecutionRecordRepository`, the append-only
//! audit log C13 rebuilds its rolling statistics from at startup.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::KernelResult;
use crate::domain::models::execution_record::ExecutionRecord;
use crate::domain::models::task::TaskState;
use crate::domain::ports::ExecutionRecordRepository;

use super::{parse_datetime, parse_uuid};

#[derive(Clone)]
pub struct SqliteExecutionRecordRepository {
    pool: SqlitePool,
}

impl SqliteExecutionRecordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ExecutionRecordRow {
    execution_id: String,
    agent_id: String,
    principal: String,
    trace_id: String,
    input_hash: String,
    tool_calls: String,
    provider_chain: String,
    duration_ms: i64,
    input_tokens: i64,
    output_tokens: i64,
    cost_usd: f64,
    final_state: String,
    recorded_at: String,
    task_type: String,
    quality_score: Option<f64>,
}

impl TryFrom<ExecutionRecordRow> for ExecutionRecord {
    type Error = crate::domain::errors::KernelError;

    fn try_from(row: ExecutionRecordRow) -> KernelResult<Self> {
        Ok(ExecutionRecord {
            execution_id: parse_uuid(&row.execution_id)?,
            agent_id: row.agent_id,
            principal: row.principal,
            trace_id: row.trace_id,
            input_hash: row.input_hash,
            tool_calls: serde_json::from_str(&row.tool_calls)?,
            provider_chain: serde_json::from_str(&row.provider_chain)?,
            duration_ms: row.duration_ms as u64,
            input_tokens: row.input_tokens as u64,
            output_tokens: row.output_tokens as u64,
            cost_usd: row.cost_usd,
            final_state: state_from_str(&row.final_state),
            recorded_at: parse_datetime(&row.recorded_at)?,
            task_type: row.task_type,
            quality_score: row.quality_score,
        })
    }
}

fn state_from_str(s: &str) -> TaskState {
    match s {
        "planning" => TaskState::Planning,
        "running" => TaskState::Running,
        "completed" => TaskState::Completed,
        "cancelled" => TaskState::Cancelled,
        _ => TaskState::Failed,
    }
}

#[async_trait]
impl ExecutionRecordRepository for SqliteExecutionRecordRepository {
    async fn append(&self, record: &ExecutionRecord) -> KernelResult<()> {
        let tool_calls_json = serde_json::to_string(&record.tool_calls)?;
        let provider_chain_json = serde_json::to_string(&record.provider_chain)?;

        sqlx::query(
            r#"INSERT INTO execution_records (execution_id, agent_id, principal, trace_id,
               input_hash, tool_calls, provider_chain, duration_ms, input_tokens,
               output_tokens, cost_usd, final_state, recorded_at, task_type, quality_score)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.execution_id.to_string())
        .bind(&record.agent_id)
        .bind(&record.principal)
        .bind(&record.trace_id)
        .bind(&record.input_hash)
        .bind(&tool_calls_json)
        .bind(&provider_chain_json)
        .bind(record.duration_ms as i64)
        .bind(record.input_tokens as i64)
        .bind(record.output_tokens as i64)
        .bind(record.cost_usd)
        .bind(record.final_state.as_str())
        .bind(record.recorded_at.to_rfc3339())
        .bind(&record.task_type)
        .bind(record.quality_score)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, execution_id: Uuid) -> KernelResult<Option<ExecutionRecord>> {
        let row: Option<ExecutionRecordRow> = sqlx::query_as("SELECT * FROM execution_records WHERE execution_id = ?")
            .bind(execution_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(ExecutionRecord::try_from).transpose()
    }

    async fn recent_for_agent(&self, agent_id: &str, limit: usize) -> KernelResult<Vec<ExecutionRecord>> {
        let rows: Vec<ExecutionRecordRow> = sqlx::query_as(
            "SELECT * FROM execution_records WHERE agent_id = ? ORDER BY recorded_at DESC LIMIT ?",
        )
        .bind(agent_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ExecutionRecord::try_from).collect()
    }
}
