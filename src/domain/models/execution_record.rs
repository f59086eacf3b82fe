//! ExecutionRecord domain model (spec §3 "ExecutionRecord" — audit log).
//!
//! Append-only; historical records are never mutated (spec §4.13).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::ProviderAttempt;
use crate::domain::models::task::TaskState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub succeeded: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: Uuid,
    pub agent_id: String,
    pub principal: String,
    pub trace_id: String,
    pub input_hash: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub provider_chain: Vec<ProviderAttempt>,
    pub duration_ms: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
    pub final_state: TaskState,
    pub recorded_at: DateTime<Utc>,
    pub task_type: String,
    pub quality_score: Option<f64>,
}
