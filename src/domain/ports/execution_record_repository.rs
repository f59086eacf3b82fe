//! ExecutionRecord repository port (append-only audit log, spec §3/§4.13).

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::KernelResult;
use crate::domain::models::ExecutionRecord;

#[async_trait]
pub trait ExecutionRecordRepository: Send + Sync {
    /// Append a record. Historical records are never mutated or deleted.
    async fn append(&self, record: &ExecutionRecord) -> KernelResult<()>;

    async fn get(&self, execution_id: Uuid) -> KernelResult<Option<ExecutionRecord>>;

    /// Recent records for an agent, newest first, used to rebuild C13's
    /// in-memory rolling statistics on startup.
    async fn recent_for_agent(&self, agent_id: &str, limit: usize) -> KernelResult<Vec<ExecutionRecord>>;
}
