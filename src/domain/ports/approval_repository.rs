//! ApprovalRequest repository port (spec §3/§4.6).

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::KernelResult;
use crate::domain::models::ApprovalRequest;

#[async_trait]
pub trait ApprovalRepository: Send + Sync {
    async fn create(&self, approval: &ApprovalRequest) -> KernelResult<()>;
    async fn get(&self, id: Uuid) -> KernelResult<Option<ApprovalRequest>>;
    async fn update(&self, approval: &ApprovalRequest) -> KernelResult<()>;

    /// Find an existing approval keyed by (agent_id, tool, parameter_hash)
    /// per spec §4.6's approval-reuse semantics.
    async fn find_by_key(
        &self,
        agent_id: &str,
        tool_name: &str,
        parameter_hash: &str,
    ) -> KernelResult<Option<ApprovalRequest>>;
}
