//! Task repository port (spec §6 persistence boundary: durable store of
//! Task records). Narrowed from the teacher's richer DAG-aware repository
//! to the operations the kernel's orchestrator actually needs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::KernelResult;
use crate::domain::models::{Task, TaskState};

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub state: Option<TaskState>,
    pub principal: Option<String>,
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: &Task) -> KernelResult<()>;
    async fn get(&self, id: Uuid) -> KernelResult<Option<Task>>;
    async fn update(&self, task: &Task) -> KernelResult<()>;
    async fn list(&self, filter: TaskFilter) -> KernelResult<Vec<Task>>;
}
