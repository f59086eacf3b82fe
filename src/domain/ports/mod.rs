//! Domain ports (interfaces) for the AMAS orchestration kernel.

pub mod approval_repository;
pub mod embedding;
pub mod execution_record_repository;
pub mod provider_adapter;
pub mod shared_store;
pub mod task_repository;
pub mod tool_executor;
pub mod vector_index;

pub use approval_repository::ApprovalRepository;
pub use embedding::{EmbeddingInput, EmbeddingOutput, EmbeddingProvider};
pub use execution_record_repository::ExecutionRecordRepository;
pub use provider_adapter::{
    NormalizedRequest, NormalizedResponse, ProviderAdapter, ProviderAdapterError, ProviderAdapterFactory,
};
pub use shared_store::SharedStore;
pub use task_repository::{TaskFilter, TaskRepository};
pub use tool_executor::ToolExecutor;
pub use vector_index::{VectorIndex, VectorMatch};
