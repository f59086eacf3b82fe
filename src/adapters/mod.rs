//! Adapters implementing the kernel's domain ports against concrete
//! external systems (spec §6 persistence boundary, §4.1 provider boundary).

pub mod embedding_deterministic;
pub mod embedding_openai;
pub mod provider_mock;
pub mod shared_store_memory;
pub mod sqlite;
pub mod tool_mock;
pub mod vector_index_memory;

pub use embedding_deterministic::DeterministicEmbeddingProvider;
pub use embedding_openai::{OpenAiEmbeddingConfig, OpenAiEmbeddingProvider};
pub use provider_mock::{MockFailure, MockOutcome, MockProviderAdapter, MockProviderAdapterFactory};
pub use shared_store_memory::InMemorySharedStore;
pub use tool_mock::{FailingToolExecutor, MockToolExecutor};
pub use vector_index_memory::InMemoryVectorIndex;
