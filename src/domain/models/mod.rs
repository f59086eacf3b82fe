//! Domain models (spec §3 "Data Model").
//!
//! Pure domain entities with business logic and validation rules. These
//! models are framework-agnostic and contain no infrastructure concerns.

pub mod agent_contract;
pub mod approval;
pub mod cache_entry;
pub mod config;
pub mod events;
pub mod execution_record;
pub mod health;
pub mod provider;
pub mod rate;
pub mod task;
pub mod tool;
pub mod workflow;

pub use agent_contract::{AgentContract, AgentContractRegistry, ExecutionConstraints, QualityGates};
pub use approval::{ApprovalRequest, ApprovalState};
pub use cache_entry::{CacheEntry, Fingerprint};
pub use config::KernelConfig;
pub use events::{KernelEvent, SequencedEvent};
pub use execution_record::{ExecutionRecord, ToolCallRecord};
pub use health::ProviderHealth;
pub use provider::ProviderRecord;
pub use rate::{RateBucket, RateKey};
pub use task::{Task, TaskState, TaskType};
pub use tool::{RiskLevel, ToolCostModel, ToolDefinition, ToolRegistry};
pub use workflow::{AggregationPolicy, StepAttempt, StepState, StepType, WorkflowGraph, WorkflowStep};
