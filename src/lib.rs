//! AMAS kernel — agent orchestration and governance: policy-based agent
//! selection, DAG workflow execution, provider fallback routing, tool
//! contracts, and zero-failure inference under load.

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{KernelError, KernelResult};
pub use services::{Orchestrator, OrchestratorConfig, TaskOutcome};
