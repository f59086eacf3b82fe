//! AgentContract domain model (spec §3 "AgentContract").
//!
//! Immutable at runtime; loaded from configuration at startup into
//! `services::contract_validator`'s registry.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Execution constraints an agent's contract places on every invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConstraints {
    pub max_iterations: u32,
    pub timeout_seconds: u64,
    pub token_budget: u64,
}

impl Default for ExecutionConstraints {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            timeout_seconds: 120,
            token_budget: 100_000,
        }
    }
}

/// Quality gates an agent's output must satisfy before a task can complete.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QualityGates {
    pub require_human_approval: bool,
    pub output_validation_required: bool,
}

/// A per-tool rate policy entry, keyed by tool name in `AgentContract::rate_policy`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RatePolicy {
    pub limit: u32,
    pub window_secs: u64,
}

/// An agent's contract: what it may do and under what constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentContract {
    pub agent_id: String,
    pub role_tag: String,
    pub input_schema: serde_json::Value,
    pub output_schema: serde_json::Value,
    pub allowed_capabilities: HashSet<String>,
    pub constraints: ExecutionConstraints,
    pub quality_gates: QualityGates,
    pub rate_policy: HashMap<String, RatePolicy>,
}

impl AgentContract {
    pub fn allows_capability(&self, capability: &str) -> bool {
        self.allowed_capabilities.contains(capability)
    }
}

/// In-memory registry of immutable agent contracts, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct AgentContractRegistry {
    contracts: HashMap<String, AgentContract>,
}

impl AgentContractRegistry {
    pub fn new(contracts: Vec<AgentContract>) -> Self {
        Self {
            contracts: contracts.into_iter().map(|c| (c.agent_id.clone(), c)).collect(),
        }
    }

    pub fn get(&self, agent_id: &str) -> Option<&AgentContract> {
        self.contracts.get(agent_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.contracts.keys()
    }

    pub fn eligible_for_task_type(&self, task_type: &str) -> Vec<&AgentContract> {
        self.contracts
            .values()
            .filter(|c| c.role_tag == task_type || c.allowed_capabilities.contains(task_type))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_contract(id: &str) -> AgentContract {
        AgentContract {
            agent_id: id.to_string(),
            role_tag: "code_analysis".to_string(),
            input_schema: serde_json::json!({"type": "object"}),
            output_schema: serde_json::json!({"type": "object"}),
            allowed_capabilities: HashSet::from(["web_search".to_string()]),
            constraints: ExecutionConstraints::default(),
            quality_gates: QualityGates::default(),
            rate_policy: HashMap::new(),
        }
    }

    #[test]
    fn registry_looks_up_by_id() {
        let registry = AgentContractRegistry::new(vec![sample_contract("researcher")]);
        assert!(registry.get("researcher").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn capability_allowlist_enforced() {
        let contract = sample_contract("researcher");
        assert!(contract.allows_capability("web_search"));
        assert!(!contract.allows_capability("file_write"));
    }
}
