//! Agent input/output contract validation (spec §4.7 / C7).
//!
//! Pure, no I/O: schemas are compiled once at startup from the
//! `AgentContractRegistry` and reused for every call. Grounded on the
//! `jsonschema` crate's validator-for-instance pattern (new dependency,
//! see the design ledger) rather than hand-rolling schema checks, matching
//! this corpus's practice of reaching for an ecosystem crate over stdlib.

use std::collections::HashMap;

use jsonschema::Validator;
use serde_json::Value;

use crate::domain::errors::{KernelError, KernelResult};
use crate::domain::models::AgentContractRegistry;

/// Compiled input/output validators for one agent.
struct CompiledContract {
    input: Validator,
    output: Validator,
}

/// Validates agent inputs and outputs against their contract's JSON Schema.
/// Compilation happens once in `new`; `validate_input`/`validate_output`
/// never touch I/O or mutate shared state.
pub struct ContractValidator {
    compiled: HashMap<String, CompiledContract>,
}

impl ContractValidator {
    /// Compile every contract's schemas. Fails fast on a malformed schema
    /// rather than deferring the error to first use.
    pub fn new(registry: &AgentContractRegistry) -> KernelResult<Self> {
        let mut compiled = HashMap::new();
        for agent_id in registry.ids() {
            let contract = registry.get(agent_id).expect("id came from registry.ids()");
            let input = jsonschema::validator_for(&contract.input_schema)
                .map_err(|e| KernelError::ContractViolation(format!("invalid input_schema for '{agent_id}': {e}")))?;
            let output = jsonschema::validator_for(&contract.output_schema)
                .map_err(|e| KernelError::ContractViolation(format!("invalid output_schema for '{agent_id}': {e}")))?;
            compiled.insert(agent_id.clone(), CompiledContract { input, output });
        }
        Ok(Self { compiled })
    }

    pub fn validate_input(&self, agent_id: &str, instance: &Value) -> KernelResult<()> {
        self.validate(agent_id, instance, true)
    }

    pub fn validate_output(&self, agent_id: &str, instance: &Value) -> KernelResult<()> {
        self.validate(agent_id, instance, false)
    }

    fn validate(&self, agent_id: &str, instance: &Value, is_input: bool) -> KernelResult<()> {
        let contract = self
            .compiled
            .get(agent_id)
            .ok_or_else(|| KernelError::AgentNotFound(agent_id.to_string()))?;
        let validator = if is_input { &contract.input } else { &contract.output };

        if validator.is_valid(instance) {
            Ok(())
        } else {
            let errors: Vec<String> = validator.iter_errors(instance).map(|e| e.to_string()).collect();
            Err(KernelError::ContractViolation(format!(
                "{} validation failed for '{agent_id}': {}",
                if is_input { "input" } else { "output" },
                errors.join("; ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::agent_contract::{AgentContract, ExecutionConstraints, QualityGates};
    use std::collections::{HashMap as StdHashMap, HashSet};

    fn contract_with_schemas(input: Value, output: Value) -> AgentContract {
        AgentContract {
            agent_id: "writer".to_string(),
            role_tag: "content".to_string(),
            input_schema: input,
            output_schema: output,
            allowed_capabilities: HashSet::new(),
            constraints: ExecutionConstraints::default(),
            quality_gates: QualityGates::default(),
            rate_policy: StdHashMap::new(),
        }
    }

    #[test]
    fn rejects_input_missing_required_field() {
        let contract = contract_with_schemas(
            serde_json::json!({"type": "object", "required": ["topic"], "properties": {"topic": {"type": "string"}}}),
            serde_json::json!({"type": "object"}),
        );
        let registry = AgentContractRegistry::new(vec![contract]);
        let validator = ContractValidator::new(&registry).unwrap();

        let err = validator.validate_input("writer", &serde_json::json!({})).unwrap_err();
        assert!(matches!(err, KernelError::ContractViolation(_)));
    }

    #[test]
    fn accepts_conforming_output() {
        let contract = contract_with_schemas(
            serde_json::json!({"type": "object"}),
            serde_json::json!({"type": "object", "required": ["text"], "properties": {"text": {"type": "string"}}}),
        );
        let registry = AgentContractRegistry::new(vec![contract]);
        let validator = ContractValidator::new(&registry).unwrap();

        assert!(validator.validate_output("writer", &serde_json::json!({"text": "hello"})).is_ok());
    }

    #[test]
    fn unknown_agent_is_rejected() {
        let registry = AgentContractRegistry::new(vec![]);
        let validator = ContractValidator::new(&registry).unwrap();
        let err = validator.validate_input("ghost", &serde_json::json!({})).unwrap_err();
        assert!(matches!(err, KernelError::AgentNotFound(_)));
    }
}
