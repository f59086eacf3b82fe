//! ToolDefinition domain model (spec §3 "ToolDefinition", §4.6).

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Risk tier of a tool; drives whether an approval gate applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Per-principal or per-tool rate policy (shared shape with agent contracts).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RatePolicy {
    pub limit: u32,
    pub window_secs: u64,
}

/// A simplified cost model for a tool invocation (flat per-call cost; real
/// deployments may attach a richer model, e.g. per-byte-transferred).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ToolCostModel {
    pub cost_per_call_usd: f64,
}

/// Immutable tool metadata, loaded from configuration at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub capability: String,
    pub risk_level: RiskLevel,
    pub requires_approval: bool,
    pub parameter_schema: serde_json::Value,
    pub forbidden_parameters: HashSet<String>,
    /// For path-style tools: the only path prefixes a path-valued parameter
    /// may resolve under (spec §4.6 "confined to a configured allowlist").
    pub allowed_path_prefixes: Vec<String>,
    pub rate_policy: RatePolicy,
    pub cost_model: ToolCostModel,
}

/// Immutable registry of tool definitions.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDefinition>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<ToolDefinition>) -> Self {
        Self {
            tools: tools.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lookup() {
        let registry = ToolRegistry::new(vec![ToolDefinition {
            name: "file_write".into(),
            capability: "file_write".into(),
            risk_level: RiskLevel::High,
            requires_approval: true,
            parameter_schema: serde_json::json!({"type": "object"}),
            forbidden_parameters: HashSet::from(["system_path".to_string()]),
            allowed_path_prefixes: vec!["/workspace".to_string()],
            rate_policy: RatePolicy { limit: 10, window_secs: 60 },
            cost_model: ToolCostModel::default(),
        }]);
        assert!(registry.get("file_write").is_some());
        assert!(registry.get("unknown").is_none());
    }
}
