//! Kernel configuration surface (spec §6 "Configuration surface").
//!
//! Loaded once at startup by `infrastructure::config` (figment: defaults →
//! YAML file → environment overrides) into this immutable tree.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub max_concurrent_tasks: usize,
    pub max_concurrent_steps_per_task: usize,
    pub default_task_timeout_secs: u64,
    pub planner_strategy: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 64,
            max_concurrent_steps_per_task: 8,
            default_task_timeout_secs: 300,
            planner_strategy: "auto".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub strict_mode: bool,
    pub min_response_bytes: usize,
    pub fake_response_fingerprints: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strict_mode: true,
            min_response_bytes: 8,
            fake_response_fingerprints: vec![
                "as an ai language model".to_string(),
                "i cannot assist with that".to_string(),
                "[placeholder]".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfigEntry {
    pub priority: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub rate_limit_per_minute: u32,
    pub enabled: bool,
    pub capabilities: Vec<String>,
    pub cost_in: f64,
    pub cost_out: f64,
    #[serde(default)]
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub exact_ttl_secs: u64,
    pub semantic_similarity_threshold: f32,
    pub per_agent_index_cap: usize,
    pub negative_cache_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            exact_ttl_secs: 3600,
            semantic_similarity_threshold: 0.85,
            per_agent_index_cap: 10_000,
            negative_cache_ttl_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    pub default_window_secs: u64,
    pub default_limit: u32,
    pub per_tool_overrides: HashMap<String, (u64, u32)>,
    pub per_principal_overrides: HashMap<String, (u64, u32)>,
    /// Whether to use the shared-store-backed limiter (multi-replica
    /// correct) or the in-memory mode (single-process only — spec §9
    /// open question, explicitly declared here).
    pub shared_store_backed: bool,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            default_window_secs: 60,
            default_limit: 60,
            per_tool_overrides: HashMap::new(),
            per_principal_overrides: HashMap::new(),
            shared_store_backed: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    pub consecutive_failure_threshold: u32,
    pub error_rate_threshold: f64,
    pub window_size: usize,
    pub cooldown_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            consecutive_failure_threshold: 5,
            error_rate_threshold: 0.5,
            window_size: 20,
            cooldown_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    pub daily_budget_usd: f64,
    pub priority_override_threshold: u8,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self { daily_budget_usd: 50.0, priority_override_threshold: 9 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SloConfig {
    pub availability_target: f64,
    pub latency_p95_target_ms: u64,
    pub cost_per_request_target_usd: f64,
    pub fast_burn_window_secs: u64,
    pub slow_burn_window_secs: u64,
}

impl Default for SloConfig {
    fn default() -> Self {
        Self {
            availability_target: 0.995,
            latency_p95_target_ms: 1500,
            cost_per_request_target_usd: 0.50,
            fast_burn_window_secs: 300,
            slow_burn_window_secs: 21_600,
        }
    }
}

/// The full configuration surface (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KernelConfig {
    pub orchestrator: OrchestratorConfig,
    pub providers: HashMap<String, ProviderConfigEntry>,
    pub cache: CacheConfig,
    pub rate_limiter: RateLimiterConfig,
    pub breaker: BreakerConfig,
    pub budget: BudgetConfig,
    pub slo: SloConfig,
}
