//! Cost tracking and daily budget enforcement (spec §4.12 / C12).
//!
//! Keeps the teacher's per-model pricing table and `CostSummary`
//! accumulator (renamed from per-goal to per-execution tracking to match
//! the kernel's `Task.execution_id`), and adds a daily budget cap with a
//! pre-check (`would_exceed`) and a priority-override threshold so urgent
//! tasks can still run once the soft budget is spent (spec §4.12).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{KernelError, KernelResult};

/// Pricing per million tokens for a specific model.
#[derive(Debug, Clone, Copy)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
    pub cache_read: f64,
    pub cache_write: f64,
}

const PRICING_TABLE: &[(&str, ModelPricing)] = &[
    ("opus", ModelPricing { input: 15.0, output: 75.0, cache_read: 1.5, cache_write: 18.75 }),
    ("sonnet", ModelPricing { input: 3.0, output: 15.0, cache_read: 0.3, cache_write: 3.75 }),
    ("haiku", ModelPricing { input: 0.80, output: 4.0, cache_read: 0.08, cache_write: 1.0 }),
    ("gpt-4", ModelPricing { input: 30.0, output: 60.0, cache_read: 15.0, cache_write: 30.0 }),
    ("gpt-3.5", ModelPricing { input: 0.5, output: 1.5, cache_read: 0.25, cache_write: 0.5 }),
];

/// Look up pricing for a model by name or alias, matching on substring so
/// "claude-opus-4-x" style date-stamped names still resolve.
pub fn get_model_pricing(model: &str) -> Option<ModelPricing> {
    let model_lower = model.to_lowercase();
    PRICING_TABLE.iter().find(|(name, _)| model_lower.contains(name)).map(|(_, pricing)| *pricing)
}

pub fn estimate_cost(
    model: &str,
    input_tokens: u64,
    output_tokens: u64,
    cache_read_tokens: u64,
    cache_write_tokens: u64,
) -> Option<f64> {
    let pricing = get_model_pricing(model)?;
    Some(
        (input_tokens as f64 * pricing.input
            + output_tokens as f64 * pricing.output
            + cache_read_tokens as f64 * pricing.cache_read
            + cache_write_tokens as f64 * pricing.cache_write)
            / 1_000_000.0,
    )
}

/// Summary of costs for one execution or for the whole process.
#[derive(Debug, Clone, Default)]
pub struct CostSummary {
    pub total_usd: f64,
    pub by_provider: HashMap<String, f64>,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub task_count: u32,
}

impl CostSummary {
    /// `provider_id` here is a dimension label, not a pricing-table key:
    /// the cost itself is pre-computed by the caller from the actual
    /// `ProviderRecord::expected_cost_usd` that served the call, so no
    /// name-matching is needed (unlike `estimate_cost`, which is a
    /// standalone estimation helper for cases with no concrete provider
    /// yet, e.g. pre-routing cost comparisons).
    pub fn add_call(&mut self, provider_id: &str, input_tokens: u64, output_tokens: u64, cost_usd: f64) {
        self.total_input_tokens += input_tokens;
        self.total_output_tokens += output_tokens;
        self.task_count += 1;
        self.total_usd += cost_usd;
        *self.by_provider.entry(provider_id.to_string()).or_default() += cost_usd;
    }
}

/// Daily budget configuration (spec §4.12 "daily budget cap").
#[derive(Debug, Clone, Copy)]
pub struct BudgetConfig {
    pub daily_cap_usd: f64,
    /// A task at or above this priority may exceed the cap (spec §4.12
    /// "priority-override threshold").
    pub priority_override_threshold: u8,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self { daily_cap_usd: 100.0, priority_override_threshold: 9 }
    }
}

/// Accumulates spend per execution and enforces the daily budget cap.
pub struct CostTracker {
    config: BudgetConfig,
    executions: Arc<RwLock<HashMap<Uuid, CostSummary>>>,
    daily: Arc<RwLock<HashMap<NaiveDate, f64>>>,
}

impl CostTracker {
    pub fn new(config: BudgetConfig) -> Self {
        Self {
            config,
            executions: Arc::new(RwLock::new(HashMap::new())),
            daily: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Check whether spending `additional_usd` more today would breach the
    /// daily cap, without recording anything (spec §4.12 pre-check). A
    /// `task_priority` at or above the override threshold always passes.
    pub async fn would_exceed(&self, additional_usd: f64, task_priority: u8) -> bool {
        if task_priority >= self.config.priority_override_threshold {
            return false;
        }
        let today = Utc::now().date_naive();
        let spent_today = self.daily.read().await.get(&today).copied().unwrap_or(0.0);
        spent_today + additional_usd > self.config.daily_cap_usd
    }

    /// Reject the spend if it would breach the cap (unless the task's
    /// priority overrides it), otherwise record it against both the
    /// execution summary and today's running total. `cost_usd` is the
    /// actual per-call cost, already computed from the serving provider's
    /// `ProviderRecord::expected_cost_usd`.
    pub async fn record_call(
        &self,
        execution_id: Uuid,
        task_priority: u8,
        provider_id: &str,
        input_tokens: u64,
        output_tokens: u64,
        cost_usd: f64,
    ) -> KernelResult<()> {
        if self.would_exceed(cost_usd, task_priority).await {
            let today = Utc::now().date_naive();
            let spent_today = self.daily.read().await.get(&today).copied().unwrap_or(0.0);
            return Err(KernelError::BudgetExceeded {
                spent_usd: spent_today,
                budget_usd: self.config.daily_cap_usd,
            });
        }

        {
            let mut executions = self.executions.write().await;
            executions.entry(execution_id).or_default().add_call(provider_id, input_tokens, output_tokens, cost_usd);
        }
        {
            let today = Utc::now().date_naive();
            let mut daily = self.daily.write().await;
            *daily.entry(today).or_insert(0.0) += cost_usd;
        }
        Ok(())
    }

    pub async fn execution_summary(&self, execution_id: Uuid) -> Option<CostSummary> {
        self.executions.read().await.get(&execution_id).cloned()
    }

    pub async fn spent_today(&self) -> f64 {
        let today = Utc::now().date_naive();
        self.daily.read().await.get(&today).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pricing_resolves_by_alias_substring() {
        let pricing = get_model_pricing("claude-opus-4-x-20250101").unwrap();
        assert_eq!(pricing.input, 15.0);
    }

    #[test]
    fn unknown_model_has_no_pricing() {
        assert!(get_model_pricing("unknown-model").is_none());
    }

    #[tokio::test]
    async fn records_cost_against_execution_and_daily_total() {
        let tracker = CostTracker::new(BudgetConfig::default());
        let execution_id = Uuid::new_v4();

        tracker.record_call(execution_id, 5, "provider-a", 10_000, 5_000, 0.25).await.unwrap();
        let summary = tracker.execution_summary(execution_id).await.unwrap();

        assert_eq!(summary.task_count, 1);
        assert!((summary.total_usd - 0.25).abs() < 1e-9);
        assert!((tracker.spent_today().await - summary.total_usd).abs() < 1e-9);
    }

    #[tokio::test]
    async fn rejects_spend_exceeding_daily_cap() {
        let tracker = CostTracker::new(BudgetConfig { daily_cap_usd: 0.001, priority_override_threshold: 9 });
        let err = tracker.record_call(Uuid::new_v4(), 3, "provider-a", 1_000_000, 0, 5.0).await.unwrap_err();
        assert!(matches!(err, KernelError::BudgetExceeded { .. }));
    }

    #[tokio::test]
    async fn priority_override_bypasses_cap() {
        let tracker = CostTracker::new(BudgetConfig { daily_cap_usd: 0.001, priority_override_threshold: 9 });
        assert!(tracker.record_call(Uuid::new_v4(), 9, "provider-a", 1_000_000, 0, 5.0).await.is_ok());
    }
}
