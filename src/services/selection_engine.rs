//! Linear scoring/prediction engine for agent selection (spec §4.9 / C9).
//!
//! No ML runtime: a fixed linear combination of rolling historical
//! features from `learning_loop`, degrading to a neutral cold-start score
//! when an agent has no history yet (spec §9 "degrades gracefully").
//! Grounded on the teacher's `services::model_router::ModelRouter` scoring
//! shape, re-targeted from model tiers to agent contracts.

use std::sync::Arc;

use crate::domain::models::agent_contract::AgentContractRegistry;
use crate::services::learning_loop::{AgentTaskStats, LearningLoop};
use crate::services::planner::AgentCandidate;

/// Weights for the linear scoring function. Exposed for tuning via
/// configuration rather than hardcoded, per spec §9 "agent roster is a
/// registry, not fixed policy".
#[derive(Debug, Clone, Copy)]
pub struct ScoringWeights {
    pub success_rate: f64,
    pub quality_score: f64,
    pub speed: f64,
    pub cost: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self { success_rate: 0.4, quality_score: 0.3, speed: 0.15, cost: 0.15 }
    }
}

/// Cold-start score assigned to an agent with no rolling history, so new
/// or rarely-used agents aren't permanently starved in favor of agents
/// with an early lead (spec §9).
const COLD_START_SCORE: f64 = 0.5;

/// Normalization reference points: a call at or below these is scored as
/// "fast"/"cheap" (1.0); above, the score decays toward 0.
const DURATION_REFERENCE_MS: f64 = 5_000.0;
const COST_REFERENCE_USD: f64 = 0.05;

pub struct SelectionEngine {
    contracts: Arc<AgentContractRegistry>,
    learning_loop: Arc<LearningLoop>,
    weights: ScoringWeights,
}

impl SelectionEngine {
    pub fn new(contracts: Arc<AgentContractRegistry>, learning_loop: Arc<LearningLoop>, weights: ScoringWeights) -> Self {
        Self { contracts, learning_loop, weights }
    }

    /// Rank every agent contract eligible for `task_type`, highest score
    /// first. An empty result means no agent's contract declares
    /// eligibility for this task type.
    pub async fn rank(&self, task_type: &str) -> Vec<AgentCandidate> {
        let eligible = self.contracts.eligible_for_task_type(task_type);
        let mut scored = Vec::with_capacity(eligible.len());

        for contract in eligible {
            let stats = self.learning_loop.stats_for(&contract.agent_id, task_type).await;
            let score = self.score(stats);
            scored.push((contract.agent_id.clone(), score));
        }

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().map(|(agent_id, _)| AgentCandidate { agent_id }).collect()
    }

    fn score(&self, stats: Option<AgentTaskStats>) -> f64 {
        let Some(stats) = stats else {
            return COLD_START_SCORE;
        };
        if stats.sample_count == 0 {
            return COLD_START_SCORE;
        }

        let speed_score = (DURATION_REFERENCE_MS / stats.avg_duration_ms.max(1.0)).min(1.0);
        let cost_score = (COST_REFERENCE_USD / stats.avg_cost_usd.max(0.000_001)).min(1.0);

        self.weights.success_rate * stats.success_rate
            + self.weights.quality_score * stats.avg_quality_score
            + self.weights.speed * speed_score
            + self.weights.cost * cost_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::agent_contract::{AgentContract, ExecutionConstraints, QualityGates};
    use crate::domain::models::execution_record::ExecutionRecord;
    use crate::domain::models::task::TaskState;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use uuid::Uuid;

    struct EmptyRepo;
    #[async_trait]
    impl crate::domain::ports::ExecutionRecordRepository for EmptyRepo {
        async fn append(&self, _record: &ExecutionRecord) -> crate::domain::errors::KernelResult<()> {
            Ok(())
        }
        async fn get(&self, _execution_id: Uuid) -> crate::domain::errors::KernelResult<Option<ExecutionRecord>> {
            Ok(None)
        }
        async fn recent_for_agent(&self, _agent_id: &str, _limit: usize) -> crate::domain::errors::KernelResult<Vec<ExecutionRecord>> {
            Ok(vec![])
        }
    }

    fn contract(id: &str, role: &str) -> AgentContract {
        AgentContract {
            agent_id: id.to_string(),
            role_tag: role.to_string(),
            input_schema: serde_json::json!({}),
            output_schema: serde_json::json!({}),
            allowed_capabilities: HashSet::new(),
            constraints: ExecutionConstraints::default(),
            quality_gates: QualityGates::default(),
            rate_policy: HashMap::new(),
        }
    }

    fn sample_record(agent_id: &str, quality: f64) -> ExecutionRecord {
        ExecutionRecord {
            execution_id: Uuid::new_v4(),
            agent_id: agent_id.to_string(),
            principal: "p".to_string(),
            trace_id: "t".to_string(),
            input_hash: "h".to_string(),
            tool_calls: vec![],
            provider_chain: vec![],
            duration_ms: 1000,
            input_tokens: 1,
            output_tokens: 1,
            cost_usd: 0.01,
            final_state: TaskState::Completed,
            recorded_at: chrono::Utc::now(),
            task_type: "content".to_string(),
            quality_score: Some(quality),
        }
    }

    #[tokio::test]
    async fn cold_start_agent_ranks_alongside_proven_agent() {
        let registry = Arc::new(AgentContractRegistry::new(vec![
            contract("proven", "content"),
            contract("fresh", "content"),
        ]));
        let learning_loop = Arc::new(LearningLoop::new(Arc::new(EmptyRepo)));
        learning_loop.record(&sample_record("proven", 0.9)).await;

        let engine = SelectionEngine::new(registry, learning_loop, ScoringWeights::default());
        let ranked = engine.rank("content").await;

        assert_eq!(ranked.len(), 2);
    }

    #[tokio::test]
    async fn higher_quality_history_ranks_first() {
        let registry = Arc::new(AgentContractRegistry::new(vec![
            contract("good", "content"),
            contract("bad", "content"),
        ]));
        let learning_loop = Arc::new(LearningLoop::new(Arc::new(EmptyRepo)));
        for _ in 0..3 {
            learning_loop.record(&sample_record("good", 0.95)).await;
            learning_loop.record(&sample_record("bad", 0.1)).await;
        }

        let engine = SelectionEngine::new(registry, learning_loop, ScoringWeights::default());
        let ranked = engine.rank("content").await;

        assert_eq!(ranked[0].agent_id, "good");
    }
}
