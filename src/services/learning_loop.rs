//! Offline/batch learning loop: rolling per-(agent, task_type) statistics
//! built from the append-only execution log (spec §4.13 / C13).
//!
//! Spec §9 resolves C13 as offline/batch: this module only records outcomes
//! into rolling aggregates; C9 re-reads them per call rather than C13
//! pushing any online gradient update. Grounded on the teacher's
//! `services::cost_tracker`'s guarded-map-of-aggregates shape.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::errors::KernelResult;
use crate::domain::models::execution_record::ExecutionRecord;
use crate::domain::models::task::TaskState;
use crate::domain::ports::ExecutionRecordRepository;

/// Rolling aggregate for one (agent_id, task_type) pair. Updated with a
/// simple exponential moving average so a single outlier run can't swing
/// the statistic as hard as the most recent handful of runs.
#[derive(Debug, Clone, Copy)]
pub struct AgentTaskStats {
    pub success_rate: f64,
    pub avg_quality_score: f64,
    pub avg_duration_ms: f64,
    pub avg_cost_usd: f64,
    pub sample_count: u64,
}

impl AgentTaskStats {
    fn empty() -> Self {
        Self { success_rate: 0.0, avg_quality_score: 0.0, avg_duration_ms: 0.0, avg_cost_usd: 0.0, sample_count: 0 }
    }

    fn update(&mut self, succeeded: bool, quality_score: Option<f64>, duration_ms: u64, cost_usd: f64) {
        const SMOOTHING: f64 = 0.2;
        let alpha = if self.sample_count == 0 { 1.0 } else { SMOOTHING };

        self.success_rate += alpha * (if succeeded { 1.0 } else { 0.0 } - self.success_rate);
        if let Some(score) = quality_score {
            self.avg_quality_score += alpha * (score - self.avg_quality_score);
        }
        self.avg_duration_ms += alpha * (duration_ms as f64 - self.avg_duration_ms);
        self.avg_cost_usd += alpha * (cost_usd - self.avg_cost_usd);
        self.sample_count += 1;
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct StatsKey {
    agent_id: String,
    task_type: String,
}

pub struct LearningLoop {
    stats: tokio::sync::RwLock<HashMap<StatsKey, AgentTaskStats>>,
    repository: Arc<dyn ExecutionRecordRepository>,
}

impl LearningLoop {
    pub fn new(repository: Arc<dyn ExecutionRecordRepository>) -> Self {
        Self { stats: tokio::sync::RwLock::new(HashMap::new()), repository }
    }

    /// Rebuild in-memory rolling stats from the durable log at startup, so
    /// the selection engine doesn't cold-start with no history after a
    /// restart.
    pub async fn rebuild_for_agent(&self, agent_id: &str, limit: usize) -> KernelResult<()> {
        let records = self.repository.recent_for_agent(agent_id, limit).await?;
        let mut stats = self.stats.write().await;
        // Oldest first, so the EMA weighs recent runs more heavily, matching
        // the live ingest order.
        for record in records.into_iter().rev() {
            apply_record(&mut stats, &record);
        }
        Ok(())
    }

    pub async fn record(&self, record: &ExecutionRecord) {
        let mut stats = self.stats.write().await;
        apply_record(&mut stats, record);
    }

    pub async fn stats_for(&self, agent_id: &str, task_type: &str) -> Option<AgentTaskStats> {
        let key = StatsKey { agent_id: agent_id.to_string(), task_type: task_type.to_string() };
        self.stats.read().await.get(&key).copied()
    }
}

fn apply_record(stats: &mut HashMap<StatsKey, AgentTaskStats>, record: &ExecutionRecord) {
    let key = StatsKey { agent_id: record.agent_id.clone(), task_type: record.task_type.clone() };
    let entry = stats.entry(key).or_insert_with(AgentTaskStats::empty);
    let succeeded = record.final_state == TaskState::Completed;
    entry.update(succeeded, record.quality_score, record.duration_ms, record.cost_usd);
}
