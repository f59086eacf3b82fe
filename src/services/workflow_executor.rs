//! DAG-based workflow execution: wave scheduling, bounded concurrency,
//! retries, fallback steps and aggregation (spec §4.8 / C8).
//!
//! Grounded on the teacher's `services::dag_executor::DagExecutor` for the
//! ready-set/wave-scheduling shape and its `tokio::sync::Semaphore`-bounded
//! concurrency, re-targeted from goal/task-chain execution to a single
//! task's `WorkflowGraph`.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::errors::KernelResult;
use crate::domain::models::workflow::{AggregationPolicy, StepAttempt, StepState, StepType, WorkflowGraph, WorkflowStep};

/// Executes one step, returning its output value or an error message. The
/// concrete step runner (model call, tool call, agent call) is injected so
/// this module stays agnostic of the orchestrator's other collaborators.
#[async_trait::async_trait]
pub trait StepRunner: Send + Sync {
    async fn run(&self, step: &WorkflowStep, cancel: CancellationToken) -> Result<serde_json::Value, String>;
}

#[derive(Debug, Clone, Copy)]
pub struct WorkflowExecutorConfig {
    pub max_concurrent_steps: usize,
    pub max_retries_per_step: u32,
}

impl Default for WorkflowExecutorConfig {
    fn default() -> Self {
        Self { max_concurrent_steps: 8, max_retries_per_step: 2 }
    }
}

pub struct WorkflowExecutor {
    config: WorkflowExecutorConfig,
    runner: Arc<dyn StepRunner>,
}

impl WorkflowExecutor {
    pub fn new(config: WorkflowExecutorConfig, runner: Arc<dyn StepRunner>) -> Self {
        Self { config, runner }
    }

    /// Run every ready wave of the graph to completion, applying retries and
    /// fallback-step substitution per failed step, then resolving any
    /// `Aggregate` steps once their dependencies are all terminal. Returns
    /// once every step is terminal or the graph is cancelled.
    pub async fn execute(&self, graph: &mut WorkflowGraph, cancel: CancellationToken) -> KernelResult<()> {
        graph.validate_acyclic()?;
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_steps));

        while !graph.all_terminal() {
            if cancel.is_cancelled() {
                self.skip_remaining(graph);
                return Ok(());
            }

            let ready = graph.ready_steps();
            if ready.is_empty() {
                // No step is ready but the graph isn't terminal: every
                // remaining step depends (transitively) on a failed one.
                self.skip_remaining(graph);
                break;
            }

            let mut handles = Vec::new();
            for step_id in ready {
                let step = graph.steps.get_mut(&step_id).expect("id from ready_steps");
                step.state = StepState::Running;
                let step_snapshot = step.clone();
                let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
                let runner = self.runner.clone();
                let cancel = cancel.clone();
                let max_retries = self.config.max_retries_per_step;

                handles.push(tokio::spawn(async move {
                    let _permit = permit;
                    run_with_retries(runner.as_ref(), &step_snapshot, max_retries, cancel).await
                }));
            }

            for handle in handles {
                let (step_id, outcome) = handle.await.map_err(|e| {
                    crate::domain::errors::KernelError::InternalInvariant(format!("step task panicked: {e}"))
                })?;
                let step = graph.steps.get_mut(&step_id).expect("step exists");
                match outcome {
                    Ok((output, attempts)) => {
                        step.outputs = Some(output);
                        step.attempt_log = attempts;
                        step.state = StepState::Succeeded;
                    }
                    Err(attempts) => {
                        step.attempt_log = attempts;
                        step.state = StepState::Failed;
                        if let Some(fallback_id) = step.fallback_step_id {
                            if let Some(fallback) = graph.steps.get_mut(&fallback_id) {
                                if fallback.state == StepState::Skipped {
                                    fallback.state = StepState::Ready;
                                }
                            }
                        }
                    }
                }
            }

            self.resolve_aggregates(graph)?;
        }

        Ok(())
    }

    fn skip_remaining(&self, graph: &mut WorkflowGraph) {
        for step in graph.steps.values_mut() {
            if !step.state.is_terminal() {
                step.state = StepState::Skipped;
            }
        }
    }

    /// Merge dependency outputs into any `Aggregate` step whose dependencies
    /// are all terminal, per its configured policy (spec §4.8).
    fn resolve_aggregates(&self, graph: &mut WorkflowGraph) -> KernelResult<()> {
        let aggregate_ids: Vec<Uuid> = graph
            .steps
            .values()
            .filter(|s| {
                s.step_type == StepType::Aggregate
                    && s.state == StepState::Ready
                    && s.depends_on.iter().all(|d| graph.steps.get(d).map(|dep| dep.state.is_terminal()).unwrap_or(false))
            })
            .map(|s| s.id)
            .collect();

        for step_id in aggregate_ids {
            let policy = graph.steps[&step_id].aggregation_policy.unwrap_or(AggregationPolicy::Concat);
            let dep_outputs: Vec<serde_json::Value> = graph.steps[&step_id]
                .depends_on
                .iter()
                .filter_map(|d| graph.steps.get(d))
                .filter(|dep| dep.state == StepState::Succeeded)
                .filter_map(|dep| dep.outputs.clone())
                .collect();

            let merged = merge_by_policy(policy, &dep_outputs);
            let step = graph.steps.get_mut(&step_id).expect("checked above");
            step.outputs = Some(merged);
            step.state = StepState::Succeeded;
        }
        Ok(())
    }
}

async fn run_with_retries(
    runner: &dyn StepRunner,
    step: &WorkflowStep,
    max_retries: u32,
    cancel: CancellationToken,
) -> (Uuid, Result<(serde_json::Value, Vec<StepAttempt>), Vec<StepAttempt>>) {
    let mut attempts = Vec::new();
    let mut attempt_number = 0;

    loop {
        attempt_number += 1;
        let started = Instant::now();
        let result = runner.run(step, cancel.clone()).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(output) => {
                attempts.push(StepAttempt { attempt_number, succeeded: true, error: None, duration_ms });
                return (step.id, Ok((output, attempts)));
            }
            Err(error) => {
                attempts.push(StepAttempt { attempt_number, succeeded: false, error: Some(error), duration_ms });
                if attempt_number > max_retries || cancel.is_cancelled() {
                    return (step.id, Err(attempts));
                }
                let backoff = std::time::Duration::from_millis(200 * 2u64.saturating_pow(attempt_number - 1));
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

fn merge_by_policy(policy: AggregationPolicy, outputs: &[serde_json::Value]) -> serde_json::Value {
    match policy {
        AggregationPolicy::Concat => {
            let joined = outputs
                .iter()
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                .collect::<Vec<_>>()
                .join("\n");
            serde_json::Value::String(joined)
        }
        AggregationPolicy::StructuredUnion => {
            let mut merged = serde_json::Map::new();
            for output in outputs {
                if let serde_json::Value::Object(map) = output {
                    for (k, v) in map {
                        merged.insert(k.clone(), v.clone());
                    }
                }
            }
            serde_json::Value::Object(merged)
        }
        AggregationPolicy::SelectBestByScore => outputs
            .iter()
            .max_by(|a, b| score_of(a).partial_cmp(&score_of(b)).unwrap_or(std::cmp::Ordering::Equal))
            .cloned()
            .unwrap_or(serde_json::Value::Null),
        AggregationPolicy::WeightedMergeByConfidence => {
            let total_weight: f64 = outputs.iter().map(score_of).sum();
            if total_weight <= 0.0 {
                return merge_by_policy(AggregationPolicy::Concat, outputs);
            }
            let merged = outputs
                .iter()
                .map(|v| {
                    let weight = score_of(v) / total_weight;
                    format!("[weight {:.2}] {}", weight, text_of(v))
                })
                .collect::<Vec<_>>()
                .join("\n");
            serde_json::Value::String(merged)
        }
    }
}

fn score_of(value: &serde_json::Value) -> f64 {
    value.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.0)
}

fn text_of(value: &serde_json::Value) -> String {
    value.get("text").and_then(|v| v.as_str()).map(str::to_string).unwrap_or_else(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct AlwaysSucceeds;
    #[async_trait::async_trait]
    impl StepRunner for AlwaysSucceeds {
        async fn run(&self, step: &WorkflowStep, _cancel: CancellationToken) -> Result<serde_json::Value, String> {
            Ok(serde_json::json!({"step": step.id.to_string(), "confidence": 0.9, "text": "ok"}))
        }
    }

    struct FailsNTimes {
        remaining: Arc<AtomicU32>,
    }
    #[async_trait::async_trait]
    impl StepRunner for FailsNTimes {
        async fn run(&self, _step: &WorkflowStep, _cancel: CancellationToken) -> Result<serde_json::Value, String> {
            if self.remaining.fetch_sub(1, Ordering::SeqCst) > 0 {
                Err("transient".to_string())
            } else {
                Ok(serde_json::json!({"text": "recovered"}))
            }
        }
    }

    #[tokio::test]
    async fn executes_linear_chain_to_completion() {
        let task_id = Uuid::new_v4();
        let mut graph = WorkflowGraph::new(task_id);
        let a = WorkflowStep::new(task_id, StepType::ModelCall, HashSet::new());
        let a_id = a.id;
        let b = WorkflowStep::new(task_id, StepType::ModelCall, HashSet::from([a_id]));
        graph.add_step(a);
        graph.add_step(b);

        let executor = WorkflowExecutor::new(WorkflowExecutorConfig::default(), Arc::new(AlwaysSucceeds));
        executor.execute(&mut graph, CancellationToken::new()).await.unwrap();

        assert!(graph.all_terminal());
        assert!(!graph.any_failed());
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let task_id = Uuid::new_v4();
        let mut graph = WorkflowGraph::new(task_id);
        graph.add_step(WorkflowStep::new(task_id, StepType::ModelCall, HashSet::new()));

        let runner = Arc::new(FailsNTimes { remaining: Arc::new(AtomicU32::new(2)) });
        let executor = WorkflowExecutor::new(
            WorkflowExecutorConfig { max_concurrent_steps: 4, max_retries_per_step: 3 },
            runner,
        );
        executor.execute(&mut graph, CancellationToken::new()).await.unwrap();

        assert!(!graph.any_failed());
    }

    #[tokio::test]
    async fn aggregate_step_concatenates_dependency_outputs() {
        let task_id = Uuid::new_v4();
        let mut graph = WorkflowGraph::new(task_id);
        let a = WorkflowStep::new(task_id, StepType::ModelCall, HashSet::new());
        let a_id = a.id;
        let b = WorkflowStep::new(task_id, StepType::ModelCall, HashSet::new());
        let b_id = b.id;
        let mut aggregate = WorkflowStep::new(task_id, StepType::Aggregate, HashSet::from([a_id, b_id]));
        aggregate.aggregation_policy = Some(AggregationPolicy::StructuredUnion);
        graph.add_step(a);
        graph.add_step(b);
        graph.add_step(aggregate);

        let executor = WorkflowExecutor::new(WorkflowExecutorConfig::default(), Arc::new(AlwaysSucceeds));
        executor.execute(&mut graph, CancellationToken::new()).await.unwrap();

        assert!(graph.all_terminal());
        assert!(!graph.any_failed());
    }
}
