//! Orchestrator core: the single entry point that drives a submitted task
//! through ranking, planning, execution, and a guaranteed terminal
//! transition (spec §4.10 / C10).
//!
//! Generalizes the teacher's `services::task_service` entry-point
//! composition shape — `submit` plays the role of the teacher's
//! `TaskService::create_and_dispatch`, but wires C1/C4/C5/C7/C9/C11/C13
//! collaborators around a single `StepRunner` instead of the teacher's
//! direct substrate call.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::errors::{KernelError, KernelResult};
use crate::domain::models::cache_entry::CacheEntry;
use crate::domain::models::execution_record::ExecutionRecord;
use crate::domain::models::task::{Task, TaskState};
use crate::domain::models::workflow::{StepType, WorkflowStep};
use crate::domain::models::{AgentContractRegistry, KernelEvent};
use crate::domain::ports::provider_adapter::NormalizedRequest;
use crate::domain::ports::{EmbeddingProvider, ExecutionRecordRepository, TaskRepository, ToolExecutor};
use crate::services::cache::{fingerprint, CacheLookup, ResponseCache};
use crate::services::contract_validator::ContractValidator;
use crate::services::cost_tracker::CostTracker;
use crate::services::dedup::Deduplicator;
use crate::services::event_bus::EventBus;
use crate::services::learning_loop::LearningLoop;
use crate::services::observability::MetricsRegistry;
use crate::services::planner::{FanOutStrategy, Planner};
use crate::services::provider_router::{ProviderRouter, SelectionStrategy};
use crate::services::selection_engine::SelectionEngine;
use crate::services::tool_guard::{GuardDecision, ToolGuard};
use crate::services::workflow_executor::{StepRunner, WorkflowExecutor, WorkflowExecutorConfig};

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    pub max_concurrent_tasks: usize,
    pub default_deadline: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { max_concurrent_tasks: 64, default_deadline: Duration::from_secs(300) }
    }
}

/// Final outcome of one `submit` call, once the task has reached a
/// terminal state.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task: Task,
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    task_repository: Arc<dyn TaskRepository>,
    execution_records: Arc<dyn ExecutionRecordRepository>,
    contracts: Arc<AgentContractRegistry>,
    validator: Arc<ContractValidator>,
    selection_engine: Arc<SelectionEngine>,
    provider_router: Arc<ProviderRouter>,
    cache: Arc<ResponseCache>,
    dedup: Arc<Deduplicator>,
    cost_tracker: Arc<CostTracker>,
    learning_loop: Arc<LearningLoop>,
    event_bus: Arc<EventBus>,
    tool_guard: Arc<ToolGuard>,
    tool_executor: Arc<dyn ToolExecutor>,
    metrics: Arc<MetricsRegistry>,
    embedder: Arc<dyn EmbeddingProvider>,
    workflow_config: WorkflowExecutorConfig,
    task_semaphore: Arc<Semaphore>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: OrchestratorConfig,
        task_repository: Arc<dyn TaskRepository>,
        execution_records: Arc<dyn ExecutionRecordRepository>,
        contracts: Arc<AgentContractRegistry>,
        validator: Arc<ContractValidator>,
        selection_engine: Arc<SelectionEngine>,
        provider_router: Arc<ProviderRouter>,
        cache: Arc<ResponseCache>,
        dedup: Arc<Deduplicator>,
        cost_tracker: Arc<CostTracker>,
        learning_loop: Arc<LearningLoop>,
        event_bus: Arc<EventBus>,
        tool_guard: Arc<ToolGuard>,
        tool_executor: Arc<dyn ToolExecutor>,
        metrics: Arc<MetricsRegistry>,
        embedder: Arc<dyn EmbeddingProvider>,
        workflow_config: WorkflowExecutorConfig,
    ) -> Self {
        let task_semaphore = Arc::new(Semaphore::new(config.max_concurrent_tasks));
        Self {
            config,
            task_repository,
            execution_records,
            contracts,
            validator,
            selection_engine,
            provider_router,
            cache,
            dedup,
            cost_tracker,
            learning_loop,
            event_bus,
            tool_guard,
            tool_executor,
            metrics,
            embedder,
            workflow_config,
            task_semaphore,
        }
    }

    /// Drive `task` from `Pending` to a terminal state, emitting the
    /// progress-stream events a client consumes (spec §6). Always returns
    /// with the task in a terminal state — it is never dropped mid-flight
    /// (spec §4.10 "terminal-transition guarantee").
    pub async fn submit(&self, mut task: Task) -> KernelResult<TaskOutcome> {
        self.event_bus.emit(KernelEvent::TaskCreated { execution_id: task.execution_id, task_id: task.id }).await;
        self.task_repository.create(&task).await?;

        let Ok(permit) = self.task_semaphore.clone().try_acquire_owned() else {
            // Pending's only valid transitions are Planning/Cancelled (spec
            // §3): admission rejection never started the task, so it's
            // cancelled rather than failed.
            task.transition(TaskState::Cancelled).ok();
            self.task_repository.update(&task).await?;
            self.event_bus
                .emit(KernelEvent::TaskFailed { execution_id: task.execution_id, error_kind: "Overloaded".to_string(), attempts: 0 })
                .await;
            return Err(KernelError::Overloaded("task admission at capacity".to_string()));
        };

        task.transition(TaskState::Planning)?;
        self.task_repository.update(&task).await?;

        let candidates = self.selection_engine.rank(&task.task_type.0).await;
        self.event_bus
            .emit(KernelEvent::TaskPlanning {
                execution_id: task.execution_id,
                predicted_agents: candidates.iter().map(|c| c.agent_id.clone()).collect(),
            })
            .await;

        if candidates.is_empty() {
            task.transition(TaskState::Failed)?;
            self.task_repository.update(&task).await?;
            self.event_bus
                .emit(KernelEvent::TaskFailed {
                    execution_id: task.execution_id,
                    error_kind: "NoEligibleAgent".to_string(),
                    attempts: 0,
                })
                .await;
            return Ok(TaskOutcome { task });
        }

        let mut graph = Planner::plan(&task, &candidates, FanOutStrategy::PrimaryWithFallbacks);

        task.transition(TaskState::Running)?;
        task.assigned_agents = candidates.iter().map(|c| c.agent_id.clone()).collect();
        self.task_repository.update(&task).await?;

        let runner: Arc<dyn StepRunner> = Arc::new(AgentStepRunner {
            execution_id: task.execution_id,
            principal: task.principal.clone(),
            task_type: task.task_type.0.clone(),
            priority: task.priority,
            contracts: self.contracts.clone(),
            validator: self.validator.clone(),
            provider_router: self.provider_router.clone(),
            cache: self.cache.clone(),
            dedup: self.dedup.clone(),
            cost_tracker: self.cost_tracker.clone(),
            execution_records: self.execution_records.clone(),
            learning_loop: self.learning_loop.clone(),
            event_bus: self.event_bus.clone(),
            tool_guard: self.tool_guard.clone(),
            tool_executor: self.tool_executor.clone(),
            metrics: self.metrics.clone(),
            embedder: self.embedder.clone(),
        });
        let executor = WorkflowExecutor::new(self.workflow_config, runner);

        let cancel = CancellationToken::new();
        let deadline = task.deadline.map(|d| (d - chrono::Utc::now()).to_std().unwrap_or(Duration::ZERO)).unwrap_or(self.config.default_deadline);
        let deadline_guard = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                cancel.cancel();
            })
        };

        executor.execute(&mut graph, cancel.clone()).await?;
        deadline_guard.abort();
        drop(permit);

        let any_succeeded = graph.steps.values().any(|s| s.state == crate::domain::models::workflow::StepState::Succeeded);
        let final_state = if cancel.is_cancelled() {
            TaskState::Cancelled
        } else if any_succeeded {
            TaskState::Completed
        } else {
            TaskState::Failed
        };

        task.transition(final_state)?;
        task.result = extract_result(&graph);
        task.quality_score = task.result.as_ref().and_then(|v| v.get("confidence")).and_then(|v| v.as_f64());
        task.cost_usd = self.cost_tracker.execution_summary(task.execution_id).await.map(|s| s.total_usd);
        self.task_repository.update(&task).await?;

        match final_state {
            TaskState::Completed => {
                self.event_bus
                    .emit(KernelEvent::TaskCompleted {
                        execution_id: task.execution_id,
                        result: task.result.clone().unwrap_or(serde_json::Value::Null),
                        quality_score: task.quality_score.unwrap_or(0.0),
                        cost: task.cost_usd.unwrap_or(0.0),
                    })
                    .await;
            }
            TaskState::Cancelled => {
                self.event_bus
                    .emit(KernelEvent::TaskFailed {
                        execution_id: task.execution_id,
                        error_kind: "DeadlineExceeded".to_string(),
                        attempts: graph.steps.values().map(|s| s.attempt_log.len()).sum(),
                    })
                    .await;
            }
            _ => {
                self.event_bus
                    .emit(KernelEvent::TaskFailed {
                        execution_id: task.execution_id,
                        error_kind: "WorkflowFailed".to_string(),
                        attempts: graph.steps.values().map(|s| s.attempt_log.len()).sum(),
                    })
                    .await;
            }
        }

        self.event_bus.forget(task.execution_id).await;
        Ok(TaskOutcome { task })
    }
}

/// The root result of a workflow: an `Aggregate` step's merged output if
/// present, otherwise the first successful step encountered (in a
/// fallback chain, exactly one such step succeeds; earlier links either
/// failed or were never promoted).
fn extract_result(graph: &crate::domain::models::workflow::WorkflowGraph) -> Option<serde_json::Value> {
    use crate::domain::models::workflow::{StepState, StepType};

    graph
        .steps
        .values()
        .find(|s| s.step_type == StepType::Aggregate && s.state == StepState::Succeeded)
        .or_else(|| graph.steps.values().find(|s| s.state == StepState::Succeeded))
        .and_then(|s| s.outputs.clone())
}

/// Executes one `AgentCall` workflow step end to end: input contract
/// validation, cache lookup, deduplication, provider routing, budget
/// enforcement, output contract validation, and learning-loop feedback.
struct AgentStepRunner {
    execution_id: Uuid,
    principal: String,
    task_type: String,
    priority: u8,
    contracts: Arc<AgentContractRegistry>,
    validator: Arc<ContractValidator>,
    provider_router: Arc<ProviderRouter>,
    cache: Arc<ResponseCache>,
    dedup: Arc<Deduplicator>,
    cost_tracker: Arc<CostTracker>,
    execution_records: Arc<dyn ExecutionRecordRepository>,
    learning_loop: Arc<LearningLoop>,
    event_bus: Arc<EventBus>,
    tool_guard: Arc<ToolGuard>,
    tool_executor: Arc<dyn ToolExecutor>,
    metrics: Arc<MetricsRegistry>,
    embedder: Arc<dyn EmbeddingProvider>,
}

#[async_trait::async_trait]
impl StepRunner for AgentStepRunner {
    async fn run(&self, step: &WorkflowStep, cancel: CancellationToken) -> Result<serde_json::Value, String> {
        let agent_id = step.agent_id.as_deref().ok_or_else(|| "step has no agent_id".to_string())?;

        self.event_bus.emit(KernelEvent::AgentStarted { execution_id: self.execution_id, agent_id: agent_id.to_string() }).await;
        let started = std::time::Instant::now();

        let result = match step.step_type {
            StepType::ToolCall => self.run_tool(agent_id, step).await,
            _ => {
                let contract = match self.contracts.get(agent_id) {
                    Some(c) => c,
                    None => return Err(format!("unknown agent '{agent_id}'")),
                };
                self.run_inner(agent_id, contract, step, cancel).await
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        self.event_bus
            .emit(KernelEvent::AgentCompleted {
                execution_id: self.execution_id,
                agent_id: agent_id.to_string(),
                duration_ms,
                quality_score: result.as_ref().ok().and_then(|v| v.get("confidence")).and_then(|v| v.as_f64()),
            })
            .await;

        result
    }
}

impl AgentStepRunner {
    async fn run_inner(
        &self,
        agent_id: &str,
        contract: &crate::domain::models::agent_contract::AgentContract,
        step: &WorkflowStep,
        cancel: CancellationToken,
    ) -> Result<serde_json::Value, String> {
        self.validator.validate_input(agent_id, &step.inputs).map_err(|e| e.to_string())?;

        let prompt = step.inputs.to_string();
        let key = fingerprint(agent_id, &prompt, contract.role_tag.as_str());

        let embedding = self.embedder.embed(&prompt).await.ok();

        match self.cache.lookup(&key, agent_id, embedding.as_deref()).await.map_err(|e| e.to_string())? {
            CacheLookup::ExactHit(entry) => {
                return Ok(serde_json::json!({"text": entry.value, "confidence": 1.0, "cached": true}));
            }
            CacheLookup::KnownBad => return Err("known-bad cached response".to_string()),
            CacheLookup::SemanticHit { .. } | CacheLookup::Miss => {}
        }

        let execution_id = self.execution_id;
        let principal = self.principal.clone();
        let task_type = self.task_type.clone();
        let priority = self.priority;
        let agent_id_owned = agent_id.to_string();
        let provider_router = self.provider_router.clone();
        let cost_tracker = self.cost_tracker.clone();
        let execution_records = self.execution_records.clone();
        let learning_loop = self.learning_loop.clone();
        let validator = self.validator.clone();
        let cache = self.cache.clone();
        let cache_key = key.clone();
        let constraints = contract.constraints.clone();
        let role_tag = contract.role_tag.clone();
        let prompt_for_call = prompt.clone();
        let embedding_for_store = embedding.clone();

        let request = NormalizedRequest {
            prompt: prompt_for_call,
            system_prompt: None,
            max_tokens: constraints.token_budget.min(u32::MAX as u64) as u32,
            temperature: 0.2,
            capability_hint: Some(role_tag.clone()),
            per_call_timeout: Duration::from_secs(constraints.timeout_seconds),
        };

        let outcome = self
            .dedup
            .run_or_join(key.clone(), cancel, async move {
                let routed = provider_router.route(&request, SelectionStrategy::PriorityOrder).await?;

                if cost_tracker.would_exceed(routed.cost_usd, priority).await {
                    return Err(KernelError::BudgetExceeded {
                        spent_usd: cost_tracker.spent_today().await,
                        budget_usd: 0.0,
                    });
                }

                let output = serde_json::json!({"text": routed.response.content, "confidence": 0.85});
                let output_valid = validator.validate_output(&agent_id_owned, &output).is_ok();

                cost_tracker
                    .record_call(
                        execution_id,
                        priority,
                        &routed.provider_id,
                        routed.response.input_tokens,
                        routed.response.output_tokens,
                        routed.cost_usd,
                    )
                    .await?;

                let final_state = if output_valid { TaskState::Completed } else { TaskState::Failed };
                let record = ExecutionRecord {
                    execution_id,
                    agent_id: agent_id_owned.clone(),
                    principal,
                    trace_id: execution_id.to_string(),
                    input_hash: cache_key.0.clone(),
                    tool_calls: vec![],
                    provider_chain: vec![],
                    duration_ms: 0,
                    input_tokens: routed.response.input_tokens,
                    output_tokens: routed.response.output_tokens,
                    cost_usd: routed.cost_usd,
                    final_state,
                    recorded_at: chrono::Utc::now(),
                    task_type,
                    quality_score: Some(0.85),
                };
                execution_records.append(&record).await?;
                learning_loop.record(&record).await;

                if !output_valid {
                    cache.record_negative(cache_key).await;
                    return Err(KernelError::ContractViolation(format!("output of '{agent_id_owned}' failed contract validation")));
                }

                cache
                    .store(CacheEntry {
                        key: cache_key,
                        value: routed.response.content.clone(),
                        embedding: embedding_for_store,
                        agent_id: agent_id_owned,
                        created_at: chrono::Utc::now(),
                        ttl_secs: cache.default_ttl_secs(),
                        access_count: 0,
                    })
                    .await?;

                Ok(output.to_string())
            })
            .await;

        match outcome {
            Ok(text) => serde_json::from_str(&text).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Executes one `ToolCall` step through the guard pipeline: capability,
    /// forbidden-parameter, path-confinement, and rate checks, then either
    /// the approval workflow or the tool itself (spec §4.6).
    async fn run_tool(&self, agent_id: &str, step: &WorkflowStep) -> Result<serde_json::Value, String> {
        let tool_name = step.inputs.get("tool_name").and_then(|v| v.as_str()).ok_or_else(|| "tool step missing tool_name".to_string())?;
        let parameters = step.inputs.get("parameters").cloned().unwrap_or(serde_json::Value::Null);
        let parameter_hash = fingerprint(agent_id, tool_name, &parameters.to_string()).0;

        let decision = self
            .tool_guard
            .authorize(agent_id, &self.principal, tool_name, &parameters, &parameter_hash)
            .await
            .map_err(|e| e.to_string())?;

        match decision {
            GuardDecision::NeedsApproval { approval_id } => {
                Err(format!("tool call '{tool_name}' awaits approval {approval_id}"))
            }
            GuardDecision::Allowed => {
                let started = std::time::Instant::now();
                let result = self.tool_executor.execute(tool_name, &parameters).await;
                let duration_ms = started.elapsed().as_millis() as u64;
                self.metrics.record_request(tool_name, duration_ms, result.is_ok()).await;
                result.map_err(|e| e.to_string())
            }
        }
    }
}
