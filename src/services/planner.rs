//! Workflow planning: turns a `Task` plus a ranked agent shortlist into a
//! `WorkflowGraph` the executor can run (spec §4.8 / C8).
//!
//! Grounded on the teacher's `workflow_builder::build_workflow_from_decomposition`
//! naming and role, simplified from LLM-driven decomposition (out of scope
//! here, spec's Non-goals) to a direct shortlist-to-DAG mapping: the
//! candidate ranking itself comes from C9's selection engine.

use std::collections::HashSet;

use uuid::Uuid;

use crate::domain::models::task::Task;
use crate::domain::models::workflow::{AggregationPolicy, StepType, WorkflowGraph, WorkflowStep};

/// One ranked agent candidate for a task, in preference order.
#[derive(Debug, Clone)]
pub struct AgentCandidate {
    pub agent_id: String,
}

/// One tool invocation a task requires before its agent step(s) run,
/// carried in `Task::parameters["tool_calls"]` (an array of `{tool_name,
/// parameters}` objects) so the planner stays the only reader of that
/// convention.
#[derive(Debug, Clone)]
pub struct RequestedToolCall {
    pub tool_name: String,
    pub parameters: serde_json::Value,
}

fn requested_tool_calls(task: &Task) -> Vec<RequestedToolCall> {
    task.parameters
        .get("tool_calls")
        .and_then(|v| v.as_array())
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let tool_name = entry.get("tool_name")?.as_str()?.to_string();
                    let parameters = entry.get("parameters").cloned().unwrap_or(serde_json::Value::Null);
                    Some(RequestedToolCall { tool_name, parameters })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// How multiple independent agent calls for one task are combined.
#[derive(Debug, Clone, Copy)]
pub enum FanOutStrategy {
    /// Only the top-ranked candidate runs; the rest become fallback steps
    /// chained behind it, tried in order only if the one before fails.
    PrimaryWithFallbacks,
    /// All candidates run independently and their outputs are merged by an
    /// `Aggregate` step under the given policy.
    ParallelAggregate(AggregationPolicy),
}

/// Builds the initial `WorkflowGraph` for a task from its ranked shortlist.
pub struct Planner;

impl Planner {
    pub fn plan(task: &Task, candidates: &[AgentCandidate], strategy: FanOutStrategy) -> WorkflowGraph {
        let mut graph = WorkflowGraph::new(task.id);
        if candidates.is_empty() {
            return graph;
        }

        match strategy {
            FanOutStrategy::PrimaryWithFallbacks => {
                Self::plan_fallback_chain(&mut graph, task, candidates);
            }
            FanOutStrategy::ParallelAggregate(policy) => {
                Self::plan_parallel_aggregate(&mut graph, task, candidates, policy);
            }
        }

        Self::plan_tool_calls(&mut graph, task, &candidates[0].agent_id);

        graph
    }

    /// Insert one `ToolCall` step per tool the task requests, attributed to
    /// the top-ranked candidate (the only agent identity fixed at planning
    /// time), and gate every currently-entry `AgentCall` step behind them so
    /// the guard pipeline runs — and can reject the plan — before any agent
    /// invocation starts (spec §3 "no agent invokes a tool outside its
    /// allowlist").
    fn plan_tool_calls(graph: &mut WorkflowGraph, task: &Task, primary_agent_id: &str) {
        let requested = requested_tool_calls(task);
        if requested.is_empty() {
            return;
        }

        let entry_step_ids: Vec<Uuid> = graph
            .steps
            .values()
            .filter(|s| s.step_type == StepType::AgentCall && s.state == crate::domain::models::workflow::StepState::Ready)
            .map(|s| s.id)
            .collect();

        let mut tool_step_ids = HashSet::new();
        for call in requested {
            let mut step = WorkflowStep::new(task.id, StepType::ToolCall, HashSet::new());
            step.agent_id = Some(primary_agent_id.to_string());
            step.inputs = serde_json::json!({"tool_name": call.tool_name, "parameters": call.parameters});
            tool_step_ids.insert(graph.add_step(step));
        }

        for id in entry_step_ids {
            if let Some(step) = graph.steps.get_mut(&id) {
                step.depends_on.extend(tool_step_ids.iter().copied());
            }
        }
    }

    fn plan_fallback_chain(graph: &mut WorkflowGraph, task: &Task, candidates: &[AgentCandidate]) {
        let mut previous_id: Option<Uuid> = None;
        let mut step_ids = Vec::new();

        for candidate in candidates {
            let mut step = WorkflowStep::new(task.id, StepType::AgentCall, HashSet::new());
            step.agent_id = Some(candidate.agent_id.clone());
            step.inputs = task.parameters.clone();
            let id = graph.add_step(step);
            step_ids.push(id);
            previous_id = Some(id);
        }

        // Wire each step as the fallback target of the one before it, so the
        // executor only starts a fallback after its predecessor fails.
        for window in step_ids.windows(2) {
            if let [earlier, later] = window {
                if let Some(step) = graph.steps.get_mut(earlier) {
                    step.fallback_step_id = Some(*later);
                }
            }
        }

        // Only the first step is initially ready; the rest are parked until
        // their predecessor fails and promotes them (spec §4.8 fallback semantics).
        for id in step_ids.iter().skip(1) {
            if let Some(step) = graph.steps.get_mut(id) {
                step.state = crate::domain::models::workflow::StepState::Skipped;
            }
        }

        let _ = previous_id;
    }

    fn plan_parallel_aggregate(
        graph: &mut WorkflowGraph,
        task: &Task,
        candidates: &[AgentCandidate],
        policy: AggregationPolicy,
    ) {
        let mut dep_ids = HashSet::new();
        for candidate in candidates {
            let mut step = WorkflowStep::new(task.id, StepType::AgentCall, HashSet::new());
            step.agent_id = Some(candidate.agent_id.clone());
            step.inputs = task.parameters.clone();
            let id = graph.add_step(step);
            dep_ids.insert(id);
        }

        let mut aggregate = WorkflowStep::new(task.id, StepType::Aggregate, dep_ids);
        aggregate.aggregation_policy = Some(policy);
        graph.add_step(aggregate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::task::TaskType;

    fn sample_task() -> Task {
        Task::new("demo", "demo task", TaskType::new("general"), "target", 5, "principal")
    }

    #[test]
    fn fallback_chain_parks_all_but_first_step() {
        let task = sample_task();
        let candidates = vec![
            AgentCandidate { agent_id: "primary".to_string() },
            AgentCandidate { agent_id: "secondary".to_string() },
        ];
        let graph = Planner::plan(&task, &candidates, FanOutStrategy::PrimaryWithFallbacks);

        assert_eq!(graph.ready_steps().len(), 1);
        assert_eq!(graph.steps.len(), 2);
    }

    #[test]
    fn parallel_aggregate_creates_one_aggregate_step() {
        let task = sample_task();
        let candidates = vec![
            AgentCandidate { agent_id: "a".to_string() },
            AgentCandidate { agent_id: "b".to_string() },
        ];
        let graph = Planner::plan(&task, &candidates, FanOutStrategy::ParallelAggregate(AggregationPolicy::Concat));

        assert_eq!(graph.steps.len(), 3);
        assert_eq!(graph.ready_steps().len(), 2);
    }

    #[test]
    fn requested_tool_call_gates_the_entry_agent_step() {
        let mut task = sample_task();
        task.parameters = serde_json::json!({
            "tool_calls": [{"tool_name": "file_write", "parameters": {"path": "/workspace/out.txt"}}],
        });
        let candidates = vec![
            AgentCandidate { agent_id: "primary".to_string() },
            AgentCandidate { agent_id: "secondary".to_string() },
        ];
        let graph = Planner::plan(&task, &candidates, FanOutStrategy::PrimaryWithFallbacks);

        assert_eq!(graph.steps.len(), 3, "two agent steps plus one tool step");
        assert!(graph.ready_steps().is_empty(), "the entry agent step must wait on the tool step");

        let tool_step = graph.steps.values().find(|s| s.step_type == StepType::ToolCall).unwrap();
        assert_eq!(tool_step.agent_id.as_deref(), Some("primary"));
        assert_eq!(tool_step.inputs["tool_name"], serde_json::json!("file_write"));

        let entry_agent_step = graph
            .steps
            .values()
            .find(|s| s.step_type == StepType::AgentCall && s.agent_id.as_deref() == Some("primary"))
            .unwrap();
        assert!(entry_agent_step.depends_on.contains(&tool_step.id));
    }

    #[test]
    fn task_without_tool_calls_plans_unchanged() {
        let task = sample_task();
        let candidates = vec![AgentCandidate { agent_id: "solo".to_string() }];
        let graph = Planner::plan(&task, &candidates, FanOutStrategy::PrimaryWithFallbacks);

        assert_eq!(graph.steps.len(), 1);
        assert_eq!(graph.ready_steps().len(), 1);
    }
}
