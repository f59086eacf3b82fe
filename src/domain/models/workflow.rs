//! WorkflowStep and WorkflowGraph domain models (spec §3 "WorkflowStep", §4.8).

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::domain::errors::KernelError;

/// Kind of work a step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    ModelCall,
    ToolCall,
    AgentCall,
    Aggregate,
}

/// Lifecycle state of a WorkflowStep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Ready,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl StepState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }
}

/// Aggregation policy for an `Aggregate` step (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    Concat,
    WeightedMergeByConfidence,
    SelectBestByScore,
    StructuredUnion,
}

/// A single retry attempt's outcome, kept in the step's attempt log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepAttempt {
    pub attempt_number: u32,
    pub succeeded: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// A node in a task's workflow DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: Uuid,
    pub task_id: Uuid,
    pub step_type: StepType,
    pub depends_on: HashSet<Uuid>,
    pub inputs: serde_json::Value,
    pub outputs: Option<serde_json::Value>,
    pub state: StepState,
    pub retries_used: u32,
    pub attempt_log: Vec<StepAttempt>,
    pub aggregation_policy: Option<AggregationPolicy>,
    pub fallback_step_id: Option<Uuid>,
    pub agent_id: Option<String>,
}

impl WorkflowStep {
    pub fn new(task_id: Uuid, step_type: StepType, depends_on: HashSet<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            step_type,
            depends_on,
            inputs: serde_json::Value::Null,
            outputs: None,
            state: StepState::Ready,
            retries_used: 0,
            attempt_log: Vec::new(),
            aggregation_policy: None,
            fallback_step_id: None,
            agent_id: None,
        }
    }
}

/// The DAG of steps produced by the planner for one task (spec §4.8 "plan").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowGraph {
    pub id: Uuid,
    pub task_id: Uuid,
    pub steps: HashMap<Uuid, WorkflowStep>,
}

impl WorkflowGraph {
    pub fn new(task_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            steps: HashMap::new(),
        }
    }

    pub fn add_step(&mut self, step: WorkflowStep) -> Uuid {
        let id = step.id;
        self.steps.insert(id, step);
        id
    }

    /// Validate the graph is acyclic and every dependency exists.
    pub fn validate_acyclic(&self) -> Result<(), KernelError> {
        let mut visiting = HashSet::new();
        let mut visited = HashSet::new();
        for id in self.steps.keys() {
            self.visit(*id, &mut visiting, &mut visited)?;
        }
        Ok(())
    }

    fn visit(
        &self,
        id: Uuid,
        visiting: &mut HashSet<Uuid>,
        visited: &mut HashSet<Uuid>,
    ) -> Result<(), KernelError> {
        if visited.contains(&id) {
            return Ok(());
        }
        if visiting.contains(&id) {
            return Err(KernelError::InternalInvariant(format!(
                "workflow graph cycle detected at step {id}"
            )));
        }
        visiting.insert(id);
        let step = self
            .steps
            .get(&id)
            .ok_or_else(|| KernelError::InternalInvariant(format!("dangling step ref {id}")))?;
        for dep in &step.depends_on {
            if !self.steps.contains_key(dep) {
                return Err(KernelError::InternalInvariant(format!(
                    "step {id} depends on missing step {dep}"
                )));
            }
            self.visit(*dep, visiting, visited)?;
        }
        visiting.remove(&id);
        visited.insert(id);
        Ok(())
    }

    /// Steps whose dependencies are all Succeeded (or the step has no
    /// dependencies), and which are themselves still Ready.
    pub fn ready_steps(&self) -> Vec<Uuid> {
        self.steps
            .values()
            .filter(|s| {
                s.state == StepState::Ready
                    && s.depends_on.iter().all(|d| {
                        self.steps
                            .get(d)
                            .map(|dep| dep.state == StepState::Succeeded)
                            .unwrap_or(false)
                    })
            })
            .map(|s| s.id)
            .collect()
    }

    pub fn all_terminal(&self) -> bool {
        self.steps.values().all(|s| s.state.is_terminal())
    }

    pub fn any_failed(&self) -> bool {
        self.steps.values().any(|s| s.state == StepState::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_cycle() {
        let task_id = Uuid::new_v4();
        let mut graph = WorkflowGraph::new(task_id);
        let a = WorkflowStep::new(task_id, StepType::ModelCall, HashSet::new());
        let a_id = a.id;
        let mut b = WorkflowStep::new(task_id, StepType::ModelCall, HashSet::from([a_id]));
        let b_id = b.id;
        graph.add_step(a);
        b.depends_on.insert(a_id);
        graph.add_step(b);
        if let Some(a_mut) = graph.steps.get_mut(&a_id) {
            a_mut.depends_on.insert(b_id);
        }
        assert!(graph.validate_acyclic().is_err());
    }

    #[test]
    fn ready_steps_respects_dependencies() {
        let task_id = Uuid::new_v4();
        let mut graph = WorkflowGraph::new(task_id);
        let a = WorkflowStep::new(task_id, StepType::ModelCall, HashSet::new());
        let a_id = a.id;
        let b = WorkflowStep::new(task_id, StepType::ModelCall, HashSet::from([a_id]));
        graph.add_step(a);
        graph.add_step(b);

        let ready = graph.ready_steps();
        assert_eq!(ready, vec![a_id]);

        graph.steps.get_mut(&a_id).unwrap().state = StepState::Succeeded;
        let ready = graph.ready_steps();
        assert_eq!(ready.len(), 1);
        assert_ne!(ready[0], a_id);
    }
}
