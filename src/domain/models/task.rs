//! Task domain model (spec §3 "Task").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::KernelError;

/// Lifecycle state of a Task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Planning,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Planning => "planning",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    fn valid_transitions(&self) -> &'static [TaskState] {
        match self {
            Self::Pending => &[Self::Planning, Self::Cancelled],
            Self::Planning => &[Self::Running, Self::Failed, Self::Cancelled],
            Self::Running => &[Self::Completed, Self::Failed, Self::Cancelled],
            Self::Completed => &[],
            Self::Failed => &[],
            Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: TaskState) -> bool {
        self.valid_transitions().contains(&next)
    }
}

/// Free-form task type tag (task_type enum in spec is deployment-defined
/// vocabulary, so it's modeled as a newtype over a bounded string rather
/// than a closed Rust enum — see spec §9 "agent roster is a registry").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskType(pub String);

impl TaskType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A structured task request and its execution record (spec §3 "Task").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub title: String,
    pub description: String,
    pub task_type: TaskType,
    pub target: String,
    pub priority: u8,
    pub principal: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub state: TaskState,
    pub assigned_agents: Vec<String>,
    pub workflow_graph_id: Option<Uuid>,
    pub result: Option<serde_json::Value>,
    pub quality_score: Option<f64>,
    pub duration_ms: Option<u64>,
    pub cost_usd: Option<f64>,
    pub deadline: Option<DateTime<Utc>>,
    pub parameters: serde_json::Value,
}

impl Task {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        task_type: TaskType,
        target: impl Into<String>,
        priority: u8,
        principal: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            execution_id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            task_type,
            target: target.into(),
            priority: priority.clamp(1, 10),
            principal: principal.into(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            state: TaskState::Pending,
            assigned_agents: Vec::new(),
            workflow_graph_id: None,
            result: None,
            quality_score: None,
            duration_ms: None,
            cost_usd: None,
            deadline: None,
            parameters: serde_json::Value::Null,
        }
    }

    /// Attempt a lifecycle transition, enforcing "terminal states are
    /// immutable" (spec §3 invariants).
    pub fn transition(&mut self, next: TaskState) -> Result<(), KernelError> {
        if self.state.is_terminal() {
            return Err(KernelError::InvalidStateTransition {
                from: self.state.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        if !self.state.can_transition_to(next) {
            return Err(KernelError::InvalidStateTransition {
                from: self.state.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        match next {
            TaskState::Running if self.started_at.is_none() => {
                self.started_at = Some(Utc::now());
            }
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled => {
                self.completed_at = Some(Utc::now());
                if let Some(started) = self.started_at {
                    self.duration_ms = Some(
                        (Utc::now() - started).num_milliseconds().max(0) as u64,
                    );
                }
            }
            _ => {}
        }
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_starts_pending() {
        let t = Task::new("t", "d", TaskType::new("code_analysis"), "repo/foo", 5, "u1");
        assert_eq!(t.state, TaskState::Pending);
        assert_eq!(t.priority, 5);
    }

    #[test]
    fn priority_clamped_to_range() {
        let t = Task::new("t", "d", TaskType::new("x"), "y", 50, "u1");
        assert_eq!(t.priority, 10);
        let t = Task::new("t", "d", TaskType::new("x"), "y", 0, "u1");
        assert_eq!(t.priority, 1);
    }

    #[test]
    fn terminal_states_are_immutable() {
        let mut t = Task::new("t", "d", TaskType::new("x"), "y", 5, "u1");
        t.transition(TaskState::Planning).unwrap();
        t.transition(TaskState::Running).unwrap();
        t.transition(TaskState::Completed).unwrap();
        assert!(t.transition(TaskState::Running).is_err());
        assert!(t.transition(TaskState::Failed).is_err());
    }

    #[test]
    fn invalid_transition_rejected() {
        let mut t = Task::new("t", "d", TaskType::new("x"), "y", 5, "u1");
        assert!(t.transition(TaskState::Completed).is_err());
    }
}
