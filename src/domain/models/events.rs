//! Progress event stream schema (spec §6 "Event stream schema").
//!
//! Per-task events carry a monotonically increasing sequence number and are
//! delivered in submission order within a task (spec §5 "Ordering
//! guarantees"). Transport (WebSocket/REST fan-out) is a collaborator; the
//! kernel only produces these values onto `services::observability`'s
//! `EventBus` (grounded on the teacher's `services::event_bus`).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KernelEvent {
    TaskCreated {
        execution_id: Uuid,
        task_id: Uuid,
    },
    TaskPlanning {
        execution_id: Uuid,
        predicted_agents: Vec<String>,
    },
    TaskProgress {
        execution_id: Uuid,
        step_id: Uuid,
        state: String,
        fraction_complete: f64,
    },
    AgentStarted {
        execution_id: Uuid,
        agent_id: String,
    },
    AgentCompleted {
        execution_id: Uuid,
        agent_id: String,
        duration_ms: u64,
        quality_score: Option<f64>,
    },
    TaskCompleted {
        execution_id: Uuid,
        result: serde_json::Value,
        quality_score: f64,
        cost: f64,
    },
    TaskFailed {
        execution_id: Uuid,
        error_kind: String,
        attempts: usize,
    },
}

/// A `KernelEvent` wrapped with its per-task sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencedEvent {
    pub sequence: u64,
    pub event: KernelEvent,
}
