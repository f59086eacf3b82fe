//! Progress event bus (spec §6 "A client consumes progress via an event
//! stream", spec §5 "per-task events on the progress stream are delivered
//! in submission order with a monotonically increasing sequence number").
//!
//! Grounded on the teacher's `services::event_bus` broadcast-based design,
//! narrowed to the kernel's `KernelEvent` schema. Transport (WebSocket/SSE
//! fan-out to API clients) is a collaborator; this type only produces the
//! sequenced values.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::domain::models::{KernelEvent, SequencedEvent};

/// Broadcasts `SequencedEvent`s, assigning a per-task monotonic sequence
/// number to every event (spec §5 ordering guarantee).
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SequencedEvent>,
    sequences: Arc<RwLock<HashMap<Uuid, Arc<AtomicU64>>>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, sequences: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SequencedEvent> {
        self.sender.subscribe()
    }

    async fn next_sequence(&self, execution_id: Uuid) -> u64 {
        let counter = {
            let sequences = self.sequences.read().await;
            sequences.get(&execution_id).cloned()
        };
        let counter = match counter {
            Some(c) => c,
            None => {
                let mut sequences = self.sequences.write().await;
                sequences
                    .entry(execution_id)
                    .or_insert_with(|| Arc::new(AtomicU64::new(0)))
                    .clone()
            }
        };
        counter.fetch_add(1, Ordering::SeqCst)
    }

    fn execution_id_of(event: &KernelEvent) -> Uuid {
        match event {
            KernelEvent::TaskCreated { execution_id, .. }
            | KernelEvent::TaskPlanning { execution_id, .. }
            | KernelEvent::TaskProgress { execution_id, .. }
            | KernelEvent::AgentStarted { execution_id, .. }
            | KernelEvent::AgentCompleted { execution_id, .. }
            | KernelEvent::TaskCompleted { execution_id, .. }
            | KernelEvent::TaskFailed { execution_id, .. } => *execution_id,
        }
    }

    /// Emit an event, assigning it the next sequence number for its task.
    /// Never blocks: a full channel drops the oldest unread event for slow
    /// subscribers, matching `tokio::sync::broadcast`'s lagging-receiver
    /// semantics rather than backpressuring the orchestrator.
    pub async fn emit(&self, event: KernelEvent) {
        let execution_id = Self::execution_id_of(&event);
        let sequence = self.next_sequence(execution_id).await;
        let _ = self.sender.send(SequencedEvent { sequence, event });
    }

    /// Drop the sequence counter for a completed task to bound memory.
    pub async fn forget(&self, execution_id: Uuid) {
        self.sequences.write().await.remove(&execution_id);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequence_numbers_increase_per_task() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let execution_id = Uuid::new_v4();
        let task_id = Uuid::new_v4();

        bus.emit(KernelEvent::TaskCreated { execution_id, task_id }).await;
        bus.emit(KernelEvent::TaskPlanning { execution_id, predicted_agents: vec![] }).await;

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);
    }

    #[tokio::test]
    async fn sequences_are_independent_per_task() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let e1 = Uuid::new_v4();
        let e2 = Uuid::new_v4();

        bus.emit(KernelEvent::TaskCreated { execution_id: e1, task_id: Uuid::new_v4() }).await;
        bus.emit(KernelEvent::TaskCreated { execution_id: e2, task_id: Uuid::new_v4() }).await;

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 0);
    }
}
