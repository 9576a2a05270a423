//! Task-changed notifications.
//!
//! Services emit after a successful commit. Emission is fire-and-forget: a sink
//! with no listeners, or a lagging listener, never affects the operation result.

use serde_json::{json, Value};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::task::Task;

pub const CREATED: &str = "task:created";
pub const UPDATED: &str = "task:updated";
pub const DELETED: &str = "task:deleted";

#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    Created(Task),
    Updated(Task),
    Deleted { id: Uuid, owner: Uuid },
}

impl TaskEvent {
    /// Event name on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            TaskEvent::Created(_) => CREATED,
            TaskEvent::Updated(_) => UPDATED,
            TaskEvent::Deleted { .. } => DELETED,
        }
    }

    pub fn owner(&self) -> Uuid {
        match self {
            TaskEvent::Created(t) | TaskEvent::Updated(t) => t.owner,
            TaskEvent::Deleted { owner, .. } => *owner,
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            TaskEvent::Created(t) | TaskEvent::Updated(t) => json!(t),
            TaskEvent::Deleted { id, owner } => json!({ "id": id, "user": owner }),
        }
    }

    /// Rebuild an event from its wire name and JSON payload.
    pub fn from_wire(name: &str, data: &str) -> Option<TaskEvent> {
        match name {
            CREATED => serde_json::from_str(data).ok().map(TaskEvent::Created),
            UPDATED => serde_json::from_str(data).ok().map(TaskEvent::Updated),
            DELETED => {
                let v: Value = serde_json::from_str(data).ok()?;
                let id = v.get("id")?.as_str()?.parse().ok()?;
                let owner = v.get("user")?.as_str()?.parse().ok()?;
                Some(TaskEvent::Deleted { id, owner })
            }
            _ => None,
        }
    }
}

/// Receives task-changed events for push delivery.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: TaskEvent);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: TaskEvent) {}
}

/// Fans events out to every subscribed stream.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<TaskEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: TaskEvent) {
        let name = event.name();
        if self.tx.send(event).is_err() {
            tracing::trace!(event = name, "No subscribers");
        }
    }
}
