//! Task lifecycle event system.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel with a bounded
//! ring-buffer of recent events so that late subscribers can catch up.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::ids::TaskId;

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 100;

// ---------------------------------------------------------------------------
// EventPayload
// ---------------------------------------------------------------------------

/// Payload describing what happened to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    TaskQueued {
        task_id: TaskId,
        kind: String,
    },
    TaskStarted {
        task_id: TaskId,
    },
    TaskFinished {
        task_id: TaskId,
    },
    TaskFailed {
        task_id: TaskId,
        error: String,
    },
    TaskCanceled {
        task_id: TaskId,
    },
}

impl EventPayload {
    /// The task this event refers to.
    pub fn task_id(&self) -> TaskId {
        match self {
            EventPayload::TaskQueued { task_id, .. }
            | EventPayload::TaskStarted { task_id }
            | EventPayload::TaskFinished { task_id }
            | EventPayload::TaskFailed { task_id, .. }
            | EventPayload::TaskCanceled { task_id } => *task_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A timestamped event ready for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub payload: EventPayload,
}

impl Event {
    /// Create a new event with a fresh UUID and the current timestamp.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    recent: RwLock<VecDeque<Event>>,
}

impl EventBus {
    /// Create a new event bus.
    ///
    /// `capacity` controls the broadcast channel buffer size (not the ring
    /// buffer, which is always [`MAX_RECENT_EVENTS`]).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    /// Subscribe to the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Broadcast an event to all current subscribers and store it in the
    /// ring buffer.
    pub fn broadcast(&self, payload: EventPayload) {
        let event = Event::new(payload);

        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(event.clone());
        }

        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        let recent = self.recent.read();
        recent.iter().take(n).cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.tx.receiver_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let task_id = TaskId::new();
        bus.broadcast(EventPayload::TaskQueued {
            task_id,
            kind: "encode".into(),
        });

        let event = rx.try_recv().unwrap();
        assert_eq!(event.payload.task_id(), task_id);
        assert!(matches!(event.payload, EventPayload::TaskQueued { .. }));
    }

    #[test]
    fn recent_events_capped() {
        let bus = EventBus::new(256);
        let task_id = TaskId::new();

        for _ in 0..150 {
            bus.broadcast(EventPayload::TaskStarted { task_id });
        }

        assert_eq!(bus.recent_events(200).len(), MAX_RECENT_EVENTS);
    }

    #[test]
    fn recent_events_newest_first() {
        let bus = EventBus::new(16);
        let task_id = TaskId::new();
        bus.broadcast(EventPayload::TaskStarted { task_id });
        bus.broadcast(EventPayload::TaskFinished { task_id });

        let recent = bus.recent_events(1);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].payload, EventPayload::TaskFinished { task_id });
    }

    #[test]
    fn no_subscribers_does_not_panic() {
        let bus = EventBus::new(4);
        bus.broadcast(EventPayload::TaskFailed {
            task_id: TaskId::new(),
            error: "test".into(),
        });
    }

    #[test]
    fn payload_tagged_serialization() {
        let payload = EventPayload::TaskCanceled {
            task_id: TaskId::new(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "task_canceled");
    }
}
