//! Runtime events: decoupled observation of the message pipeline.
//!
//! Events are published when something interesting happens while handling a
//! message. Plugins observe them through [`EventHandler`]s; hosts can also
//! subscribe to the broadcast [`EventBus`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::ComponentError;

/// All runtime events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    /// A message entered the pipeline
    MessageReceived {
        message_id: String,
        room_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A plan step is about to run
    ActionStarted {
        message_id: String,
        action: String,
        step: usize,
        timestamp: DateTime<Utc>,
    },

    /// A plan step finished (successfully or not)
    ActionCompleted {
        message_id: String,
        action: String,
        step: usize,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Message processing returned to the caller
    RunEnded {
        message_id: String,
        completed_steps: usize,
        failed_steps: usize,
        error: Option<String>,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Background evaluators finished
    EvaluatorsCompleted {
        message_id: String,
        outcomes: usize,
        errors: usize,
        timestamp: DateTime<Utc>,
    },
}

/// Discriminant used to route events to handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    MessageReceived,
    ActionStarted,
    ActionCompleted,
    RunEnded,
    EvaluatorsCompleted,
}

impl RuntimeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::MessageReceived { .. } => EventKind::MessageReceived,
            Self::ActionStarted { .. } => EventKind::ActionStarted,
            Self::ActionCompleted { .. } => EventKind::ActionCompleted,
            Self::RunEnded { .. } => EventKind::RunEnded,
            Self::EvaluatorsCompleted { .. } => EventKind::EvaluatorsCompleted,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::MessageReceived => "message_received",
            Self::ActionStarted => "action_started",
            Self::ActionCompleted => "action_completed",
            Self::RunEnded => "run_ended",
            Self::EvaluatorsCompleted => "evaluators_completed",
        };
        f.write_str(name)
    }
}

/// A plugin-supplied reaction to one kind of event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Unique name among handlers of the same kind.
    fn name(&self) -> &str;

    fn kind(&self) -> EventKind;

    async fn handle(&self, event: &RuntimeEvent) -> Result<(), ComponentError>;
}

/// A broadcast-based event bus.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<RuntimeEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: RuntimeEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<RuntimeEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
