//! MEMORY_WRITER: records each exchange so later messages can see it.

use std::sync::Arc;

use async_trait::async_trait;
use mindloop_core::error::ComponentError;
use mindloop_core::evaluator::{Evaluation, EvaluationInput, Evaluator};
use mindloop_core::persistence::{Memory, PersistenceAdapter, table};
use serde_json::json;
use tracing::debug;

/// Stores the inbound message and every emitted response in the
/// `messages` table. Runs for every message.
pub struct MemoryWriterEvaluator {
    persistence: Arc<dyn PersistenceAdapter>,
    agent_entity: String,
}

impl MemoryWriterEvaluator {
    pub fn new(persistence: Arc<dyn PersistenceAdapter>, agent_entity: impl Into<String>) -> Self {
        Self {
            persistence,
            agent_entity: agent_entity.into(),
        }
    }
}

#[async_trait]
impl Evaluator for MemoryWriterEvaluator {
    fn name(&self) -> &str {
        "MEMORY_WRITER"
    }

    fn description(&self) -> &str {
        "Stores the message and the agent's responses as conversation memory"
    }

    fn always_run(&self) -> bool {
        true
    }

    async fn evaluate(&self, input: EvaluationInput<'_>) -> Result<Evaluation, ComponentError> {
        let room_id = &input.message.room_id;
        self.persistence
            .create_memory(Memory::from_message(input.message), table::MESSAGES)
            .await?;

        for content in input.responses {
            self.persistence
                .create_memory(
                    Memory::from_response(&self.agent_entity, room_id, content.clone()),
                    table::MESSAGES,
                )
                .await?;
        }

        let stored = 1 + input.responses.len();
        debug!(room_id = %room_id, stored, "Stored exchange");
        Ok(Evaluation {
            detail: Some(json!({ "stored": stored })),
            ..Evaluation::passed(format!("stored {stored} memories"))
        })
    }
}
