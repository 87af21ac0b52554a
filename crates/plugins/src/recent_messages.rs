//! RECENT_MESSAGES: the conversation so far in this room.

use std::sync::Arc;

use async_trait::async_trait;
use mindloop_core::error::ComponentError;
use mindloop_core::message::Message;
use mindloop_core::persistence::{MemoryQuery, PersistenceAdapter, table};
use mindloop_core::provider::Provider;
use mindloop_core::state::{ProviderResult, State};
use tracing::debug;

pub const DEFAULT_LIMIT: usize = 10;

pub struct RecentMessagesProvider {
    persistence: Arc<dyn PersistenceAdapter>,
    limit: usize,
}

impl RecentMessagesProvider {
    pub fn new(persistence: Arc<dyn PersistenceAdapter>) -> Self {
        Self {
            persistence,
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[async_trait]
impl Provider for RecentMessagesProvider {
    fn name(&self) -> &str {
        "RECENT_MESSAGES"
    }

    fn description(&self) -> &str {
        "Recent messages exchanged in the current room"
    }

    fn position(&self) -> Option<i32> {
        Some(100)
    }

    fn dynamic(&self) -> bool {
        true
    }

    async fn get(&self, message: &Message, _state: &State) -> Result<ProviderResult, ComponentError> {
        let memories = self
            .persistence
            .get_memories(MemoryQuery::room(table::MESSAGES, &message.room_id, self.limit))
            .await?;
        debug!(room_id = %message.room_id, count = memories.len(), "Loaded recent messages");

        if memories.is_empty() {
            return Ok(ProviderResult::new().with_value("recentMessageCount", 0));
        }

        // Stored newest first; show oldest first.
        let lines: Vec<String> = memories
            .iter()
            .rev()
            .map(|m| format!("{}: {}", m.entity_id, m.content.text))
            .collect();

        let data = serde_json::to_value(&memories)
            .map_err(|e| ComponentError::failed(format!("could not encode recent messages: {e}")))?;
        Ok(ProviderResult::text(format!("# Recent messages\n{}", lines.join("\n")))
            .with_value("recentMessageCount", memories.len())
            .with_data("recentMessages", data))
    }
}
