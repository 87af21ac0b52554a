//! Persistence adapter: the storage collaborator used by actions and
//! providers.
//!
//! The orchestration core never calls the adapter itself; plugin components
//! do, and any failure they hit is isolated like every other component error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::message::{Content, Message};

/// Well-known memory tables.
pub mod table {
    pub const MESSAGES: &str = "messages";
    pub const FACTS: &str = "facts";
}

/// A stored memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// Unique ID (assigned by the adapter when empty)
    pub id: String,
    pub entity_id: String,
    pub room_id: String,
    pub content: Content,
    pub created_at: DateTime<Utc>,
}

impl Memory {
    /// A memory recording an inbound message.
    pub fn from_message(message: &Message) -> Self {
        Self {
            id: message.id.clone(),
            entity_id: message.entity_id.clone(),
            room_id: message.room_id.clone(),
            content: message.content.clone(),
            created_at: message.timestamp,
        }
    }

    /// A memory recording content the agent emitted into a room.
    pub fn from_response(agent_id: &str, room_id: &str, content: Content) -> Self {
        Self {
            id: String::new(),
            entity_id: agent_id.to_string(),
            room_id: room_id.to_string(),
            content,
            created_at: Utc::now(),
        }
    }
}

/// A query for stored memories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryQuery {
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    /// Maximum number of results, most recent first
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

impl MemoryQuery {
    pub fn room(table: &str, room_id: &str, limit: usize) -> Self {
        Self {
            table: table.to_string(),
            room_id: Some(room_id.to_string()),
            limit,
        }
    }
}

/// A conversation space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_id: Option<String>,
}

/// A group of rooms (a server, a workspace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// The storage collaborator.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// Store a memory in `table`. Returns its ID.
    async fn create_memory(&self, memory: Memory, table: &str) -> Result<String, PersistenceError>;

    /// Fetch memories, most recent first.
    async fn get_memories(&self, query: MemoryQuery) -> Result<Vec<Memory>, PersistenceError>;

    async fn create_room(&self, room: Room) -> Result<String, PersistenceError>;

    async fn get_room(&self, id: &str) -> Result<Option<Room>, PersistenceError>;

    async fn create_world(&self, world: World) -> Result<String, PersistenceError>;

    async fn get_world(&self, id: &str) -> Result<Option<World>, PersistenceError>;

    /// Replace an existing world. Fails when the world does not exist.
    async fn update_world(&self, world: World) -> Result<(), PersistenceError>;
}
