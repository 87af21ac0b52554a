//! In-memory adapter: useful for testing, benchmarks, and ephemeral sessions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mindloop_core::error::PersistenceError;
use mindloop_core::persistence::{Memory, MemoryQuery, PersistenceAdapter, Room, World};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct Store {
    /// Memories per table, in insertion order
    tables: HashMap<String, Vec<Memory>>,
    rooms: HashMap<String, Room>,
    worlds: HashMap<String, World>,
}

/// A persistence adapter that keeps everything in process memory.
///
/// Cloning shares the underlying store.
#[derive(Clone, Default)]
pub struct InMemoryAdapter {
    store: Arc<RwLock<Store>>,
}

impl InMemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of memories stored in `table`.
    pub async fn count(&self, table: &str) -> usize {
        self.store
            .read()
            .await
            .tables
            .get(table)
            .map_or(0, Vec::len)
    }
}

fn ensure_id(id: &mut String) {
    if id.is_empty() {
        *id = Uuid::new_v4().to_string();
    }
}

#[async_trait]
impl PersistenceAdapter for InMemoryAdapter {
    async fn create_memory(&self, mut memory: Memory, table: &str) -> Result<String, PersistenceError> {
        ensure_id(&mut memory.id);
        let id = memory.id.clone();
        self.store
            .write()
            .await
            .tables
            .entry(table.to_string())
            .or_default()
            .push(memory);
        debug!(table, memory_id = %id, "Stored memory");
        Ok(id)
    }

    async fn get_memories(&self, query: MemoryQuery) -> Result<Vec<Memory>, PersistenceError> {
        let store = self.store.read().await;
        let Some(entries) = store.tables.get(&query.table) else {
            return Ok(Vec::new());
        };

        Ok(entries
            .iter()
            .rev()
            .filter(|m| query.room_id.as_ref().is_none_or(|room| &m.room_id == room))
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn create_room(&self, mut room: Room) -> Result<String, PersistenceError> {
        ensure_id(&mut room.id);
        let id = room.id.clone();
        self.store.write().await.rooms.insert(id.clone(), room);
        Ok(id)
    }

    async fn get_room(&self, id: &str) -> Result<Option<Room>, PersistenceError> {
        Ok(self.store.read().await.rooms.get(id).cloned())
    }

    async fn create_world(&self, mut world: World) -> Result<String, PersistenceError> {
        ensure_id(&mut world.id);
        let id = world.id.clone();
        self.store.write().await.worlds.insert(id.clone(), world);
        Ok(id)
    }

    async fn get_world(&self, id: &str) -> Result<Option<World>, PersistenceError> {
        Ok(self.store.read().await.worlds.get(id).cloned())
    }

    async fn update_world(&self, world: World) -> Result<(), PersistenceError> {
        let mut store = self.store.write().await;
        match store.worlds.get_mut(&world.id) {
            Some(existing) => {
                *existing = world;
                Ok(())
            }
            None => Err(PersistenceError::NotFound {
                kind: "world",
                id: world.id,
            }),
        }
    }
}
