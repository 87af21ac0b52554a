//! Message and Content value objects.
//!
//! These flow through the entire pipeline:
//! a transport receives a [`Message`] → the runtime composes context for it →
//! actions emit [`Content`] back through an output sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The payload of a message or of an emitted response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// The text content
    #[serde(default)]
    pub text: String,

    /// The action that produced this content (for emitted responses)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Where the content came from (transport name, action source, etc.)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// The message ID this content responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,

    /// Free-form metadata
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Content {
    /// Create text-only content.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Tag this content with the action that produced it.
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Mark this content as a response to the given message.
    pub fn in_reply_to(mut self, message_id: impl Into<String>) -> Self {
        self.in_reply_to = Some(message_id.into());
        self
    }
}

/// An inbound message handed to the runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message (platform-independent entity ID)
    pub entity_id: String,

    /// The room (chat, channel, DM) the message was posted in
    pub room_id: String,

    /// The message payload
    pub content: Content,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new message with fresh IDs.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            entity_id: Uuid::new_v4().to_string(),
            room_id: Uuid::new_v4().to_string(),
            content: Content::text(text),
            timestamp: Utc::now(),
        }
    }

    /// Set the sending entity.
    pub fn from_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = entity_id.into();
        self
    }

    /// Set the room.
    pub fn in_room(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = room_id.into();
        self
    }

    /// Set the transport source.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.content.source = Some(source.into());
        self
    }

    /// The message text.
    pub fn text(&self) -> &str {
        &self.content.text
    }
}
