//! Model abstractions: handlers plugins register, and the decision source
//! the runtime consults for every message.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ModelError;
use crate::message::Message;
use crate::state::State;

/// Well-known model type keys.
pub mod model_type {
    pub const TEXT_SMALL: &str = "TEXT_SMALL";
    pub const TEXT_LARGE: &str = "TEXT_LARGE";
    pub const TEXT_EMBEDDING: &str = "TEXT_EMBEDDING";
}

/// A backend that serves one model type (text generation, embeddings, ...).
#[async_trait]
pub trait ModelHandler: Send + Sync {
    async fn invoke(&self, params: Value) -> Result<Value, ModelError>;
}

/// One action requested by a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestedAction {
    pub name: String,

    #[serde(default)]
    pub params: Value,

    /// When false, a failure of this step aborts the rest of the plan
    #[serde(default = "default_recoverable")]
    pub recoverable: bool,
}

fn default_recoverable() -> bool {
    true
}

impl RequestedAction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Value::Null,
            recoverable: true,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn non_recoverable(mut self) -> Self {
        self.recoverable = false;
        self
    }
}

/// What the model decided to do with a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Actions to run, in order
    #[serde(default, deserialize_with = "deserialize_actions")]
    pub actions: Vec<RequestedAction>,

    /// Free-form reply text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// The model's reasoning, kept for diagnostics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
}

impl Decision {
    /// Only reply with text.
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Run the named actions with no parameters.
    pub fn actions<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            actions: names.into_iter().map(RequestedAction::new).collect(),
            ..Self::default()
        }
    }

    pub fn with_action(mut self, action: RequestedAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// Accept either `"NAME"` or `{"name": ..., "params": ...}` per entry.
fn deserialize_actions<'de, D>(deserializer: D) -> Result<Vec<RequestedAction>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entry {
        Name(String),
        Full(RequestedAction),
    }

    let entries = Vec::<Entry>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .map(|e| match e {
            Entry::Name(name) => RequestedAction::new(name),
            Entry::Full(action) => action,
        })
        .collect())
}

/// The decision source consulted once per message.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn decide(&self, message: &Message, state: &State) -> Result<Decision, ModelError>;
}
