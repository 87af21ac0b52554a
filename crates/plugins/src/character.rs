//! CHARACTER: who the agent is.

use async_trait::async_trait;
use mindloop_core::error::ComponentError;
use mindloop_core::message::Message;
use mindloop_core::provider::Provider;
use mindloop_core::state::{ProviderResult, State};

/// The agent's name and bio. Runs before every other provider.
#[derive(Debug, Clone)]
pub struct CharacterProvider {
    name: String,
    bio: String,
}

impl CharacterProvider {
    pub fn new(name: impl Into<String>, bio: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bio: bio.into(),
        }
    }
}

#[async_trait]
impl Provider for CharacterProvider {
    fn name(&self) -> &str {
        "CHARACTER"
    }

    fn description(&self) -> &str {
        "The agent's name and personality"
    }

    fn position(&self) -> Option<i32> {
        Some(-100)
    }

    async fn get(&self, _message: &Message, _state: &State) -> Result<ProviderResult, ComponentError> {
        let mut text = format!("# About {}", self.name);
        if !self.bio.trim().is_empty() {
            text.push('\n');
            text.push_str(self.bio.trim());
        }
        Ok(ProviderResult::text(text)
            .with_value("agentName", self.name.clone())
            .with_value("bio", self.bio.clone()))
    }
}
