//! Built-in plugins for Mindloop.
//!
//! - **bootstrap**: the basics every agent needs. REPLY and NONE actions,
//!   CHARACTER / TIME / RECENT_MESSAGES providers, and the MEMORY_WRITER
//!   evaluator that keeps conversation history.
//! - **weather-demo**: GET_WEATHER and SUMMARIZE, a small multi-step plan
//!   that runs without network access.

pub mod character;
pub mod memory_writer;
pub mod none;
pub mod recent_messages;
pub mod reply;
pub mod summarize;
pub mod time;
pub mod weather;

use std::sync::Arc;

use mindloop_core::persistence::PersistenceAdapter;
use mindloop_core::plugin::Plugin;

pub use character::CharacterProvider;
pub use memory_writer::MemoryWriterEvaluator;
pub use none::NoneAction;
pub use recent_messages::RecentMessagesProvider;
pub use reply::ReplyAction;
pub use summarize::SummarizeAction;
pub use time::TimeProvider;
pub use weather::GetWeatherAction;

pub const BOOTSTRAP: &str = "bootstrap";
pub const WEATHER_DEMO: &str = "weather-demo";

/// Who the agent is, as seen by the CHARACTER provider.
#[derive(Debug, Clone)]
pub struct Character {
    pub name: String,
    pub bio: String,
}

impl Character {
    pub fn new(name: impl Into<String>, bio: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bio: bio.into(),
        }
    }
}

/// The bootstrap plugin.
pub fn bootstrap_plugin(character: Character, persistence: Arc<dyn PersistenceAdapter>) -> Plugin {
    Plugin::new(BOOTSTRAP)
        .with_description("Core actions, context providers, and conversation memory")
        .with_action(ReplyAction)
        .with_action(NoneAction)
        .with_provider(CharacterProvider::new(character.name.clone(), character.bio))
        .with_provider(TimeProvider::new())
        .with_provider(RecentMessagesProvider::new(persistence.clone()))
        .with_evaluator(MemoryWriterEvaluator::new(persistence, character.name))
}

/// The weather demo plugin. Depends on bootstrap.
pub fn weather_demo_plugin(persistence: Arc<dyn PersistenceAdapter>) -> Plugin {
    Plugin::new(WEATHER_DEMO)
        .with_description("Mock weather lookup and plan summaries")
        .depends_on(BOOTSTRAP)
        .with_action(GetWeatherAction::new(persistence))
        .with_action(SummarizeAction)
}

/// Every built-in plugin, in no particular order.
pub fn builtin_plugins(character: Character, persistence: Arc<dyn PersistenceAdapter>) -> Vec<Plugin> {
    vec![
        weather_demo_plugin(persistence.clone()),
        bootstrap_plugin(character, persistence),
    ]
}
