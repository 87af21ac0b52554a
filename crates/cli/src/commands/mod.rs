pub mod plugins;
pub mod run;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use mindloop_config::AppConfig;
use mindloop_core::persistence::PersistenceAdapter;
use mindloop_core::plugin::Plugin;
use mindloop_plugins::{Character, builtin_plugins};
use tracing::debug;

/// Load the config file (or defaults) and apply environment overrides.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.apply_overrides(|key| std::env::var(key).ok())?;
            Ok(config)
        }
        None => AppConfig::load().context("Failed to load config"),
    }
}

pub fn plugins_for(config: &AppConfig, persistence: Arc<dyn PersistenceAdapter>) -> Vec<Plugin> {
    debug!(agent = %config.agent_name, disabled = ?config.plugins.disabled, "Assembling built-in plugins");
    builtin_plugins(
        Character::new(config.agent_name.clone(), config.bio.clone()),
        persistence,
    )
}
