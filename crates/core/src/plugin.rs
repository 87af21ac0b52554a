//! Plugins: named bundles of contributed components.
//!
//! A plugin is built once at process start from static configuration and is
//! immutable afterwards. Its dependencies determine registration order.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::action::Action;
use crate::error::ComponentError;
use crate::evaluator::Evaluator;
use crate::event::EventHandler;
use crate::model::ModelHandler;
use crate::provider::Provider;
use crate::service::Service;

/// Read-only view of runtime settings handed to plugin init hooks.
pub trait Settings: Send + Sync {
    fn get_setting(&self, key: &str) -> Option<String>;
}

impl Settings for HashMap<String, String> {
    fn get_setting(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Hook run when a plugin is registered, before its components are added.
#[async_trait]
pub trait PluginInit: Send + Sync {
    async fn init(&self, settings: &dyn Settings) -> Result<(), ComponentError>;
}

/// A model handler as contributed by a plugin.
#[derive(Clone)]
pub struct ModelRegistration {
    pub model_type: String,
    /// Explicit priority; falls back to the plugin's priority
    pub priority: Option<i32>,
    pub handler: Arc<dyn ModelHandler>,
}

/// A named bundle of actions, providers, evaluators, services, model
/// handlers, and event handlers.
#[derive(Clone)]
pub struct Plugin {
    pub name: String,
    pub description: String,
    /// Names of plugins that must be registered first
    pub dependencies: Vec<String>,
    pub priority: i32,
    /// Setting keys that must be present for registration to succeed
    pub required_settings: Vec<String>,
    pub actions: Vec<Arc<dyn Action>>,
    pub providers: Vec<Arc<dyn Provider>>,
    pub evaluators: Vec<Arc<dyn Evaluator>>,
    pub services: Vec<Arc<dyn Service>>,
    pub model_handlers: Vec<ModelRegistration>,
    pub event_handlers: Vec<Arc<dyn EventHandler>>,
    pub init: Option<Arc<dyn PluginInit>>,
}

impl Plugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            dependencies: Vec::new(),
            priority: 0,
            required_settings: Vec::new(),
            actions: Vec::new(),
            providers: Vec::new(),
            evaluators: Vec::new(),
            services: Vec::new(),
            model_handlers: Vec::new(),
            event_handlers: Vec::new(),
            init: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn depends_on(mut self, plugin: impl Into<String>) -> Self {
        self.dependencies.push(plugin.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn requires_setting(mut self, key: impl Into<String>) -> Self {
        self.required_settings.push(key.into());
        self
    }

    pub fn with_action(mut self, action: impl Action + 'static) -> Self {
        self.actions.push(Arc::new(action));
        self
    }

    pub fn with_provider(mut self, provider: impl Provider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    pub fn with_evaluator(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.evaluators.push(Arc::new(evaluator));
        self
    }

    pub fn with_service(mut self, service: impl Service + 'static) -> Self {
        self.services.push(Arc::new(service));
        self
    }

    pub fn with_model_handler(
        mut self,
        model_type: impl Into<String>,
        handler: impl ModelHandler + 'static,
    ) -> Self {
        self.model_handlers.push(ModelRegistration {
            model_type: model_type.into(),
            priority: None,
            handler: Arc::new(handler),
        });
        self
    }

    pub fn with_event_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.event_handlers.push(Arc::new(handler));
        self
    }

    pub fn with_init(mut self, init: impl PluginInit + 'static) -> Self {
        self.init = Some(Arc::new(init));
        self
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |items: Vec<&str>| items.join(", ");
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("priority", &self.priority)
            .field("actions", &names(self.actions.iter().map(|a| a.name()).collect()))
            .field("providers", &names(self.providers.iter().map(|p| p.name()).collect()))
            .field("evaluators", &names(self.evaluators.iter().map(|e| e.name()).collect()))
            .field("services", &self.services.len())
            .field("model_handlers", &self.model_handlers.len())
            .field("event_handlers", &self.event_handlers.len())
            .field("has_init", &self.init.is_some())
            .finish()
    }
}
