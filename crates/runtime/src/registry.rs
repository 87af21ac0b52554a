//! Component registry: the merged set of everything loaded plugins contribute.
//!
//! A [`RegistryBuilder`] collects plugins at startup. [`RegistryBuilder::build`]
//! freezes it into a [`Registry`] that is shared read-only (behind an `Arc`)
//! for the rest of the process. There is no global registry: every runtime
//! owns its own.
//!
//! Registering a component under a name that is already taken replaces the
//! earlier one and moves the name to the end of the composition order.

use std::sync::Arc;

use mindloop_core::action::Action;
use mindloop_core::error::Error;
use mindloop_core::evaluator::Evaluator;
use mindloop_core::event::{EventHandler, EventKind};
use mindloop_core::model::ModelHandler;
use mindloop_core::plugin::{Plugin, Settings};
use mindloop_core::provider::Provider;
use mindloop_core::service::Service;
use serde::Serialize;
use tracing::{debug, info};

use crate::isolation::isolate;
use crate::resolver::resolve_plugin_order;

/// A summary of a registered plugin, kept after its components are merged.
#[derive(Debug, Clone, Serialize)]
pub struct PluginDescriptor {
    pub name: String,
    pub description: String,
    pub dependencies: Vec<String>,
    pub priority: i32,
    pub actions: Vec<String>,
    pub providers: Vec<String>,
    pub evaluators: Vec<String>,
    pub services: Vec<String>,
    pub model_types: Vec<String>,
    pub event_handlers: Vec<String>,
}

impl PluginDescriptor {
    fn describe(plugin: &Plugin) -> Self {
        Self {
            name: plugin.name.clone(),
            description: plugin.description.clone(),
            dependencies: plugin.dependencies.clone(),
            priority: plugin.priority,
            actions: plugin.actions.iter().map(|a| a.name().to_string()).collect(),
            providers: plugin.providers.iter().map(|p| p.name().to_string()).collect(),
            evaluators: plugin.evaluators.iter().map(|e| e.name().to_string()).collect(),
            services: plugin
                .services
                .iter()
                .map(|s| s.service_type().to_string())
                .collect(),
            model_types: plugin
                .model_handlers
                .iter()
                .map(|m| m.model_type.clone())
                .collect(),
            event_handlers: plugin
                .event_handlers
                .iter()
                .map(|h| format!("{}:{}", h.kind(), h.name()))
                .collect(),
        }
    }
}

struct ModelEntry {
    model_type: String,
    plugin: String,
    priority: i32,
    seq: u64,
    handler: Arc<dyn ModelHandler>,
}

/// The frozen, read-only component registry.
#[derive(Default)]
pub struct Registry {
    plugins: Vec<PluginDescriptor>,
    actions: Vec<Arc<dyn Action>>,
    providers: Vec<Arc<dyn Provider>>,
    evaluators: Vec<Arc<dyn Evaluator>>,
    services: Vec<Arc<dyn Service>>,
    model_handlers: Vec<ModelEntry>,
    event_handlers: Vec<Arc<dyn EventHandler>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registered plugins in registration order.
    pub fn plugins(&self) -> &[PluginDescriptor] {
        &self.plugins
    }

    pub fn all_actions(&self) -> &[Arc<dyn Action>] {
        &self.actions
    }

    pub fn all_providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    pub fn all_evaluators(&self) -> &[Arc<dyn Evaluator>] {
        &self.evaluators
    }

    pub fn services(&self) -> &[Arc<dyn Service>] {
        &self.services
    }

    /// Look up an action by exact name, falling back to loose name/simile match.
    pub fn action(&self, name: &str) -> Option<&Arc<dyn Action>> {
        self.actions
            .iter()
            .find(|a| a.name() == name)
            .or_else(|| self.actions.iter().rev().find(|a| a.matches(name)))
    }

    pub fn provider(&self, name: &str) -> Option<&Arc<dyn Provider>> {
        self.providers.iter().find(|p| p.name() == name)
    }

    pub fn service(&self, service_type: &str) -> Option<&Arc<dyn Service>> {
        self.services.iter().find(|s| s.service_type() == service_type)
    }

    /// The highest-priority handler for `model_type`; ties go to the latest
    /// registration.
    pub fn model_handler(&self, model_type: &str) -> Option<Arc<dyn ModelHandler>> {
        self.model_handlers
            .iter()
            .filter(|m| m.model_type == model_type)
            .max_by_key(|m| (m.priority, m.seq))
            .map(|m| m.handler.clone())
    }

    /// Handlers subscribed to `kind`, in registration order.
    pub fn event_handlers(&self, kind: EventKind) -> impl Iterator<Item = &Arc<dyn EventHandler>> {
        self.event_handlers.iter().filter(move |h| h.kind() == kind)
    }
}

/// Mutable registry used during startup.
#[derive(Default)]
pub struct RegistryBuilder {
    registry: Registry,
    next_seq: u64,
}

/// Insert `item`, replacing any earlier item with the same name.
fn upsert<T: ?Sized>(items: &mut Vec<Arc<T>>, item: Arc<T>, name: fn(&T) -> &str, kind: &str) {
    let key = name(item.as_ref()).to_string();
    let before = items.len();
    items.retain(|existing| name(existing.as_ref()) != key);
    if items.len() != before {
        debug!(kind, name = %key, "Replacing previously registered component");
    }
    items.push(item);
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_action(&mut self, action: Arc<dyn Action>) {
        upsert(&mut self.registry.actions, action, |a| a.name(), "action");
    }

    pub fn register_provider(&mut self, provider: Arc<dyn Provider>) {
        upsert(&mut self.registry.providers, provider, |p| p.name(), "provider");
    }

    pub fn register_evaluator(&mut self, evaluator: Arc<dyn Evaluator>) {
        upsert(&mut self.registry.evaluators, evaluator, |e| e.name(), "evaluator");
    }

    pub fn register_service(&mut self, service: Arc<dyn Service>) {
        upsert(&mut self.registry.services, service, |s| s.service_type(), "service");
    }

    /// Register a model handler. A handler from the same plugin for the same
    /// model type is replaced.
    pub fn register_model_handler(
        &mut self,
        model_type: &str,
        plugin: &str,
        priority: i32,
        handler: Arc<dyn ModelHandler>,
    ) {
        let handlers = &mut self.registry.model_handlers;
        handlers.retain(|m| !(m.model_type == model_type && m.plugin == plugin));
        self.next_seq += 1;
        handlers.push(ModelEntry {
            model_type: model_type.to_string(),
            plugin: plugin.to_string(),
            priority,
            seq: self.next_seq,
            handler,
        });
    }

    /// Register an event handler. Handlers are keyed by (kind, name).
    pub fn register_event_handler(&mut self, handler: Arc<dyn EventHandler>) {
        let handlers = &mut self.registry.event_handlers;
        handlers.retain(|h| !(h.kind() == handler.kind() && h.name() == handler.name()));
        handlers.push(handler);
    }

    /// Register one plugin: check required settings, run its init hook, then
    /// merge its components.
    ///
    /// Any failure is fatal and leaves the plugin's components unregistered.
    pub async fn register(&mut self, plugin: Plugin, settings: &dyn Settings) -> Result<(), Error> {
        if self.registry.plugins.iter().any(|p| p.name == plugin.name) {
            return Err(Error::DuplicatePlugin(plugin.name));
        }

        if let Some(key) = plugin
            .required_settings
            .iter()
            .find(|key| settings.get_setting(key).is_none())
        {
            return Err(Error::MissingSetting {
                plugin: plugin.name.clone(),
                key: key.clone(),
            });
        }

        if let Some(init) = &plugin.init {
            isolate(init.init(settings))
                .await
                .map_err(|e| Error::PluginRegistration {
                    plugin: plugin.name.clone(),
                    reason: e.to_string(),
                })?;
        }

        let descriptor = PluginDescriptor::describe(&plugin);

        for action in plugin.actions {
            self.register_action(action);
        }
        for provider in plugin.providers {
            self.register_provider(provider);
        }
        for evaluator in plugin.evaluators {
            self.register_evaluator(evaluator);
        }
        for service in plugin.services {
            self.register_service(service);
        }
        for registration in plugin.model_handlers {
            self.register_model_handler(
                &registration.model_type,
                &plugin.name,
                registration.priority.unwrap_or(plugin.priority),
                registration.handler,
            );
        }
        for handler in plugin.event_handlers {
            self.register_event_handler(handler);
        }

        info!(
            plugin = %descriptor.name,
            actions = descriptor.actions.len(),
            providers = descriptor.providers.len(),
            evaluators = descriptor.evaluators.len(),
            "Registered plugin"
        );
        self.registry.plugins.push(descriptor);
        Ok(())
    }

    /// Resolve dependency order and register every plugin, stopping at the
    /// first failure.
    pub async fn register_all(
        &mut self,
        plugins: Vec<Plugin>,
        settings: &dyn Settings,
    ) -> Result<(), Error> {
        for plugin in resolve_plugin_order(plugins)? {
            self.register(plugin, settings).await?;
        }
        Ok(())
    }

    pub fn build(self) -> Registry {
        self.registry
    }
}
