//! The Mindloop message pipeline.
//!
//! Plugins are resolved and registered once at startup into an immutable
//! [`Registry`]. Each inbound message then flows through:
//!
//! 1. **Compose**: providers build the decision [`State`](mindloop_core::State)
//! 2. **Decide**: a [`ModelInvoker`](mindloop_core::ModelInvoker) picks actions
//! 3. **Act**: the [`ActionOrchestrator`] runs the plan step by step
//! 4. **Evaluate**: the [`EvaluatorRunner`] reviews the exchange in the background
//!
//! [`AgentRuntime::handle_message`] is the single entry point for hosts.

pub mod composer;
pub mod decision;
pub mod evaluator;
pub mod events;
pub mod isolation;
pub mod orchestrator;
pub mod registry;
pub mod resolver;
pub mod runtime;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use composer::{ComposeOptions, ContextComposer};
pub use decision::{ModelHandlerInvoker, StaticInvoker, parse_decision};
pub use evaluator::{EvaluationHandle, EvaluatorRunner};
pub use events::EventDispatcher;
pub use orchestrator::{ActionOrchestrator, ExecutionRequest, PlanOutcome};
pub use registry::{PluginDescriptor, Registry, RegistryBuilder};
pub use resolver::resolve_plugin_order;
pub use runtime::{AgentRuntime, AgentRuntimeBuilder, MessageProcessingResult};
