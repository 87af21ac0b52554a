//! # Mindloop Core
//!
//! Domain types, traits, and error definitions for the Mindloop agent runtime.
//! This crate has **no runtime logic**: it defines the domain model that the
//! runtime and every plugin implement against.
//!
//! ## Design Philosophy
//!
//! Every pluggable part (actions, providers, evaluators, services, model
//! handlers, event handlers, persistence, output sinks) is a trait here.
//! Implementations live in plugin crates. This enables:
//! - Composing agents from independent plugins
//! - Easy testing with stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod action;
pub mod error;
pub mod evaluator;
pub mod event;
pub mod message;
pub mod model;
pub mod persistence;
pub mod plugin;
pub mod provider;
pub mod service;
pub mod sink;
pub mod state;

// Re-export key types at crate root for ergonomics
pub use action::{Action, ActionContext, ActionResult, HandlerContext, PlanStep, StepStatus};
pub use error::{ComponentError, Error, Result};
pub use evaluator::{Evaluation, EvaluationInput, Evaluator, EvaluatorOutcome};
pub use event::{EventBus, EventHandler, EventKind, RuntimeEvent};
pub use message::{Content, Message};
pub use model::{Decision, ModelHandler, ModelInvoker, RequestedAction};
pub use persistence::{Memory, MemoryQuery, PersistenceAdapter, Room, World};
pub use plugin::{Plugin, PluginInit, Settings};
pub use provider::Provider;
pub use service::Service;
pub use sink::{BufferSink, ChannelSink, NullSink, OutputSink, RecordingSink};
pub use state::{ProviderResult, State};
