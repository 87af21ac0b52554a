//! The runtime facade: the single entry point hosts call per message.
//!
//! `handle_message` wires the pipeline together:
//!
//! 1. **Compose** provider outputs into a [`State`]
//! 2. **Decide** what to do via the [`ModelInvoker`]
//! 3. **Act** by running the plan through the orchestrator
//! 4. **Evaluate** in the background, without delaying the result
//!
//! It never returns an error: component failures are recorded on their
//! steps, and pipeline-level failures land in
//! [`MessageProcessingResult::error`].

use std::sync::Arc;

use chrono::Utc;
use mindloop_config::AppConfig;
use mindloop_core::action::{ActionContext, ActionResult, PlanStep};
use mindloop_core::error::{ComponentError, Error, ModelError};
use mindloop_core::event::{EventBus, RuntimeEvent};
use mindloop_core::message::{Content, Message};
use mindloop_core::model::{Decision, ModelInvoker};
use mindloop_core::plugin::Plugin;
use mindloop_core::service::Service;
use mindloop_core::sink::{OutputSink, RecordingSink};
use mindloop_core::state::State;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, broadcast};
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::composer::{ComposeOptions, ContextComposer};
use crate::decision::ModelHandlerInvoker;
use crate::evaluator::{EvaluationHandle, EvaluatorRunner};
use crate::events::EventDispatcher;
use crate::isolation::{isolate, isolate_until};
use crate::orchestrator::{ActionOrchestrator, ExecutionRequest};
use crate::registry::Registry;

/// Everything a caller learns about one handled message.
#[derive(Debug, Serialize)]
pub struct MessageProcessingResult {
    pub message_id: String,

    /// The composed decision context
    pub state: State,

    /// Every requested step with its final status
    pub steps: Vec<PlanStep>,

    /// Results of completed steps, in order
    pub results: Vec<ActionResult>,

    /// Everything emitted through the output sink, in order
    pub responses: Vec<Content>,

    /// The decision the plan came from, if one was made
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,

    /// Pipeline-level failure, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub duration_ms: u64,

    /// Background evaluators for this message
    #[serde(skip)]
    pub evaluation: Option<EvaluationHandle>,
}

impl MessageProcessingResult {
    /// True when the message was handled without a pipeline-level error.
    pub fn is_handled(&self) -> bool {
        self.error.is_none()
    }
}

/// Builds an [`AgentRuntime`] from configuration and plugins.
pub struct AgentRuntimeBuilder {
    config: AppConfig,
    plugins: Vec<Plugin>,
    invoker: Option<Arc<dyn ModelInvoker>>,
}

impl AgentRuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            plugins: Vec::new(),
            invoker: None,
        }
    }

    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_plugin(mut self, plugin: Plugin) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn with_plugins(mut self, plugins: impl IntoIterator<Item = Plugin>) -> Self {
        self.plugins.extend(plugins);
        self
    }

    /// Use a fixed decision source instead of the registered model handler.
    pub fn with_invoker(mut self, invoker: Arc<dyn ModelInvoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    /// Validate configuration, register plugins in dependency order, and
    /// start services.
    ///
    /// Fails on any configuration error; no partially registered runtime is
    /// returned.
    pub async fn build(self) -> Result<AgentRuntime, Error> {
        let config = self.config;
        config.validate()?;

        let plugins: Vec<Plugin> = self
            .plugins
            .into_iter()
            .filter(|plugin| {
                let enabled = config.plugins.is_enabled(&plugin.name);
                if !enabled {
                    info!(plugin = %plugin.name, "Plugin disabled by configuration");
                }
                enabled
            })
            .collect();

        let mut builder = Registry::builder();
        builder.register_all(plugins, &config).await?;
        let registry = Arc::new(builder.build());

        let events = EventDispatcher::new(registry.clone(), Arc::new(EventBus::default()))
            .with_handler_timeout(config.runtime.event_handler_timeout());
        let invoker = self.invoker.unwrap_or_else(|| {
            Arc::new(ModelHandlerInvoker::new(registry.clone(), config.agent_name.clone()))
        });

        let mut running = Vec::new();
        for service in registry.services() {
            let started = isolate(async {
                service
                    .start()
                    .await
                    .map_err(|e| ComponentError::failed(e.to_string()))
            })
            .await;
            match started {
                Ok(()) => {
                    info!(service = %service.service_type(), "Service started");
                    running.push(service.clone());
                }
                Err(e) => warn!(service = %service.service_type(), error = %e, "Service failed to start"),
            }
        }

        let composer = ContextComposer::new(registry.clone(), config.runtime.provider_timeout());
        let orchestrator = ActionOrchestrator::new(registry.clone(), events.clone())
            .with_fail_fast(config.runtime.fail_fast_plans);
        let evaluators = EvaluatorRunner::new(
            registry.clone(),
            events.clone(),
            config.runtime.evaluator_timeout(),
        );

        info!(
            agent = %config.agent_name,
            plugins = registry.plugins().len(),
            actions = registry.all_actions().len(),
            providers = registry.all_providers().len(),
            evaluators = registry.all_evaluators().len(),
            "Runtime ready"
        );

        Ok(AgentRuntime {
            agent_id: Uuid::new_v4().to_string(),
            config,
            registry,
            invoker,
            events,
            composer,
            orchestrator,
            evaluators,
            services: Mutex::new(running),
        })
    }
}

impl Default for AgentRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A fully built agent runtime. Cheap to share behind an `Arc`.
pub struct AgentRuntime {
    agent_id: String,
    config: AppConfig,
    registry: Arc<Registry>,
    invoker: Arc<dyn ModelInvoker>,
    events: EventDispatcher,
    composer: ContextComposer,
    orchestrator: ActionOrchestrator,
    evaluators: EvaluatorRunner,
    services: Mutex<Vec<Arc<dyn Service>>>,
}

impl AgentRuntime {
    pub fn builder() -> AgentRuntimeBuilder {
        AgentRuntimeBuilder::new()
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Subscribe to runtime events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<RuntimeEvent>> {
        self.events.subscribe()
    }

    /// Handle one message under the configured request timeout.
    pub async fn handle_message(&self, message: Message, sink: &dyn OutputSink) -> MessageProcessingResult {
        let deadline = self
            .config
            .runtime
            .request_timeout()
            .map(|budget| Instant::now() + budget);
        self.handle_message_with_deadline(message, sink, deadline).await
    }

    /// Handle one message, giving up on unfinished plan steps and event
    /// handlers at `deadline`.
    pub async fn handle_message_with_deadline(
        &self,
        message: Message,
        sink: &dyn OutputSink,
        deadline: Option<Instant>,
    ) -> MessageProcessingResult {
        let started = Instant::now();
        let message_id = message.id.clone();
        info!(message_id = %message_id, room_id = %message.room_id, "Handling message");

        self.events
            .dispatch_until(
                RuntimeEvent::MessageReceived {
                    message_id: message_id.clone(),
                    room_id: message.room_id.clone(),
                    timestamp: Utc::now(),
                },
                deadline,
            )
            .await;

        let state = self
            .composer
            .compose(&message, ComposeOptions::seeded(self.seed_state()))
            .await;

        let decided = isolate_until(deadline, async {
            self.invoker
                .decide(&message, &state)
                .await
                .map_err(ComponentError::from)
        })
        .await;

        let mut error = None;
        let mut context = ActionContext::default();
        let mut responses = Vec::new();
        let decision = match decided {
            Ok(decision) => Some(decision),
            Err(e) => {
                warn!(message_id = %message_id, error = %e, "Decision failed");
                error = Some(format!("decision failed: {e}"));
                None
            }
        };

        if let Some(decision) = &decision {
            let outcome = self
                .orchestrator
                .execute(ExecutionRequest {
                    message: &message,
                    state: &state,
                    plan: &decision.actions,
                    reply: decision.text.as_deref(),
                    sink,
                    deadline,
                })
                .await;
            context = outcome.context;
            responses = outcome.responses;

            if context.completed_count() == 0 {
                match decision.text.as_deref().filter(|t| !t.trim().is_empty()) {
                    Some(text) => {
                        let fallback = RecordingSink::new(sink);
                        let reply = Content::text(text).in_reply_to(message_id.clone());
                        if let Err(e) = fallback.emit(reply).await {
                            warn!(message_id = %message_id, error = %e, "Default reply not delivered");
                            error = Some(format!("default reply not delivered: {e}"));
                        }
                        responses.extend(fallback.into_recorded());
                    }
                    None => {
                        error = Some(if decision.actions.is_empty() {
                            "no actions requested and no default reply".to_string()
                        } else {
                            "no action completed and no default reply".to_string()
                        });
                    }
                }
            }
        }

        let evaluation = (!self.registry.all_evaluators().is_empty())
            .then(|| self.evaluators.spawn(message, state.clone(), responses.clone()));

        let duration_ms = started.elapsed().as_millis() as u64;
        self.events
            .dispatch_until(
                RuntimeEvent::RunEnded {
                    message_id: message_id.clone(),
                    completed_steps: context.completed_count(),
                    failed_steps: context.failed_count(),
                    error: error.clone(),
                    duration_ms,
                    timestamp: Utc::now(),
                },
                deadline,
            )
            .await;

        info!(
            message_id = %message_id,
            completed = context.completed_count(),
            failed = context.failed_count(),
            responses = responses.len(),
            duration_ms,
            "Message handled"
        );

        let (steps, results) = context.into_parts();
        MessageProcessingResult {
            message_id,
            state,
            steps,
            results,
            responses,
            decision,
            error,
            duration_ms,
            evaluation,
        }
    }

    /// Call the preferred model handler for `model_type` directly.
    pub async fn use_model(&self, model_type: &str, params: Value) -> Result<Value, ModelError> {
        let handler = self
            .registry
            .model_handler(model_type)
            .ok_or_else(|| ModelError::NoHandler(model_type.to_string()))?;
        handler.invoke(params).await
    }

    /// Stop running services, most recently started first.
    pub async fn stop(&self) {
        let services: Vec<_> = self.services.lock().await.drain(..).collect();
        for service in services.iter().rev() {
            let stopped = isolate(async {
                service
                    .stop()
                    .await
                    .map_err(|e| ComponentError::failed(e.to_string()))
            })
            .await;
            match stopped {
                Ok(()) => info!(service = %service.service_type(), "Service stopped"),
                Err(e) => warn!(service = %service.service_type(), error = %e, "Service failed to stop"),
            }
        }
    }

    fn seed_state(&self) -> State {
        let mut state = State::new();
        state
            .values
            .insert("agentName".into(), self.config.agent_name.clone().into());
        state
            .values
            .insert("agentId".into(), self.agent_id.clone().into());
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedInvoker, StubAction, StubEvaluator, StubProvider, TextModel};
    use async_trait::async_trait;
    use mindloop_core::action::StepStatus;
    use mindloop_core::error::ServiceError;
    use mindloop_core::event::{EventHandler, EventKind};
    use mindloop_core::model::model_type;
    use mindloop_core::sink::BufferSink;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn runtime(plugin: Plugin, decision: Decision) -> AgentRuntime {
        AgentRuntime::builder()
            .with_plugin(plugin)
            .with_invoker(Arc::new(ScriptedInvoker::new(decision)))
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn composed_state_reaches_the_decision() {
        let invoker = Arc::new(ScriptedInvoker::new(Decision::actions(["OK"])));
        let runtime = AgentRuntime::builder()
            .with_plugin(
                Plugin::new("p")
                    .with_provider(StubProvider::new("FACTS", "the sky is blue"))
                    .with_action(StubAction::new("OK")),
            )
            .with_invoker(invoker.clone())
            .build()
            .await
            .unwrap();

        let result = runtime.handle_message(Message::new("hi"), &BufferSink::new()).await;
        assert!(result.is_handled());
        let seen = invoker.seen_state().unwrap();
        assert_eq!(seen.text, "the sky is blue");
        assert_eq!(seen.value("agentName").unwrap(), "Mindloop");
    }

    #[tokio::test]
    async fn reply_only_decision_emits_default_reply() {
        let runtime = runtime(Plugin::new("p"), Decision::reply("Hello!")).await;
        let sink = BufferSink::new();
        let result = runtime.handle_message(Message::new("hi"), &sink).await;

        assert!(result.is_handled());
        assert!(result.steps.is_empty());
        assert_eq!(result.responses.len(), 1);
        assert_eq!(sink.contents()[0].text, "Hello!");
    }

    #[tokio::test]
    async fn nothing_executed_without_reply_is_an_error() {
        let runtime = runtime(
            Plugin::new("p").with_action(StubAction::new("PICKY").invalid()),
            Decision::actions(["PICKY"]),
        )
        .await;
        let result = runtime.handle_message(Message::new("hi"), &BufferSink::new()).await;

        assert_eq!(result.steps[0].status, StepStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("no action completed and no default reply"));
    }

    #[tokio::test]
    async fn failed_plan_falls_back_to_reply_text() {
        let runtime = runtime(
            Plugin::new("p").with_action(StubAction::new("BROKEN").failing("down")),
            Decision::actions(["BROKEN"]).with_text("Sorry, try later."),
        )
        .await;
        let result = runtime.handle_message(Message::new("hi"), &BufferSink::new()).await;

        assert!(result.is_handled());
        assert_eq!(result.responses[0].text, "Sorry, try later.");
        assert_eq!(result.steps[0].status, StepStatus::Failed);
    }

    #[tokio::test]
    async fn decision_failure_is_top_level() {
        let runtime = AgentRuntime::builder()
            .with_invoker(Arc::new(ScriptedInvoker::failing("rate limited")))
            .build()
            .await
            .unwrap();
        let result = runtime.handle_message(Message::new("hi"), &BufferSink::new()).await;
        assert!(result.error.as_deref().unwrap().contains("rate limited"));
        assert!(result.decision.is_none());
    }

    #[tokio::test]
    async fn evaluator_failure_does_not_touch_the_result() {
        let runtime = runtime(
            Plugin::new("p")
                .with_action(StubAction::new("OK").emitting("done"))
                .with_evaluator(StubEvaluator::new("BAD").failing())
                .with_evaluator(StubEvaluator::new("GOOD")),
            Decision::actions(["OK"]),
        )
        .await;
        let mut result = runtime.handle_message(Message::new("hi"), &BufferSink::new()).await;
        assert!(result.is_handled());

        let outcomes = result.evaluation.take().unwrap().wait().await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_error());
        assert!(!outcomes[1].is_error());
    }

    #[tokio::test]
    async fn disabled_plugins_are_skipped() {
        let mut config = AppConfig::default();
        config.plugins.disabled.push("extra".into());
        let runtime = AgentRuntime::builder()
            .with_config(config)
            .with_plugin(Plugin::new("base").with_action(StubAction::new("BASE")))
            .with_plugin(Plugin::new("extra").with_action(StubAction::new("EXTRA")))
            .with_invoker(Arc::new(ScriptedInvoker::new(Decision::default())))
            .build()
            .await
            .unwrap();
        assert!(runtime.registry().action("EXTRA").is_none());
        assert!(runtime.registry().action("BASE").is_some());
    }

    #[tokio::test]
    async fn invalid_config_refuses_to_build() {
        let mut config = AppConfig::default();
        config.agent_name = "  ".into();
        let err = AgentRuntime::builder().with_config(config).build().await;
        assert!(matches!(err, Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn cycle_refuses_to_build() {
        let err = AgentRuntime::builder()
            .with_plugin(Plugin::new("a").depends_on("b"))
            .with_plugin(Plugin::new("b").depends_on("a"))
            .build()
            .await;
        assert!(matches!(err, Err(Error::PluginLoad { .. })));
    }

    #[tokio::test]
    async fn events_cover_the_run() {
        let runtime = runtime(
            Plugin::new("p").with_action(StubAction::new("OK")),
            Decision::actions(["OK"]),
        )
        .await;
        let mut rx = runtime.subscribe();
        runtime.handle_message(Message::new("hi"), &BufferSink::new()).await;

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind());
        }
        assert_eq!(
            kinds,
            vec![
                EventKind::MessageReceived,
                EventKind::ActionStarted,
                EventKind::ActionCompleted,
                EventKind::RunEnded,
            ]
        );
    }

    #[tokio::test]
    async fn use_model_routes_to_preferred_handler() {
        let runtime = runtime(
            Plugin::new("models").with_model_handler(model_type::TEXT_SMALL, TextModel::new("small talk")),
            Decision::default(),
        )
        .await;
        let out = runtime
            .use_model(model_type::TEXT_SMALL, serde_json::json!({ "prompt": "hi" }))
            .await
            .unwrap();
        assert_eq!(out, "small talk");
        assert!(matches!(
            runtime.use_model(model_type::TEXT_EMBEDDING, Value::Null).await,
            Err(ModelError::NoHandler(_))
        ));
    }

    struct CountingService {
        kind: &'static str,
        fail_start: bool,
        stops: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Service for CountingService {
        fn service_type(&self) -> &str {
            self.kind
        }
        async fn start(&self) -> Result<(), ServiceError> {
            if self.fail_start {
                return Err(ServiceError::StartFailed {
                    service: self.kind.into(),
                    reason: "port in use".into(),
                });
            }
            Ok(())
        }
        async fn stop(&self) -> Result<(), ServiceError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn only_started_services_are_stopped() {
        let stops = Arc::new(AtomicUsize::new(0));
        let runtime = runtime(
            Plugin::new("svc")
                .with_service(CountingService {
                    kind: "scheduler",
                    fail_start: false,
                    stops: stops.clone(),
                })
                .with_service(CountingService {
                    kind: "listener",
                    fail_start: true,
                    stops: stops.clone(),
                }),
            Decision::default(),
        )
        .await;

        runtime.stop().await;
        runtime.stop().await;
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_preserves_completed_work() {
        let runtime = runtime(
            Plugin::new("p")
                .with_action(StubAction::new("FIRST"))
                .with_action(StubAction::new("SLOW").sleeping(Duration::from_secs(30)))
                .with_action(StubAction::new("LAST")),
            Decision::actions(["FIRST", "SLOW", "LAST"]),
        )
        .await;
        let deadline = Instant::now() + Duration::from_secs(2);
        let result = runtime
            .handle_message_with_deadline(Message::new("hi"), &BufferSink::new(), Some(deadline))
            .await;

        assert_eq!(result.results.len(), 1);
        assert_eq!(result.steps[0].status, StepStatus::Completed);
        assert!(result.steps[1].error.as_deref().unwrap().starts_with("timed out"));
        assert!(result.steps[2].error.as_deref().unwrap().starts_with("timed out"));
        assert!(result.is_handled());
    }

    struct StallOnActionStart;

    #[async_trait]
    impl EventHandler for StallOnActionStart {
        fn name(&self) -> &str {
            "stall-on-start"
        }
        fn kind(&self) -> EventKind {
            EventKind::ActionStarted
        }
        async fn handle(&self, _event: &RuntimeEvent) -> Result<(), ComponentError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_event_handler_cannot_outlive_the_deadline() {
        let runtime = runtime(
            Plugin::new("p")
                .with_action(StubAction::new("OK").emitting("done"))
                .with_event_handler(StallOnActionStart),
            Decision::actions(["OK"]),
        )
        .await;
        let started = Instant::now();
        let deadline = started + Duration::from_secs(2);
        let result = runtime
            .handle_message_with_deadline(Message::new("hi"), &BufferSink::new(), Some(deadline))
            .await;

        assert!(started.elapsed() <= Duration::from_secs(3));
        assert_eq!(result.steps.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_event_handler_is_bounded_without_deadline() {
        let mut config = AppConfig::default();
        config.runtime.request_timeout_ms = 0;
        config.runtime.event_handler_timeout_ms = 500;
        let runtime = AgentRuntime::builder()
            .with_config(config)
            .with_plugin(
                Plugin::new("p")
                    .with_action(StubAction::new("OK"))
                    .with_event_handler(StallOnActionStart),
            )
            .with_invoker(Arc::new(ScriptedInvoker::new(Decision::actions(["OK"]))))
            .build()
            .await
            .unwrap();

        let started = Instant::now();
        let result = runtime.handle_message(Message::new("hi"), &BufferSink::new()).await;
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(result.is_handled());
        assert_eq!(result.steps[0].status, StepStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn evaluators_run_after_the_result_is_returned() {
        let runtime = runtime(
            Plugin::new("p")
                .with_action(StubAction::new("OK"))
                .with_evaluator(StubEvaluator::new("SLOW").sleeping(Duration::from_secs(10))),
            Decision::actions(["OK"]),
        )
        .await;
        let started = Instant::now();
        let mut result = runtime.handle_message(Message::new("hi"), &BufferSink::new()).await;

        assert!(started.elapsed() < Duration::from_secs(1));
        let evaluation = result.evaluation.take().unwrap();
        assert!(!evaluation.is_finished());

        let outcomes = evaluation.wait().await;
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].is_error());
    }
}
