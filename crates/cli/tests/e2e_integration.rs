//! End-to-end integration tests for the Mindloop runtime.
//!
//! These tests drive whole messages through `AgentRuntime::handle_message`
//! with the built-in plugins, an in-memory persistence adapter, and scripted
//! decisions or model handlers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mindloop_config::AppConfig;
use mindloop_core::action::{Action, ActionResult, HandlerContext, StepStatus};
use mindloop_core::error::{ComponentError, Error, ModelError};
use mindloop_core::evaluator::{Evaluation, EvaluationInput, Evaluator};
use mindloop_core::message::Message;
use mindloop_core::model::{Decision, ModelHandler, RequestedAction, model_type};
use mindloop_core::persistence::table;
use mindloop_core::plugin::Plugin;
use mindloop_core::sink::BufferSink;
use mindloop_memory::InMemoryAdapter;
use mindloop_plugins::{Character, builtin_plugins};
use mindloop_runtime::{AgentRuntime, StaticInvoker};
use serde_json::{Value, json};

// ── Helpers ──────────────────────────────────────────────────────────────

async fn runtime_with(
    adapter: &InMemoryAdapter,
    extra: Vec<Plugin>,
    decision: Decision,
) -> AgentRuntime {
    AgentRuntime::builder()
        .with_plugins(builtin_plugins(
            Character::new("Mindloop", "A helpful agent."),
            Arc::new(adapter.clone()),
        ))
        .with_plugins(extra)
        .with_invoker(Arc::new(StaticInvoker::new(decision)))
        .build()
        .await
        .expect("runtime should build")
}

fn weather_plan() -> Decision {
    Decision::default()
        .with_action(RequestedAction::new("GET_WEATHER").with_params(json!({ "location": "Oslo" })))
        .with_action(RequestedAction::new("SUMMARIZE").with_params(json!({ "of": "GET_WEATHER" })))
}

fn message(text: &str) -> Message {
    Message::new(text).from_entity("alice").in_room("kitchen")
}

struct FailingEvaluator;

#[async_trait]
impl Evaluator for FailingEvaluator {
    fn name(&self) -> &str {
        "REFLECTION"
    }

    fn always_run(&self) -> bool {
        true
    }

    async fn evaluate(&self, _input: EvaluationInput<'_>) -> Result<Evaluation, ComponentError> {
        Err(ComponentError::failed("reflection model offline"))
    }
}

struct PickyAction;

#[async_trait]
impl Action for PickyAction {
    fn name(&self) -> &str {
        "ADMIN_ONLY"
    }

    fn description(&self) -> &str {
        "Only valid for admins"
    }

    async fn validate(&self, message: &Message, _state: &mindloop_core::State) -> Result<bool, ComponentError> {
        Ok(message.entity_id == "admin")
    }

    async fn handle(&self, _ctx: HandlerContext<'_>) -> Result<ActionResult, ComponentError> {
        Ok(ActionResult::success("ADMIN_ONLY"))
    }
}

struct LabelledAction(&'static str);

#[async_trait]
impl Action for LabelledAction {
    fn name(&self) -> &str {
        "SUMMARIZE"
    }

    fn description(&self) -> &str {
        self.0
    }

    async fn handle(&self, _ctx: HandlerContext<'_>) -> Result<ActionResult, ComponentError> {
        Ok(ActionResult::success("SUMMARIZE").with_text(self.0))
    }
}

struct SlowAction;

#[async_trait]
impl Action for SlowAction {
    fn name(&self) -> &str {
        "SLOW_LOOKUP"
    }

    fn description(&self) -> &str {
        "Takes far too long"
    }

    async fn handle(&self, _ctx: HandlerContext<'_>) -> Result<ActionResult, ComponentError> {
        tokio::time::sleep(Duration::from_secs(120)).await;
        Ok(ActionResult::success("SLOW_LOOKUP"))
    }
}

struct JsonModel(Value);

#[async_trait]
impl ModelHandler for JsonModel {
    async fn invoke(&self, params: Value) -> Result<Value, ModelError> {
        if params["prompt"].as_str().is_none_or(|p| !p.contains("Mindloop")) {
            return Err(ModelError::InvalidResponse("prompt missing agent name".into()));
        }
        Ok(Value::String(format!("```json\n{}\n```", self.0)))
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_weather_then_summarize() {
    let adapter = InMemoryAdapter::new();
    let runtime = runtime_with(&adapter, vec![], weather_plan()).await;
    let sink = BufferSink::new();

    let mut result = runtime
        .handle_message(message("check the weather and then summarize"), &sink)
        .await;

    assert!(result.error.is_none(), "unexpected error: {:?}", result.error);
    assert_eq!(result.steps.len(), 2);
    assert!(result.steps.iter().all(|s| s.status == StepStatus::Completed));
    assert_eq!(result.results.len(), 2);
    assert_eq!(result.results[0].action_name(), Some("GET_WEATHER"));

    let summary = result.responses.last().expect("summary emitted");
    assert!(summary.text.starts_with("Summary: Oslo: "));
    assert_eq!(sink.contents().len(), result.responses.len());

    assert!(result.state.text.contains("# About Mindloop"));
    assert!(result.state.text.contains("The current date and time is"));
    assert_eq!(adapter.count(table::FACTS).await, 1);

    let outcomes = result.evaluation.take().expect("evaluators scheduled").wait().await;
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].passed);
    // The inbound message plus one emitted summary.
    assert_eq!(adapter.count(table::MESSAGES).await, 2);
}

#[tokio::test]
async fn e2e_failing_evaluator_is_isolated() {
    let adapter = InMemoryAdapter::new();
    let runtime = runtime_with(
        &adapter,
        vec![Plugin::new("reflection").with_evaluator(FailingEvaluator)],
        Decision::actions(["REPLY"]).with_text("Hi Alice!"),
    )
    .await;

    let mut result = runtime.handle_message(message("hello"), &BufferSink::new()).await;
    assert!(result.is_handled());
    assert_eq!(result.responses[0].text, "Hi Alice!");

    let outcomes = result.evaluation.take().unwrap().wait().await;
    let failed: Vec<_> = outcomes.iter().filter(|o| o.is_error()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].evaluator, "REFLECTION");
    assert_eq!(failed[0].error.as_deref(), Some("reflection model offline"));
    assert!(outcomes.iter().any(|o| o.evaluator == "MEMORY_WRITER" && o.passed));
}

#[tokio::test]
async fn e2e_ineligible_step_does_not_stop_the_plan() {
    let adapter = InMemoryAdapter::new();
    let runtime = runtime_with(
        &adapter,
        vec![Plugin::new("admin").with_action(PickyAction)],
        Decision::actions(["ADMIN_ONLY", "REPLY"]).with_text("Done."),
    )
    .await;

    let result = runtime.handle_message(message("reset everything"), &BufferSink::new()).await;

    assert_eq!(result.steps[0].status, StepStatus::Failed);
    assert!(result.steps[0].error.as_deref().unwrap().contains("not eligible"));
    assert_eq!(result.steps[1].status, StepStatus::Completed);
    assert!(result.is_handled());
}

#[tokio::test]
async fn e2e_latest_registration_wins() {
    let adapter = InMemoryAdapter::new();
    let runtime = runtime_with(
        &adapter,
        vec![
            Plugin::new("override-a")
                .depends_on("weather-demo")
                .with_action(LabelledAction("first override")),
            Plugin::new("override-b")
                .depends_on("override-a")
                .with_action(LabelledAction("second override")),
        ],
        Decision::actions(["SUMMARIZE"]),
    )
    .await;

    let summarizers: Vec<_> = runtime
        .registry()
        .all_actions()
        .iter()
        .filter(|a| a.name() == "SUMMARIZE")
        .collect();
    assert_eq!(summarizers.len(), 1);
    assert_eq!(summarizers[0].description(), "second override");

    let result = runtime.handle_message(message("recap"), &BufferSink::new()).await;
    assert_eq!(result.results[0].text.as_deref(), Some("second override"));
}

#[tokio::test(start_paused = true)]
async fn e2e_request_timeout_keeps_finished_steps() {
    let adapter = InMemoryAdapter::new();
    let mut config = AppConfig::default();
    config.runtime.request_timeout_ms = 5_000;
    let runtime = AgentRuntime::builder()
        .with_config(config)
        .with_plugins(builtin_plugins(Character::new("Mindloop", ""), Arc::new(adapter.clone())))
        .with_plugin(Plugin::new("slow").with_action(SlowAction))
        .with_invoker(Arc::new(StaticInvoker::new(
            Decision::actions(["REPLY", "SLOW_LOOKUP", "NONE"]).with_text("Working on it"),
        )))
        .build()
        .await
        .unwrap();

    let result = runtime.handle_message(message("dig deep"), &BufferSink::new()).await;

    let statuses: Vec<_> = result.steps.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![StepStatus::Completed, StepStatus::Failed, StepStatus::Failed]
    );
    assert!(result.steps[1].error.as_deref().unwrap().starts_with("timed out"));
    assert!(result.steps[2].error.as_deref().unwrap().starts_with("timed out"));
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.responses[0].text, "Working on it");
}

#[tokio::test]
async fn e2e_model_handler_drives_the_decision() {
    let adapter = InMemoryAdapter::new();
    let runtime = AgentRuntime::builder()
        .with_plugins(builtin_plugins(Character::new("Mindloop", ""), Arc::new(adapter.clone())))
        .with_plugin(Plugin::new("fake-llm").with_model_handler(
            model_type::TEXT_LARGE,
            JsonModel(json!({
                "actions": [{ "name": "get_weather", "params": { "location": "Lima" } }, "summarize"],
                "thought": "weather, then a recap"
            })),
        ))
        .build()
        .await
        .unwrap();

    let result = runtime.handle_message(message("weather in Lima?"), &BufferSink::new()).await;

    assert!(result.is_handled(), "unexpected error: {:?}", result.error);
    assert_eq!(result.results.len(), 2);
    assert!(result.responses[0].text.contains("Lima"));
    assert_eq!(
        result.decision.as_ref().unwrap().thought.as_deref(),
        Some("weather, then a recap")
    );
}

#[tokio::test]
async fn e2e_history_reaches_the_next_message() {
    let adapter = InMemoryAdapter::new();
    let runtime = runtime_with(&adapter, vec![], Decision::actions(["REPLY"]).with_text("Noted.")).await;

    let mut first = runtime
        .handle_message(message("my favourite colour is teal"), &BufferSink::new())
        .await;
    first.evaluation.take().unwrap().wait().await;

    let second = runtime.handle_message(message("what did I say?"), &BufferSink::new()).await;
    assert!(second.state.text.contains("alice: my favourite colour is teal"));
    assert!(second.state.text.contains("Mindloop: Noted."));
}

#[tokio::test]
async fn e2e_dependency_cycle_prevents_startup() {
    let err = AgentRuntime::builder()
        .with_plugin(Plugin::new("a").depends_on("b"))
        .with_plugin(Plugin::new("b").depends_on("a"))
        .build()
        .await
        .err()
        .expect("cycle must fail");
    assert!(matches!(err, Error::PluginLoad { .. }));
}

#[tokio::test]
async fn e2e_missing_setting_prevents_startup() {
    let err = AgentRuntime::builder()
        .with_plugin(Plugin::new("paid-api").requires_setting("MINDLOOP_E2E_UNSET_API_KEY"))
        .build()
        .await
        .err()
        .expect("missing setting must fail");
    assert!(matches!(err, Error::MissingSetting { .. }));
}
