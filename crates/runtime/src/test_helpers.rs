//! Scripted stand-ins for plugin components, shared by the runtime's tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mindloop_core::action::{Action, ActionResult, HandlerContext};
use mindloop_core::error::{ComponentError, ModelError};
use mindloop_core::evaluator::{Evaluation, EvaluationInput, Evaluator};
use mindloop_core::message::{Content, Message};
use mindloop_core::model::{Decision, ModelHandler, ModelInvoker};
use mindloop_core::plugin::{PluginInit, Settings};
use mindloop_core::provider::Provider;
use mindloop_core::state::{ProviderResult, State};
use serde_json::Value;

#[derive(Clone)]
enum Validity {
    Valid,
    Invalid,
    Errors,
    Panics,
}

#[derive(Clone)]
enum Behavior {
    Succeed,
    Fail(String),
    Unsuccessful(String),
    Panic,
    Sleep(Duration),
}

/// An action whose validator and handler do whatever the test scripts.
pub struct StubAction {
    name: String,
    description: String,
    similes: Vec<&'static str>,
    validity: Validity,
    behavior: Behavior,
    emit: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl StubAction {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: format!("stub {name}"),
            similes: Vec::new(),
            validity: Validity::Valid,
            behavior: Behavior::Succeed,
            emit: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_similes(mut self, similes: &[&'static str]) -> Self {
        self.similes = similes.to_vec();
        self
    }

    pub fn invalid(mut self) -> Self {
        self.validity = Validity::Invalid;
        self
    }

    pub fn validator_errors(mut self) -> Self {
        self.validity = Validity::Errors;
        self
    }

    pub fn validator_panics(mut self) -> Self {
        self.validity = Validity::Panics;
        self
    }

    pub fn failing(mut self, reason: &str) -> Self {
        self.behavior = Behavior::Fail(reason.to_string());
        self
    }

    pub fn unsuccessful(mut self, reason: &str) -> Self {
        self.behavior = Behavior::Unsuccessful(reason.to_string());
        self
    }

    pub fn panicking(mut self) -> Self {
        self.behavior = Behavior::Panic;
        self
    }

    pub fn sleeping(mut self, duration: Duration) -> Self {
        self.behavior = Behavior::Sleep(duration);
        self
    }

    pub fn emitting(mut self, text: &str) -> Self {
        self.emit = Some(text.to_string());
        self
    }

    /// Shared counter of handler invocations.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl Action for StubAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn similes(&self) -> &[&str] {
        &self.similes
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn validate(&self, _message: &Message, _state: &State) -> Result<bool, ComponentError> {
        match self.validity {
            Validity::Valid => Ok(true),
            Validity::Invalid => Ok(false),
            Validity::Errors => Err(ComponentError::failed("validator unavailable")),
            Validity::Panics => panic!("validator bug"),
        }
    }

    async fn handle(&self, ctx: HandlerContext<'_>) -> Result<ActionResult, ComponentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(text) = &self.emit {
            ctx.sink.emit(Content::text(text.clone())).await?;
        }
        match &self.behavior {
            Behavior::Succeed => {
                Ok(ActionResult::success(&self.name).with_text(format!("{} done", self.name)))
            }
            Behavior::Fail(reason) => Err(ComponentError::failed(reason.clone())),
            Behavior::Unsuccessful(reason) => Ok(ActionResult::failure(&self.name, reason.clone())),
            Behavior::Panic => panic!("{} handler bug", self.name),
            Behavior::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(ActionResult::success(&self.name))
            }
        }
    }
}

/// A provider returning fixed text, optionally misbehaving.
pub struct StubProvider {
    name: String,
    text: String,
    position: Option<i32>,
    private: bool,
    values: Vec<(String, Value)>,
    behavior: Behavior,
}

impl StubProvider {
    pub fn new(name: &str, text: &str) -> Self {
        Self {
            name: name.to_string(),
            text: text.to_string(),
            position: None,
            private: false,
            values: Vec::new(),
            behavior: Behavior::Succeed,
        }
    }

    pub fn at(mut self, position: i32) -> Self {
        self.position = Some(position);
        self
    }

    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    pub fn with_value(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.values.push((key.to_string(), value.into()));
        self
    }

    pub fn failing(mut self) -> Self {
        self.behavior = Behavior::Fail(format!("{} unavailable", self.name));
        self
    }

    pub fn panicking(mut self) -> Self {
        self.behavior = Behavior::Panic;
        self
    }

    pub fn sleeping(mut self, duration: Duration) -> Self {
        self.behavior = Behavior::Sleep(duration);
        self
    }
}

#[async_trait]
impl Provider for StubProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn position(&self) -> Option<i32> {
        self.position
    }

    fn private(&self) -> bool {
        self.private
    }

    async fn get(&self, _message: &Message, _state: &State) -> Result<ProviderResult, ComponentError> {
        match &self.behavior {
            Behavior::Fail(reason) | Behavior::Unsuccessful(reason) => {
                return Err(ComponentError::failed(reason.clone()));
            }
            Behavior::Panic => panic!("{} provider bug", self.name),
            Behavior::Sleep(duration) => tokio::time::sleep(*duration).await,
            Behavior::Succeed => {}
        }
        Ok(self
            .values
            .iter()
            .fold(ProviderResult::text(self.text.clone()), |result, (k, v)| {
                result.with_value(k.clone(), v.clone())
            }))
    }
}

/// An evaluator with a scripted verdict.
pub struct StubEvaluator {
    name: String,
    always_run: bool,
    validity: Validity,
    behavior: Behavior,
    seen_responses: Arc<Mutex<Vec<Content>>>,
}

impl StubEvaluator {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            always_run: false,
            validity: Validity::Valid,
            behavior: Behavior::Succeed,
            seen_responses: Arc::default(),
        }
    }

    pub fn always_run(mut self) -> Self {
        self.always_run = true;
        self
    }

    pub fn invalid(mut self) -> Self {
        self.validity = Validity::Invalid;
        self
    }

    pub fn failing(mut self) -> Self {
        self.behavior = Behavior::Fail(format!("{} crashed", self.name));
        self
    }

    pub fn panicking(mut self) -> Self {
        self.behavior = Behavior::Panic;
        self
    }

    pub fn sleeping(mut self, duration: Duration) -> Self {
        self.behavior = Behavior::Sleep(duration);
        self
    }

    pub fn seen_responses(&self) -> Arc<Mutex<Vec<Content>>> {
        self.seen_responses.clone()
    }
}

#[async_trait]
impl Evaluator for StubEvaluator {
    fn name(&self) -> &str {
        &self.name
    }

    fn always_run(&self) -> bool {
        self.always_run
    }

    async fn validate(&self, _message: &Message, _state: &State) -> Result<bool, ComponentError> {
        match self.validity {
            Validity::Valid => Ok(true),
            Validity::Invalid => Ok(false),
            Validity::Errors => Err(ComponentError::failed("validator unavailable")),
            Validity::Panics => panic!("validator bug"),
        }
    }

    async fn evaluate(&self, input: EvaluationInput<'_>) -> Result<Evaluation, ComponentError> {
        self.seen_responses
            .lock()
            .unwrap()
            .extend(input.responses.iter().cloned());
        match &self.behavior {
            Behavior::Succeed | Behavior::Unsuccessful(_) => Ok(Evaluation::passed("looks fine")),
            Behavior::Fail(reason) => Err(ComponentError::failed(reason.clone())),
            Behavior::Panic => panic!("{} evaluator bug", self.name),
            Behavior::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(Evaluation::passed("slow but fine"))
            }
        }
    }
}

/// A model handler that always answers with the same string.
pub struct TextModel(String);

impl TextModel {
    pub fn new(text: &str) -> Self {
        Self(text.to_string())
    }
}

#[async_trait]
impl ModelHandler for TextModel {
    async fn invoke(&self, _params: Value) -> Result<Value, ModelError> {
        Ok(Value::String(self.0.clone()))
    }
}

/// An init hook that always refuses.
pub struct FailingInit;

#[async_trait]
impl PluginInit for FailingInit {
    async fn init(&self, _settings: &dyn Settings) -> Result<(), ComponentError> {
        Err(ComponentError::failed("database unreachable"))
    }
}

/// A decision source that returns a scripted answer and remembers the state
/// it was shown.
pub struct ScriptedInvoker {
    answer: Result<Decision, ModelError>,
    seen_state: Mutex<Option<State>>,
}

impl ScriptedInvoker {
    pub fn new(decision: Decision) -> Self {
        Self {
            answer: Ok(decision),
            seen_state: Mutex::new(None),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            answer: Err(ModelError::Failed(reason.to_string())),
            seen_state: Mutex::new(None),
        }
    }

    pub fn seen_state(&self) -> Option<State> {
        self.seen_state.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelInvoker for ScriptedInvoker {
    async fn decide(&self, _message: &Message, state: &State) -> Result<Decision, ModelError> {
        *self.seen_state.lock().unwrap() = Some(state.clone());
        self.answer.clone()
    }
}
