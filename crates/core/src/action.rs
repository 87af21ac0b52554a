//! Action trait: validated, executable units of agent behavior.
//!
//! Actions are what let the agent act: reply, look something up, store a
//! fact. A decision names one or more actions; the orchestrator validates
//! them against the current message and state and runs them in order,
//! threading each completed [`ActionResult`] forward through the
//! [`ActionContext`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ComponentError;
use crate::message::Message;
use crate::sink::OutputSink;
use crate::state::State;

/// Key under `ActionResult::data` that names the producing action.
pub const ACTION_NAME_KEY: &str = "actionName";

/// The result of one action step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionResult {
    /// Whether the action achieved what it set out to do
    pub success: bool,

    /// Human-readable outcome
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Scalar values for later steps
    #[serde(default)]
    pub values: Map<String, Value>,

    /// Structured data; carries `actionName` by convention
    #[serde(default)]
    pub data: Map<String, Value>,

    /// Error description when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    /// A successful result attributed to `action`.
    pub fn success(action: &str) -> Self {
        let mut data = Map::new();
        data.insert(ACTION_NAME_KEY.into(), Value::String(action.to_string()));
        Self {
            success: true,
            data,
            ..Self::default()
        }
    }

    /// A failed result attributed to `action`.
    pub fn failure(action: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::success(action)
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// The `data.actionName` this result is attributed to, if any.
    pub fn action_name(&self) -> Option<&str> {
        self.data.get(ACTION_NAME_KEY).and_then(Value::as_str)
    }
}

/// Execution status of a plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Completed,
    Failed,
}

/// One step of a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// The action name as requested by the decision
    pub action: String,

    /// Parameters supplied with the request
    #[serde(default)]
    pub params: Value,

    pub status: StepStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ActionResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlanStep {
    pub fn pending(action: impl Into<String>, params: Value) -> Self {
        Self {
            action: action.into(),
            params,
            status: StepStatus::Pending,
            result: None,
            error: None,
        }
    }
}

/// Per-request record of which actions were attempted and what they produced.
///
/// Only the orchestrator mutates a context; handlers see it read-only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionContext {
    steps: Vec<PlanStep>,
    previous_results: Vec<ActionResult>,
}

impl ActionContext {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self {
            steps,
            previous_results: Vec::new(),
        }
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Results of completed steps, in completion order.
    pub fn previous_results(&self) -> &[ActionResult] {
        &self.previous_results
    }

    /// The most recent completed result whose `data.actionName` equals `action`.
    pub fn get_previous_result(&self, action: &str) -> Option<&ActionResult> {
        self.previous_results
            .iter()
            .rev()
            .find(|r| r.action_name() == Some(action))
    }

    pub fn complete_step(&mut self, index: usize, result: ActionResult) {
        if let Some(step) = self.steps.get_mut(index) {
            step.status = StepStatus::Completed;
            step.error = None;
            step.result = Some(result.clone());
            self.previous_results.push(result);
        }
    }

    pub fn fail_step(&mut self, index: usize, error: impl Into<String>, result: Option<ActionResult>) {
        if let Some(step) = self.steps.get_mut(index) {
            step.status = StepStatus::Failed;
            step.error = Some(error.into());
            step.result = result;
        }
    }

    /// Fail every step from `start` on that has not run yet.
    pub fn fail_pending_from(&mut self, start: usize, error: &str) {
        for step in self.steps.iter_mut().skip(start) {
            if step.status == StepStatus::Pending {
                step.status = StepStatus::Failed;
                step.error = Some(error.to_string());
            }
        }
    }

    pub fn completed_count(&self) -> usize {
        self.count(StepStatus::Completed)
    }

    pub fn failed_count(&self) -> usize {
        self.count(StepStatus::Failed)
    }

    fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }

    pub fn into_parts(self) -> (Vec<PlanStep>, Vec<ActionResult>) {
        (self.steps, self.previous_results)
    }
}

/// One line of an example transcript (documentation only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionExample {
    pub speaker: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl ActionExample {
    pub fn new(speaker: &str, text: &str, action: Option<&str>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            action: action.map(str::to_string),
        }
    }
}

/// Everything a handler gets to see for one step.
pub struct HandlerContext<'a> {
    pub message: &'a Message,
    pub state: &'a State,
    /// Parameters supplied with this step (JSON `null` when none)
    pub options: &'a Value,
    /// Results of the steps completed so far
    pub plan: &'a ActionContext,
    /// Free-form reply text from the decision, if any
    pub reply: Option<&'a str>,
    pub sink: &'a dyn OutputSink,
}

/// The core Action trait.
#[async_trait]
pub trait Action: Send + Sync {
    /// The unique name of this action (e.g., "REPLY").
    fn name(&self) -> &str;

    /// Alternate names a decision may use.
    fn similes(&self) -> &[&str] {
        &[]
    }

    /// A description of what this action does (shown to the model).
    fn description(&self) -> &str;

    /// Example transcripts.
    fn examples(&self) -> Vec<Vec<ActionExample>> {
        Vec::new()
    }

    /// Whether this action makes sense for the message and state.
    async fn validate(&self, _message: &Message, _state: &State) -> Result<bool, ComponentError> {
        Ok(true)
    }

    /// Run the action.
    async fn handle(&self, ctx: HandlerContext<'_>) -> Result<ActionResult, ComponentError>;

    /// Whether a requested name refers to this action, by name or simile.
    fn matches(&self, requested: &str) -> bool {
        let wanted = normalize_action_name(requested);
        normalize_action_name(self.name()) == wanted
            || self.similes().iter().any(|s| normalize_action_name(s) == wanted)
    }
}

/// Canonical form used to compare action names: uppercase, no underscores.
pub fn normalize_action_name(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_uppercase)
        .collect()
}
