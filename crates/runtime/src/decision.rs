//! Decision sources: what turns a composed [`State`] into a plan.
//!
//! [`ModelHandlerInvoker`] asks the registered `TEXT_LARGE` model handler and
//! parses its answer. [`StaticInvoker`] always returns the same decision,
//! which is what hosts without a model (and most tests) use.

use std::sync::Arc;

use async_trait::async_trait;
use mindloop_core::error::ModelError;
use mindloop_core::message::Message;
use mindloop_core::model::{Decision, ModelInvoker, model_type};
use mindloop_core::state::State;
use serde_json::{Value, json};
use tracing::debug;

use crate::registry::Registry;

/// Always decides the same thing.
#[derive(Debug, Clone, Default)]
pub struct StaticInvoker {
    decision: Decision,
}

impl StaticInvoker {
    pub fn new(decision: Decision) -> Self {
        Self { decision }
    }
}

#[async_trait]
impl ModelInvoker for StaticInvoker {
    async fn decide(&self, _message: &Message, _state: &State) -> Result<Decision, ModelError> {
        Ok(self.decision.clone())
    }
}

/// Decides by calling the highest-priority model handler for a model type.
pub struct ModelHandlerInvoker {
    registry: Arc<Registry>,
    model_type: String,
    agent_name: String,
}

impl ModelHandlerInvoker {
    pub fn new(registry: Arc<Registry>, agent_name: impl Into<String>) -> Self {
        Self {
            registry,
            model_type: model_type::TEXT_LARGE.to_string(),
            agent_name: agent_name.into(),
        }
    }

    pub fn with_model_type(mut self, model_type: impl Into<String>) -> Self {
        self.model_type = model_type.into();
        self
    }

    fn build_params(&self, message: &Message, state: &State) -> Value {
        let actions: Vec<Value> = self
            .registry
            .all_actions()
            .iter()
            .map(|a| json!({ "name": a.name(), "description": a.description() }))
            .collect();

        let prompt = format!(
            "You are {agent}.\n\n{context}\n\nMessage: {text}\n\n\
             Respond with JSON: {{\"actions\": [\"ACTION_NAME\", ...], \"text\": \"reply\"}}",
            agent = self.agent_name,
            context = state.text,
            text = message.text(),
        );

        json!({
            "prompt": prompt,
            "message": message.text(),
            "context": state.text,
            "values": state.values,
            "actions": actions,
        })
    }
}

#[async_trait]
impl ModelInvoker for ModelHandlerInvoker {
    async fn decide(&self, message: &Message, state: &State) -> Result<Decision, ModelError> {
        let handler = self
            .registry
            .model_handler(&self.model_type)
            .ok_or_else(|| ModelError::NoHandler(self.model_type.clone()))?;

        let output = handler.invoke(self.build_params(message, state)).await?;
        let decision = parse_decision(&output);
        debug!(
            actions = decision.actions.len(),
            has_text = decision.text.is_some(),
            "Parsed model decision"
        );
        Ok(decision)
    }
}

/// Interpret a model's output as a [`Decision`].
///
/// Accepts a JSON object, or a string holding one (optionally inside a
/// fenced code block). Anything else, including an object with neither
/// `actions` nor `text`, becomes a plain text reply.
pub fn parse_decision(output: &Value) -> Decision {
    match output {
        Value::Object(_) => serde_json::from_value::<Decision>(output.clone())
            .ok()
            .filter(|d| !d.actions.is_empty() || d.text.is_some())
            .unwrap_or_else(|| Decision::reply(output.to_string())),
        Value::String(text) => parse_decision_text(text),
        Value::Null => Decision::default(),
        other => Decision::reply(other.to_string()),
    }
}

pub fn parse_decision_text(text: &str) -> Decision {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Decision::default();
    }
    let body = strip_code_fence(trimmed);
    if body.starts_with('{')
        && let Ok(decision) = serde_json::from_str::<Decision>(body)
        && (!decision.actions.is_empty() || decision.text.is_some())
    {
        return decision;
    }
    Decision::reply(trimmed)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the language tag line
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
