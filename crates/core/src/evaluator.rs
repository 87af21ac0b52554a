//! Evaluator trait: post-response analysis.
//!
//! Evaluators run after the response has been delivered. They may write to
//! external memory but can never change what was already sent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ComponentError;
use crate::message::{Content, Message};
use crate::state::State;

/// What an evaluator concluded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Evaluation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl Evaluation {
    pub fn passed(reason: impl Into<String>) -> Self {
        Self {
            score: Some(1.0),
            passed: true,
            reason: Some(reason.into()),
            detail: None,
        }
    }
}

/// The recorded outcome of running one evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorOutcome {
    pub evaluator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvaluatorOutcome {
    pub fn from_evaluation(evaluator: &str, evaluation: Evaluation) -> Self {
        Self {
            evaluator: evaluator.to_string(),
            score: evaluation.score,
            passed: evaluation.passed,
            reason: evaluation.reason,
            detail: evaluation.detail,
            error: None,
        }
    }

    pub fn failed(evaluator: &str, error: impl Into<String>) -> Self {
        Self {
            evaluator: evaluator.to_string(),
            score: None,
            passed: false,
            reason: None,
            detail: None,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Inputs handed to an evaluator.
pub struct EvaluationInput<'a> {
    pub message: &'a Message,
    pub state: &'a State,
    /// Content emitted while handling the message
    pub responses: &'a [Content],
}

/// The core Evaluator trait.
#[async_trait]
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Run even when `validate` would say no.
    fn always_run(&self) -> bool {
        false
    }

    async fn validate(&self, _message: &Message, _state: &State) -> Result<bool, ComponentError> {
        Ok(true)
    }

    async fn evaluate(&self, input: EvaluationInput<'_>) -> Result<Evaluation, ComponentError>;
}
