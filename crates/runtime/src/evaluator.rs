//! Post-response evaluation.
//!
//! Evaluators run after the response has been delivered, concurrently with
//! each other, and never change what was already returned. Each evaluator's
//! failure is recorded on its own outcome.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use mindloop_core::evaluator::{EvaluationInput, Evaluator, EvaluatorOutcome};
use mindloop_core::event::RuntimeEvent;
use mindloop_core::message::{Content, Message};
use mindloop_core::state::State;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::EventDispatcher;
use crate::isolation::{isolate, isolate_with_timeout};
use crate::registry::Registry;

#[derive(Clone)]
pub struct EvaluatorRunner {
    registry: Arc<Registry>,
    events: EventDispatcher,
    timeout: Duration,
}

impl EvaluatorRunner {
    pub fn new(registry: Arc<Registry>, events: EventDispatcher, timeout: Duration) -> Self {
        Self {
            registry,
            events,
            timeout,
        }
    }

    /// Run every selected evaluator and wait for all of them.
    ///
    /// Outcomes follow registration order; evaluators whose validator
    /// declines (or fails) produce no outcome.
    pub async fn run(&self, message: &Message, state: &State, responses: &[Content]) -> Vec<EvaluatorOutcome> {
        let outcomes: Vec<EvaluatorOutcome> = join_all(
            self.registry
                .all_evaluators()
                .iter()
                .map(|evaluator| self.run_one(evaluator, message, state, responses)),
        )
        .await
        .into_iter()
        .flatten()
        .collect();

        let errors = outcomes.iter().filter(|o| o.is_error()).count();
        info!(
            message_id = %message.id,
            outcomes = outcomes.len(),
            errors,
            "Evaluators finished"
        );
        self.events
            .dispatch(RuntimeEvent::EvaluatorsCompleted {
                message_id: message.id.clone(),
                outcomes: outcomes.len(),
                errors,
                timestamp: Utc::now(),
            })
            .await;
        outcomes
    }

    /// Run evaluators on a background task; the caller does not wait.
    pub fn spawn(&self, message: Message, state: State, responses: Vec<Content>) -> EvaluationHandle {
        let runner = self.clone();
        let handle = tokio::spawn(async move { runner.run(&message, &state, &responses).await });
        EvaluationHandle { handle }
    }

    async fn run_one(
        &self,
        evaluator: &Arc<dyn Evaluator>,
        message: &Message,
        state: &State,
        responses: &[Content],
    ) -> Option<EvaluatorOutcome> {
        let name = evaluator.name();
        if !evaluator.always_run() {
            match isolate(evaluator.validate(message, state)).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(evaluator = %name, "Evaluator skipped");
                    return None;
                }
                Err(e) => {
                    warn!(evaluator = %name, error = %e, "Evaluator validator failed; skipping");
                    return None;
                }
            }
        }

        let input = EvaluationInput {
            message,
            state,
            responses,
        };
        Some(match isolate_with_timeout(self.timeout, evaluator.evaluate(input)).await {
            Ok(evaluation) => EvaluatorOutcome::from_evaluation(name, evaluation),
            Err(e) => {
                warn!(evaluator = %name, error = %e, "Evaluator failed");
                EvaluatorOutcome::failed(name, e.to_string())
            }
        })
    }
}

/// A handle to evaluators running in the background.
///
/// Dropping the handle leaves the evaluators running.
#[derive(Debug)]
pub struct EvaluationHandle {
    handle: JoinHandle<Vec<EvaluatorOutcome>>,
}

impl EvaluationHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for every evaluator to finish.
    pub async fn wait(self) -> Vec<EvaluatorOutcome> {
        match self.handle.await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                warn!(error = %e, "Evaluation task did not complete");
                Vec::new()
            }
        }
    }
}
