//! Action orchestration: runs a decided plan step by step.
//!
//! Steps run strictly in the requested order. Each completed step's result is
//! visible to later steps through the [`ActionContext`]. A failing step is
//! recorded and the plan moves on, unless the step was requested as
//! non-recoverable (or the runtime is configured to fail fast), in which case
//! every remaining step is marked aborted.

use std::sync::Arc;

use chrono::Utc;
use mindloop_core::action::{ACTION_NAME_KEY, Action, ActionContext, HandlerContext, PlanStep};
use mindloop_core::error::ComponentError;
use mindloop_core::event::RuntimeEvent;
use mindloop_core::message::{Content, Message};
use mindloop_core::model::RequestedAction;
use mindloop_core::sink::{OutputSink, RecordingSink};
use mindloop_core::state::State;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::events::EventDispatcher;
use crate::isolation::{isolate, isolate_until};
use crate::registry::Registry;

const DEADLINE_BEFORE_START: &str = "timed out: deadline passed before the step started";
const DEADLINE_IN_FLIGHT: &str = "timed out: deadline passed while the step was running";
const ABORTED: &str = "aborted: an earlier step failed";

/// Everything one plan execution needs.
pub struct ExecutionRequest<'a> {
    pub message: &'a Message,
    pub state: &'a State,
    pub plan: &'a [RequestedAction],
    /// Reply text chosen alongside the plan, offered to handlers
    pub reply: Option<&'a str>,
    pub sink: &'a dyn OutputSink,
    pub deadline: Option<Instant>,
}

/// The outcome of a plan: every step's status plus all recorded emissions.
#[derive(Debug, Default)]
pub struct PlanOutcome {
    pub context: ActionContext,
    pub responses: Vec<Content>,
}

pub struct ActionOrchestrator {
    registry: Arc<Registry>,
    events: EventDispatcher,
    fail_fast: bool,
}

impl ActionOrchestrator {
    pub fn new(registry: Arc<Registry>, events: EventDispatcher) -> Self {
        Self {
            registry,
            events,
            fail_fast: false,
        }
    }

    /// Abort the rest of the plan after any failed step.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Every registered action whose validator accepts this context.
    ///
    /// A validator that errors or panics makes its action ineligible.
    pub async fn eligible_actions(&self, message: &Message, state: &State) -> Vec<Arc<dyn Action>> {
        let mut eligible = Vec::new();
        for action in self.registry.all_actions() {
            match isolate(action.validate(message, state)).await {
                Ok(true) => eligible.push(action.clone()),
                Ok(false) => debug!(action = %action.name(), "Action declined this message"),
                Err(e) => warn!(action = %action.name(), error = %e, "Action validator failed"),
            }
        }
        eligible
    }

    pub async fn execute(&self, request: ExecutionRequest<'_>) -> PlanOutcome {
        let steps = request
            .plan
            .iter()
            .map(|r| PlanStep::pending(r.name.clone(), r.params.clone()))
            .collect();
        let mut context = ActionContext::new(steps);
        if request.plan.is_empty() {
            return PlanOutcome {
                context,
                responses: Vec::new(),
            };
        }

        let eligible = self.eligible_actions(request.message, request.state).await;
        let recorder = RecordingSink::new(request.sink);

        for (index, requested) in request.plan.iter().enumerate() {
            if request.deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(step = index, "Deadline exceeded; failing remaining steps");
                context.fail_pending_from(index, DEADLINE_BEFORE_START);
                break;
            }

            let succeeded = match self.resolve(&requested.name, &eligible) {
                Ok(action) => {
                    self.run_step(index, action, requested, &request, &recorder, &mut context)
                        .await
                }
                Err(reason) => {
                    warn!(step = index, action = %requested.name, "{reason}");
                    context.fail_step(index, reason, None);
                    false
                }
            };

            if !succeeded && (!requested.recoverable || self.fail_fast) {
                warn!(step = index, action = %requested.name, "Aborting remaining steps");
                context.fail_pending_from(index + 1, ABORTED);
                break;
            }
        }

        info!(
            message_id = %request.message.id,
            completed = context.completed_count(),
            failed = context.failed_count(),
            "Plan finished"
        );
        PlanOutcome {
            context,
            responses: recorder.into_recorded(),
        }
    }

    fn resolve<'e>(
        &self,
        requested: &str,
        eligible: &'e [Arc<dyn Action>],
    ) -> Result<&'e Arc<dyn Action>, String> {
        let Some(action) = self.registry.action(requested) else {
            return Err(format!("unknown action '{requested}'"));
        };
        eligible
            .iter()
            .find(|a| a.name() == action.name())
            .ok_or_else(|| format!("action '{requested}' is not eligible for this context"))
    }

    async fn run_step(
        &self,
        index: usize,
        action: &Arc<dyn Action>,
        requested: &RequestedAction,
        request: &ExecutionRequest<'_>,
        sink: &dyn OutputSink,
        context: &mut ActionContext,
    ) -> bool {
        let message_id = request.message.id.clone();
        self.events
            .dispatch_until(
                RuntimeEvent::ActionStarted {
                    message_id: message_id.clone(),
                    action: action.name().to_string(),
                    step: index,
                    timestamp: Utc::now(),
                },
                request.deadline,
            )
            .await;

        let started = Instant::now();
        let handler_ctx = HandlerContext {
            message: request.message,
            state: request.state,
            options: &requested.params,
            plan: &*context,
            reply: request.reply,
            sink,
        };
        let outcome = isolate_until(request.deadline, action.handle(handler_ctx)).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let success = match outcome {
            Ok(mut result) => {
                if result.action_name().is_none() {
                    result
                        .data
                        .insert(ACTION_NAME_KEY.to_string(), action.name().into());
                }
                if result.success {
                    debug!(action = %action.name(), duration_ms, "Action completed");
                    context.complete_step(index, result);
                    true
                } else {
                    let error = result
                        .error
                        .clone()
                        .unwrap_or_else(|| "action reported failure".to_string());
                    warn!(action = %action.name(), error = %error, "Action reported failure");
                    context.fail_step(index, error, Some(result));
                    false
                }
            }
            Err(ComponentError::DeadlineExceeded) => {
                warn!(action = %action.name(), "Action cancelled at deadline");
                context.fail_step(index, DEADLINE_IN_FLIGHT, None);
                false
            }
            Err(e) => {
                warn!(action = %action.name(), error = %e, "Action failed");
                context.fail_step(index, e.to_string(), None);
                false
            }
        };

        self.events
            .dispatch_until(
                RuntimeEvent::ActionCompleted {
                    message_id,
                    action: action.name().to_string(),
                    step: index,
                    success,
                    duration_ms,
                    timestamp: Utc::now(),
                },
                request.deadline,
            )
            .await;
        success
    }
}
