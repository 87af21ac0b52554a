//! `mindloop run`: handle one message with a fixed decision.

use std::sync::Arc;

use anyhow::Context;
use mindloop_config::AppConfig;
use mindloop_core::action::StepStatus;
use mindloop_core::message::Message;
use mindloop_core::model::{Decision, RequestedAction};
use mindloop_core::sink::BufferSink;
use mindloop_memory::InMemoryAdapter;
use mindloop_runtime::{AgentRuntime, StaticInvoker};
use serde_json::Value;

pub struct RunArgs {
    pub message: String,
    pub actions: Vec<String>,
    pub reply: Option<String>,
    pub params: Option<String>,
    pub room: String,
    pub json: bool,
}

/// Build the decision the CLI stands in for the model with.
pub fn decision_from(args: &RunArgs) -> anyhow::Result<Decision> {
    let params = match &args.params {
        Some(raw) => serde_json::from_str::<Value>(raw).context("--params must be valid JSON")?,
        None => Value::Null,
    };

    let mut decision = Decision::default();
    for name in args.actions.iter().map(|a| a.trim()).filter(|a| !a.is_empty()) {
        decision = decision.with_action(RequestedAction::new(name).with_params(params.clone()));
    }
    if let Some(reply) = &args.reply {
        decision = decision.with_text(reply.clone());
    }
    Ok(decision)
}

pub async fn run(config: AppConfig, args: RunArgs) -> anyhow::Result<()> {
    let decision = decision_from(&args)?;
    let persistence = Arc::new(InMemoryAdapter::new());
    let runtime = AgentRuntime::builder()
        .with_plugins(super::plugins_for(&config, persistence))
        .with_config(config)
        .with_invoker(Arc::new(StaticInvoker::new(decision)))
        .build()
        .await?;

    let sink = BufferSink::new();
    let message = Message::new(args.message.clone())
        .from_entity("cli-user")
        .in_room(args.room.clone())
        .with_source("cli");
    let mut result = runtime.handle_message(message, &sink).await;

    // A one-shot process would exit before background evaluators finish.
    let outcomes = match result.evaluation.take() {
        Some(handle) => handle.wait().await,
        None => Vec::new(),
    };
    runtime.stop().await;

    if args.json {
        let mut body = serde_json::to_value(&result)?;
        body["evaluations"] = serde_json::to_value(&outcomes)?;
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    for content in &result.responses {
        match &content.action {
            Some(action) => println!("[{action}] {}", content.text),
            None => println!("{}", content.text),
        }
    }

    if !result.steps.is_empty() {
        println!();
        println!("Steps:");
        for (i, step) in result.steps.iter().enumerate() {
            let status = match step.status {
                StepStatus::Completed => "ok",
                StepStatus::Failed => "failed",
                StepStatus::Pending => "pending",
            };
            match &step.error {
                Some(error) => println!("  {}. {} — {status}: {error}", i + 1, step.action),
                None => println!("  {}. {} — {status}", i + 1, step.action),
            }
        }
    }

    if !outcomes.is_empty() {
        println!();
        println!("Evaluators:");
        for outcome in &outcomes {
            match (&outcome.error, &outcome.reason) {
                (Some(error), _) => println!("  {} — error: {error}", outcome.evaluator),
                (None, Some(reason)) => println!("  {} — {reason}", outcome.evaluator),
                (None, None) => println!("  {} — passed: {}", outcome.evaluator, outcome.passed),
            }
        }
    }

    if let Some(error) = &result.error {
        anyhow::bail!("{error}");
    }
    Ok(())
}
