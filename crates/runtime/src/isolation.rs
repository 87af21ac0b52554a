//! Failure isolation for plugin calls.
//!
//! Every provider, validator, handler, evaluator, and event handler call goes
//! through [`isolate`] so that an `Err` or a panic becomes a value the caller
//! can record instead of unwinding through the pipeline.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use mindloop_core::error::ComponentError;
use tokio::time::Instant;

/// Run a component future, converting a panic into `ComponentError::Panicked`.
pub async fn isolate<T, F>(fut: F) -> Result<T, ComponentError>
where
    F: Future<Output = Result<T, ComponentError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(ComponentError::Panicked(panic_message(payload.as_ref()))),
    }
}

/// [`isolate`] with a time budget.
pub async fn isolate_with_timeout<T, F>(budget: Duration, fut: F) -> Result<T, ComponentError>
where
    F: Future<Output = Result<T, ComponentError>>,
{
    match tokio::time::timeout(budget, isolate(fut)).await {
        Ok(result) => result,
        Err(_) => Err(ComponentError::Timeout {
            timeout_ms: budget.as_millis() as u64,
        }),
    }
}

/// [`isolate`] bounded by an absolute deadline, if any.
///
/// Expiry is reported as `ComponentError::DeadlineExceeded`, never as a
/// `Timeout`, so callers can tell it apart from a component's own timeout.
pub async fn isolate_until<T, F>(deadline: Option<Instant>, fut: F) -> Result<T, ComponentError>
where
    F: Future<Output = Result<T, ComponentError>>,
{
    let Some(deadline) = deadline else {
        return isolate(fut).await;
    };
    match tokio::time::timeout_at(deadline, isolate(fut)).await {
        Ok(result) => result,
        Err(_) => Err(ComponentError::DeadlineExceeded),
    }
}

/// [`isolate_with_timeout`], with the budget cut short by `deadline` if it
/// comes first.
pub async fn isolate_within<T, F>(
    budget: Duration,
    deadline: Option<Instant>,
    fut: F,
) -> Result<T, ComponentError>
where
    F: Future<Output = Result<T, ComponentError>>,
{
    match deadline {
        Some(deadline) if deadline <= Instant::now() + budget => isolate_until(Some(deadline), fut).await,
        _ => isolate_with_timeout(budget, fut).await,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
