//! TIME: the current date and time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mindloop_core::error::ComponentError;
use mindloop_core::message::Message;
use mindloop_core::provider::Provider;
use mindloop_core::state::{ProviderResult, State};

/// Reports the wall clock. Always re-evaluated.
pub struct TimeProvider {
    clock: fn() -> DateTime<Utc>,
}

impl TimeProvider {
    pub fn new() -> Self {
        Self { clock: Utc::now }
    }

    #[cfg(test)]
    fn with_clock(clock: fn() -> DateTime<Utc>) -> Self {
        Self { clock }
    }
}

impl Default for TimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for TimeProvider {
    fn name(&self) -> &str {
        "TIME"
    }

    fn description(&self) -> &str {
        "The current date and time in UTC"
    }

    fn dynamic(&self) -> bool {
        true
    }

    async fn get(&self, _message: &Message, _state: &State) -> Result<ProviderResult, ComponentError> {
        let now = (self.clock)();
        Ok(ProviderResult::text(format!(
            "The current date and time is {} (UTC).",
            now.format("%A, %B %-d, %Y %H:%M")
        ))
        .with_value("currentTime", now.to_rfc3339())
        .with_value("currentDate", now.format("%Y-%m-%d").to_string()))
    }
}
