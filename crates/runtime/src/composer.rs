//! Context composition: turns provider outputs into one decision [`State`].
//!
//! Providers run one at a time in ascending position order (absent position
//! counts as 0, ties keep registration order). Each provider sees the state
//! accumulated so far. A provider that errors, panics, or exceeds its time
//! budget is logged and contributes nothing; composition always completes.

use std::sync::Arc;
use std::time::Duration;

use mindloop_core::message::Message;
use mindloop_core::provider::{Provider, effective_position};
use mindloop_core::state::{ProviderReport, State};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::isolation::isolate_with_timeout;
use crate::registry::Registry;

/// Per-call composition options.
#[derive(Debug, Clone, Default)]
pub struct ComposeOptions {
    /// State to start from instead of an empty one
    pub seed: Option<State>,

    /// Private providers to opt into by name
    pub include_private: Vec<String>,

    /// Restrict composition to exactly these providers (private ones allowed)
    pub only: Option<Vec<String>>,
}

impl ComposeOptions {
    pub fn seeded(seed: State) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    pub fn include_private(mut self, name: impl Into<String>) -> Self {
        self.include_private.push(name.into());
        self
    }

    pub fn only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = Some(names.into_iter().map(Into::into).collect());
        self
    }
}

pub struct ContextComposer {
    registry: Arc<Registry>,
    provider_timeout: Duration,
}

impl ContextComposer {
    pub fn new(registry: Arc<Registry>, provider_timeout: Duration) -> Self {
        Self {
            registry,
            provider_timeout,
        }
    }

    /// Providers that would run for `options`, in invocation order.
    pub fn eligible_providers(&self, options: &ComposeOptions) -> Vec<Arc<dyn Provider>> {
        let mut providers: Vec<Arc<dyn Provider>> = self
            .registry
            .all_providers()
            .iter()
            .filter(|p| match &options.only {
                Some(names) => names.iter().any(|n| n == p.name()),
                None => !p.private() || options.include_private.iter().any(|n| n == p.name()),
            })
            .cloned()
            .collect();
        providers.sort_by_key(|p| effective_position(p.as_ref()));
        providers
    }

    pub async fn compose(&self, message: &Message, options: ComposeOptions) -> State {
        let providers = self.eligible_providers(&options);
        let mut state = options.seed.unwrap_or_default();

        for provider in providers {
            let name = provider.name().to_string();
            let started = Instant::now();
            let result = isolate_with_timeout(self.provider_timeout, provider.get(message, &state)).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(output) => {
                    debug!(provider = %name, duration_ms, "Provider contributed");
                    state.merge(output);
                    state.providers.push(ProviderReport {
                        name,
                        success: true,
                        error: None,
                        duration_ms,
                    });
                }
                Err(e) => {
                    warn!(provider = %name, error = %e, "Provider failed; skipping its output");
                    state.providers.push(ProviderReport {
                        name,
                        success: false,
                        error: Some(e.to_string()),
                        duration_ms,
                    });
                }
            }
        }

        state
    }
}
