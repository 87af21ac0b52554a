//! Event dispatch: runs registered event handlers and feeds the broadcast bus.

use std::sync::Arc;
use std::time::Duration;

use mindloop_core::event::{EventBus, RuntimeEvent};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::warn;

use crate::isolation::isolate_within;
use crate::registry::Registry;

const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(5);

/// Delivers runtime events to plugin handlers and bus subscribers.
///
/// Handlers run in registration order and are awaited, each under its own
/// time budget; a failing or overrunning handler is logged and does not
/// affect the others or the caller.
#[derive(Clone)]
pub struct EventDispatcher {
    registry: Arc<Registry>,
    bus: Arc<EventBus>,
    handler_timeout: Duration,
}

impl EventDispatcher {
    pub fn new(registry: Arc<Registry>, bus: Arc<EventBus>) -> Self {
        Self {
            registry,
            bus,
            handler_timeout: DEFAULT_HANDLER_TIMEOUT,
        }
    }

    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    pub async fn dispatch(&self, event: RuntimeEvent) {
        self.dispatch_until(event, None).await;
    }

    /// Dispatch with every handler also cut off at the request `deadline`.
    pub async fn dispatch_until(&self, event: RuntimeEvent, deadline: Option<Instant>) {
        let kind = event.kind();
        for handler in self.registry.event_handlers(kind) {
            if let Err(e) = isolate_within(self.handler_timeout, deadline, handler.handle(&event)).await {
                warn!(handler = %handler.name(), event = %kind, error = %e, "Event handler failed");
            }
        }
        self.bus.publish(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<RuntimeEvent>> {
        self.bus.subscribe()
    }
}
