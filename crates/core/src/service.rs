//! Long-lived plugin services (pollers, connections, caches).

use async_trait::async_trait;

use crate::error::ServiceError;

/// A service contributed by a plugin.
///
/// Services are keyed by [`Service::service_type`]; registering a second
/// service of the same type replaces the first.
#[async_trait]
pub trait Service: Send + Sync {
    fn service_type(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Called once after all plugins are registered.
    async fn start(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    /// Called when the runtime shuts down.
    async fn stop(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}
