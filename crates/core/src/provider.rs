//! Provider trait: read-only context sources.
//!
//! Providers are invoked for every message to contribute text, values, and
//! data to the composed [`State`]. They own no per-request state of their own.

use async_trait::async_trait;

use crate::error::ComponentError;
use crate::message::Message;
use crate::state::{ProviderResult, State};

/// The core Provider trait.
#[async_trait]
pub trait Provider: Send + Sync {
    /// The unique name of this provider (e.g., "TIME").
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Ordering key; lower runs earlier. `None` sorts as 0.
    fn position(&self) -> Option<i32> {
        None
    }

    /// Recomputed on every call rather than cacheable between requests.
    fn dynamic(&self) -> bool {
        false
    }

    /// Excluded from the default composed set; must be requested by name.
    fn private(&self) -> bool {
        false
    }

    /// Produce this provider's contribution for the message.
    ///
    /// `state` holds everything composed by earlier providers.
    async fn get(&self, message: &Message, state: &State) -> Result<ProviderResult, ComponentError>;
}

/// The effective ordering key of a provider.
pub fn effective_position(provider: &dyn Provider) -> i32 {
    provider.position().unwrap_or(0)
}
