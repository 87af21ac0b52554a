//! Error types for the Mindloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Configuration failures are fatal and live on [`Error`]; everything a plugin
//! component can produce at request time is a [`ComponentError`] and is
//! recovered at the call site that produced it.

use thiserror::Error;

/// The top-level error type for Mindloop startup and runtime operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Plugin configuration errors (fatal) ---
    #[error("Plugin registration failed for '{plugin}': {reason}")]
    PluginRegistration { plugin: String, reason: String },

    #[error("Circular plugin dependency detected at '{plugin}'")]
    PluginLoad { plugin: String },

    #[error("Duplicate plugin name: {0}")]
    DuplicatePlugin(String),

    #[error("Plugin '{plugin}' requires setting '{key}' but it is not configured")]
    MissingSetting { plugin: String, key: String },

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Model errors ---
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// A failure raised by a provider, action, evaluator, or event handler.
#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("{0}")]
    Failed(String),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The request deadline passed while the call was running.
    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    #[error("Panicked: {0}")]
    Panicked(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Output sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

impl ComponentError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("No handler registered for model type '{0}'")]
    NoHandler(String),

    #[error("Model returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Model call failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Output sink is closed")]
    Closed,

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Service '{service}' failed to start: {reason}")]
    StartFailed { service: String, reason: String },

    #[error("Service '{service}' failed to stop: {reason}")]
    StopFailed { service: String, reason: String },
}
