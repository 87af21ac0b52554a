//! Per-request composed state.
//!
//! A [`State`] is the aggregate of every [`ProviderResult`] produced for one
//! message. It is created when context composition starts, passed by
//! reference through action and evaluator execution, and never persisted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Separator placed between text fragments of consecutive providers.
pub const TEXT_SEPARATOR: &str = "\n\n";

/// The output of a single provider invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderResult {
    /// Human-readable context text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Scalar values, addressable by key from templates and actions
    #[serde(default)]
    pub values: Map<String, Value>,

    /// Structured data
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl ProviderResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// A result carrying only text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Diagnostic record of one provider invocation during composition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderReport {
    pub name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// The merged context for one request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct State {
    /// Ordered concatenation of provider text
    pub text: String,

    /// Merged values (last write wins per key)
    pub values: Map<String, Value>,

    /// Merged data (last write wins per key)
    pub data: Map<String, Value>,

    /// Which providers ran, in invocation order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<ProviderReport>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one provider's output into this state.
    ///
    /// Non-empty text is appended after a blank line. Values and data keys
    /// overwrite existing keys wholesale; nested objects are not merged.
    pub fn merge(&mut self, result: ProviderResult) {
        if let Some(text) = result.text.filter(|t| !t.trim().is_empty()) {
            if !self.text.is_empty() {
                self.text.push_str(TEXT_SEPARATOR);
            }
            self.text.push_str(&text);
        }
        self.values.extend(result.values);
        self.data.extend(result.data);
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn data(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_joins_text_with_blank_line() {
        let mut state = State::new();
        state.merge(ProviderResult::text("first"));
        state.merge(ProviderResult::new().with_value("k", 1));
        state.merge(ProviderResult::text("second"));
        assert_eq!(state.text, "first\n\nsecond");
    }

    #[test]
    fn merge_skips_blank_text() {
        let mut state = State::new();
        state.merge(ProviderResult::text("   "));
        state.merge(ProviderResult::text("only"));
        assert_eq!(state.text, "only");
    }

    #[test]
    fn later_keys_overwrite_without_deep_merge() {
        let mut state = State::new();
        state.merge(
            ProviderResult::new()
                .with_value("mood", "calm")
                .with_data("room", json!({"name": "lobby", "size": 3})),
        );
        state.merge(
            ProviderResult::new()
                .with_value("mood", "busy")
                .with_data("room", json!({"name": "hall"})),
        );
        assert_eq!(state.value("mood"), Some(&json!("busy")));
        assert_eq!(state.data("room"), Some(&json!({"name": "hall"})));
    }
}
