use std::sync::Arc;

use serde_json::{Map, Value};

/// Longest backoff [`FailureBackoff`] will add, in seconds.
pub const MAX_BACKOFF_SECS: u64 = 3600;

#[derive(Debug)]
pub struct ExtensionError {
    pub message: String,
}

impl std::fmt::Display for ExtensionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<String> for ExtensionError {
    fn from(s: String) -> Self {
        ExtensionError { message: s }
    }
}

impl From<&str> for ExtensionError {
    fn from(s: &str) -> Self {
        ExtensionError {
            message: s.to_string(),
        }
    }
}

/// Adds seconds to the time limit of a submission. Implementations must not
/// depend on evaluation order or on each other.
pub trait TimeLimitExtension: Send + Sync {
    fn id(&self) -> &str;
    fn additional_seconds(
        &self,
        form_id: &str,
        values: &Map<String, Value>,
        prior_failures: u32,
    ) -> Result<u64, ExtensionError>;
}

/// Registered extensions, evaluated left to right in registration order.
#[derive(Default)]
pub struct ExtensionRegistry {
    extensions: Vec<Arc<dyn TimeLimitExtension>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, extension: Arc<dyn TimeLimitExtension>) {
        self.extensions.push(extension);
    }

    pub fn ids(&self) -> Vec<&str> {
        self.extensions.iter().map(|e| e.id()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Sum of every extension's addition. A failing extension adds nothing.
    pub fn total(&self, form_id: &str, values: &Map<String, Value>, prior_failures: u32) -> u64 {
        self.extensions.iter().fold(0u64, |sum, ext| {
            match ext.additional_seconds(form_id, values, prior_failures) {
                Ok(secs) => sum.saturating_add(secs),
                Err(e) => {
                    tracing::warn!("Time limit extension {} failed: {e}", ext.id());
                    sum
                }
            }
        })
    }
}

/// Grows the limit for actors that already fell into the trap:
/// `min(base + e^n - 1, 3600)` extra seconds after `n` prior failures.
pub struct FailureBackoff {
    base: u64,
}

impl FailureBackoff {
    pub fn new(base: u64) -> Self {
        Self { base }
    }
}

impl TimeLimitExtension for FailureBackoff {
    fn id(&self) -> &str {
        "failure_backoff"
    }

    fn additional_seconds(
        &self,
        _form_id: &str,
        _values: &Map<String, Value>,
        prior_failures: u32,
    ) -> Result<u64, ExtensionError> {
        if prior_failures == 0 {
            return Ok(0);
        }
        let extra = self.base as f64 + (prior_failures as f64).exp() - 1.0;
        Ok(extra.min(MAX_BACKOFF_SECS as f64) as u64)
    }
}

/// Adds a fixed delay whenever a given field was submitted with a truthy value.
pub struct FlaggedFieldDelay {
    field: String,
    seconds: u64,
}

impl FlaggedFieldDelay {
    pub fn new(field: impl Into<String>, seconds: u64) -> Self {
        Self {
            field: field.into(),
            seconds,
        }
    }
}

impl TimeLimitExtension for FlaggedFieldDelay {
    fn id(&self) -> &str {
        "flagged_field_delay"
    }

    fn additional_seconds(
        &self,
        _form_id: &str,
        values: &Map<String, Value>,
        _prior_failures: u32,
    ) -> Result<u64, ExtensionError> {
        let flagged = values.get(&self.field).is_some_and(is_truthy);
        Ok(if flagged { self.seconds } else { 0 })
    }
}

/// Truthiness of a submitted value: empty strings, "0", false, zero and empty
/// collections are all falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
