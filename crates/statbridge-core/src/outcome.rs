//! Success/error discrimination for values returned by the interpreter.
//!
//! The boundary is untyped, so the decision is made on shape alone: a value
//! is an error payload iff it is an object whose `error` key holds a string.
//! The empty string still counts. A `null` or non-string `error` does not.

use serde::Serialize;
use serde_json::{Map, Value};

/// Non-error value returned by the interpreter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SuccessPayload {
    value: Value,
}

impl SuccessPayload {
    /// The result fields, when the payload is an object.
    pub fn fields(&self) -> Option<&Map<String, Value>> {
        self.value.as_object()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

/// Error reported by the interpreter as `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub error: String,
}

/// Structural error predicate.
///
/// `None` stands for a missing value (`undefined` on the interpreter side).
pub fn is_error_payload(value: Option<&Value>) -> bool {
    error_message(value).is_some()
}

fn error_message(value: Option<&Value>) -> Option<&str> {
    value?.as_object()?.get("error")?.as_str()
}

/// Classify a returned value. Total over every JSON-shaped input.
pub fn discriminate(value: Option<Value>) -> Result<SuccessPayload, ErrorPayload> {
    if let Some(message) = error_message(value.as_ref()) {
        return Err(ErrorPayload {
            error: message.to_string(),
        });
    }
    Ok(SuccessPayload {
        value: value.unwrap_or(Value::Null),
    })
}
