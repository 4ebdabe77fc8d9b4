//! Provider-side asynchronous operations
//!
//! Providers report long-running work in one of two shapes:
//!
//! - the `done`/`error` pattern (`{"name": "operations/1", "done": true}`)
//! - a legacy string `status` (`{"name": "...", "status": "DONE"}`)
//!
//! [`Operation::shape`] tells the two apart, preferring `done` when both are
//! present, and [`Operation::state`] folds either into one [`OperationState`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Legacy `status` values meaning the operation finished
pub const DONE_STATUSES: &[&str] = &["DONE", "finished", "completed"];

/// Legacy `status` values meaning the operation failed
pub const FAILED_STATUSES: &[&str] = &["FAILED", "failed", "error"];

/// An operation resource as returned by the provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,

    /// Everything else (`response`, `metadata`, `targetLink`, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Which reporting convention an operation uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationShape<'a> {
    /// `done`/`error` pattern
    LongRunning { done: bool },
    /// String `status` pattern
    Legacy { status: &'a str },
    /// Neither field present yet
    Unknown,
}

/// Normalized progress of an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationState {
    Running,
    Succeeded,
    Failed { message: String },
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationState::Running)
    }
}

impl Operation {
    /// Interpret a JSON body as an operation. Bodies that are not objects
    /// become an empty (running) operation.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    pub fn shape(&self) -> OperationShape<'_> {
        if let Some(done) = self.done {
            return OperationShape::LongRunning { done };
        }
        match self.status.as_deref() {
            Some(status) => OperationShape::Legacy { status },
            None => OperationShape::Unknown,
        }
    }

    pub fn has_error(&self) -> bool {
        match &self.error {
            None | Some(Value::Null) => false,
            Some(Value::Object(map)) => !map.is_empty(),
            Some(_) => true,
        }
    }

    pub fn is_done(&self) -> bool {
        match self.shape() {
            OperationShape::LongRunning { done } => done,
            OperationShape::Legacy { status } => DONE_STATUSES.contains(&status),
            OperationShape::Unknown => false,
        }
    }

    /// Terminal with an error. A legacy `DONE` carrying `error.errors[]`
    /// counts as failed too.
    pub fn is_failed(&self) -> bool {
        match self.shape() {
            OperationShape::LongRunning { done } => done && self.has_error(),
            OperationShape::Legacy { status } => {
                FAILED_STATUSES.contains(&status)
                    || (DONE_STATUSES.contains(&status) && self.has_error())
            }
            OperationShape::Unknown => false,
        }
    }

    pub fn state(&self) -> OperationState {
        if self.is_failed() {
            OperationState::Failed {
                message: self.error_message(),
            }
        } else if self.is_done() {
            OperationState::Succeeded
        } else {
            OperationState::Running
        }
    }

    /// Human-readable error text, `"Unknown error"` when nothing usable is present
    pub fn error_message(&self) -> String {
        let Some(error) = &self.error else {
            return "Unknown error".to_string();
        };

        if let Some(message) = error.get("message").and_then(Value::as_str) {
            return message.to_string();
        }

        // Cloud SQL style: {"errors": [{"code": "...", "message": "..."}]}
        if let Some(errors) = error.get("errors").and_then(Value::as_array) {
            let messages: Vec<String> = errors
                .iter()
                .filter_map(|e| {
                    e.get("message")
                        .or_else(|| e.get("code"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .collect();
            if !messages.is_empty() {
                return messages.join("; ");
            }
        }

        match error.as_str() {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => "Unknown error".to_string(),
        }
    }

    pub fn name_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(fallback)
    }
}

/// `done == true` or a legacy finished status
pub fn is_operation_done(value: &Value) -> bool {
    Operation::from_value(value).is_done()
}

/// `done == true` with an error, or a legacy failed status
pub fn is_operation_failed(value: &Value) -> bool {
    Operation::from_value(value).is_failed()
}
