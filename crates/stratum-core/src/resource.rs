//! Resource kind hooks
//!
//! A [`ResourceKind`] describes one remote resource: where to probe it, how
//! to create it and how to read its response. The reconciler drives the
//! same state machine for every kind through these hooks.

use crate::action::{ActionArgs, ActionContext, get_info};
use crate::error::{CloudError, Result};
use crate::state::ObservedState;
use crate::transport::HttpRequest;
use async_trait::async_trait;
use serde_json::Value;

/// Substring identifying an operation resource name
pub const OPERATION_MARKER: &str = "operations/";

/// Result of a kind-specific readiness check on a resource body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    NotReady(String),
}

/// Provider-specific hooks for one managed resource
#[async_trait]
pub trait ResourceKind: Send + Sync {
    /// Resource kind as written in manifests (e.g. "redis-instance")
    fn kind(&self) -> &str;

    fn name(&self) -> &str;

    /// Check the desired configuration. Runs before any network call.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// URL answering GET with the resource body
    fn probe_url(&self) -> String;

    fn create_request(&self) -> Result<HttpRequest>;

    /// Request bringing an existing resource in line with the desired
    /// configuration. `None` when nothing is updatable.
    fn update_request(&self, _state: &ObservedState) -> Result<Option<HttpRequest>> {
        Ok(None)
    }

    fn delete_request(&self, _state: &ObservedState) -> HttpRequest {
        HttpRequest::delete(self.probe_url())
    }

    /// Operation reference carried by a mutating response, if the call is async
    fn operation_ref(&self, response: &Value) -> Option<String> {
        marked_operation_name(response)
    }

    fn operation_url(&self, operation_ref: &str) -> String;

    /// Copy identifying fields from a resource body into the observed state
    fn populate_state(&self, body: &Value, state: &mut ObservedState);

    fn readiness(&self, _body: &Value) -> Readiness {
        Readiness::Ready
    }

    /// Named actions this kind supports
    fn actions(&self) -> Vec<&'static str> {
        vec!["get-info"]
    }

    /// Run a named action, returning human-readable output
    async fn run_action(
        &self,
        ctx: &mut ActionContext<'_>,
        action: &str,
        _args: &ActionArgs,
    ) -> Result<String> {
        match action {
            "get-info" => get_info(ctx, self.probe_url()).await,
            other => Err(unknown_action(self.kind(), other)),
        }
    }
}

/// `name` of a response when it contains [`OPERATION_MARKER`]
pub fn marked_operation_name(response: &Value) -> Option<String> {
    response
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| name.contains(OPERATION_MARKER))
        .map(str::to_string)
}

pub fn unknown_action(kind: &str, action: &str) -> CloudError {
    CloudError::Validation(format!("unknown action '{}' for {}", action, kind))
}

/// Reject empty required fields
pub fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CloudError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_marked_operation_name() {
        assert_eq!(
            marked_operation_name(&json!({"name": "projects/p/locations/l/operations/op-1"})),
            Some("projects/p/locations/l/operations/op-1".to_string())
        );
        assert_eq!(marked_operation_name(&json!({"name": "projects/p/instances/foo"})), None);
        assert_eq!(marked_operation_name(&json!({})), None);
    }

    #[test]
    fn test_require() {
        assert!(require("tier", "db-f1-micro").is_ok());
        let err = require("tier", " ").unwrap_err();
        assert_eq!(err.to_string(), "Invalid configuration: tier is required");
    }
}
