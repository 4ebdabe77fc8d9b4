//! Reconciliation error types

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the reconciliation core
#[derive(Error, Debug)]
pub enum CloudError {
    /// Desired configuration is malformed. Raised before any network call.
    #[error("Invalid configuration: {0}")]
    Validation(String),

    /// Probe miss. Used as a signal inside the core, never returned from create/delete.
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("{provider} {method} request to {url} failed: {message}")]
    Transport {
        provider: String,
        method: String,
        url: String,
        message: String,
    },

    #[error("{provider} {method} request to {url} failed with status {status}: {detail}")]
    Provider {
        provider: String,
        method: String,
        url: String,
        status: u16,
        detail: String,
    },

    #[error("Operation {operation} failed: {message}")]
    OperationFailed { operation: String, message: String },

    #[error(
        "Timed out waiting for operation {operation} after {attempts} attempts ({}s)",
        .elapsed.as_secs()
    )]
    Timeout {
        operation: String,
        attempts: u32,
        elapsed: Duration,
    },

    #[error("Secret store error: {0}")]
    Secret(String),

    #[error("State file error: {0}")]
    State(String),

    #[error("Lock acquisition failed: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// HTTP status carried by a provider error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            CloudError::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the provider reported the resource as absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound(_)) || self.status() == Some(404)
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_message() {
        let err = CloudError::Provider {
            provider: "GCP".to_string(),
            method: "POST".to_string(),
            url: "https://example.test/instances".to_string(),
            status: 403,
            detail: "permission denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "GCP POST request to https://example.test/instances failed with status 403: permission denied"
        );
        assert_eq!(err.status(), Some(403));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_timeout_reports_budget() {
        let err = CloudError::Timeout {
            operation: "operations/123".to_string(),
            attempts: 10,
            elapsed: Duration::from_secs(50),
        };
        assert!(err.to_string().contains("10 attempts"));
        assert!(err.to_string().contains("50s"));
    }
}
