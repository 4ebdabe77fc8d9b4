//! Operation poller
//!
//! Fixed-interval repolling of an operation resource until it is terminal or
//! the attempt budget runs out. No backoff, no jitter.

use crate::error::{CloudError, Result};
use crate::normalize::normalize;
use crate::operation::{Operation, OperationState};
use crate::transport::{HttpRequest, Method, Transport};
use std::time::Duration;
use tokio::time::sleep;

/// Attempt/delay budget for [`wait_for`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Maximum number of GETs of the operation resource
    pub max_attempts: u32,

    /// Pause between non-terminal polls
    pub delay: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            delay: Duration::from_secs(5),
        }
    }
}

impl PollConfig {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Budget sized to cover `total` at the given delay
    pub fn for_duration(total: Duration, delay: Duration) -> Self {
        let attempts = if delay.is_zero() {
            1
        } else {
            total.as_millis().div_ceil(delay.as_millis()).max(1)
        };
        Self::new(u32::try_from(attempts).unwrap_or(u32::MAX), delay)
    }

    /// Total wall-clock budget (`max_attempts * delay`)
    pub fn budget(&self) -> Duration {
        self.delay.saturating_mul(self.max_attempts)
    }
}

/// GET the operation once and interpret it
pub async fn check_operation(transport: &dyn Transport, operation_url: &str) -> Result<Operation> {
    let response = transport.send(HttpRequest::get(operation_url)).await;
    let body = normalize(transport.label(), Method::Get, operation_url, &response)?;
    Ok(Operation::from_value(&body))
}

/// Poll `operation_url` until the operation is terminal.
///
/// Returns the finished operation on success. A failed operation raises
/// [`CloudError::OperationFailed`]; running out of attempts raises
/// [`CloudError::Timeout`] after exactly `max_attempts` GETs.
pub async fn wait_for(
    transport: &dyn Transport,
    operation_url: &str,
    config: &PollConfig,
) -> Result<Operation> {
    for attempt in 1..=config.max_attempts {
        let operation = check_operation(transport, operation_url).await?;

        match operation.state() {
            OperationState::Succeeded => {
                tracing::debug!(operation = %operation_url, attempt, "Operation finished");
                return Ok(operation);
            }
            OperationState::Failed { message } => {
                tracing::debug!(operation = %operation_url, attempt, error = %message, "Operation failed");
                return Err(CloudError::OperationFailed {
                    operation: operation.name_or(operation_url).to_string(),
                    message,
                });
            }
            OperationState::Running => {
                tracing::debug!(operation = %operation_url, attempt, max_attempts = config.max_attempts, "Operation still running");
            }
        }

        if attempt < config.max_attempts {
            sleep(config.delay).await;
        }
    }

    Err(CloudError::Timeout {
        operation: operation_url.to_string(),
        attempts: config.max_attempts,
        elapsed: config.budget(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;
    use crate::transport::HttpResponse;
    use serde_json::json;

    const OP_URL: &str = "https://example.test/v1/operations/123";

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_returns_on_first_done() {
        let transport = FakeTransport::new();
        for _ in 0..3 {
            transport.push_json(200, json!({"name": "operations/123", "done": false}));
        }
        transport.push_json(200, json!({"name": "operations/123", "done": true}));

        let start = tokio::time::Instant::now();
        let config = PollConfig::new(10, Duration::from_secs(2));
        let op = wait_for(&transport, OP_URL, &config).await.unwrap();

        assert!(op.is_done());
        assert_eq!(transport.count(Method::Get), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_legacy_status() {
        let transport = FakeTransport::new();
        transport.push_json(200, json!({"name": "abc", "status": "PENDING"}));
        transport.push_json(200, json!({"name": "abc", "status": "RUNNING"}));
        transport.push_json(200, json!({"name": "abc", "status": "DONE"}));

        let op = wait_for(&transport, OP_URL, &PollConfig::default()).await.unwrap();
        assert_eq!(op.status.as_deref(), Some("DONE"));
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_times_out_after_exact_attempts() {
        let transport = FakeTransport::new();
        transport.set_fallback(HttpResponse::json(200, &json!({"done": false})));

        let config = PollConfig::new(5, Duration::from_secs(3));
        let err = wait_for(&transport, OP_URL, &config).await.unwrap_err();

        match err {
            CloudError::Timeout {
                attempts, elapsed, ..
            } => {
                assert_eq!(attempts, 5);
                assert_eq!(elapsed, Duration::from_secs(15));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(transport.count(Method::Get), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_raises_operation_error() {
        let transport = FakeTransport::new();
        transport.push_json(200, json!({"name": "operations/7", "done": false}));
        transport.push_json(
            200,
            json!({"name": "operations/7", "done": true, "error": {"code": 9, "message": "restore failed"}}),
        );

        let err = wait_for(&transport, OP_URL, &PollConfig::default()).await.unwrap_err();
        match err {
            CloudError::OperationFailed { operation, message } => {
                assert_eq!(operation, "operations/7");
                assert_eq!(message, "restore failed");
            }
            other => panic!("expected operation failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_legacy_failure_without_message() {
        let transport = FakeTransport::new();
        transport.push_json(200, json!({"status": "FAILED"}));

        let err = wait_for(&transport, OP_URL, &PollConfig::default()).await.unwrap_err();
        assert!(err.to_string().contains("Unknown error"));
    }

    #[tokio::test]
    async fn test_http_error_while_polling_propagates() {
        let transport = FakeTransport::new();
        transport.push(HttpResponse::new(403, r#"{"error":{"message":"forbidden"}}"#));

        let err = wait_for(&transport, OP_URL, &PollConfig::default()).await.unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn test_for_duration() {
        let config = PollConfig::for_duration(Duration::from_secs(20 * 60), Duration::from_secs(5));
        assert_eq!(config.max_attempts, 240);
        assert_eq!(config.budget(), Duration::from_secs(1200));
    }
}
