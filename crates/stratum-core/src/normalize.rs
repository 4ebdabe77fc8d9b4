//! Response normalization
//!
//! Folds transport failures and HTTP 4xx/5xx bodies into a single
//! [`CloudError`] channel and parses success bodies leniently.

use crate::error::{CloudError, Result};
use crate::transport::{HttpResponse, Method};
use serde_json::{Value, json};

/// Turn a raw response into a parsed JSON body or a uniform error.
///
/// - transport error: [`CloudError::Transport`] with the transport's message
/// - status >= 400: [`CloudError::Provider`] with [`error_detail`] of the body
/// - empty body: `{}`
/// - non-JSON body: `{"raw": <body>}`
pub fn normalize(provider: &str, method: Method, url: &str, response: &HttpResponse) -> Result<Value> {
    if let Some(message) = &response.error {
        return Err(CloudError::Transport {
            provider: provider.to_string(),
            method: method.to_string(),
            url: url.to_string(),
            message: message.clone(),
        });
    }

    if response.status_code >= 400 {
        return Err(CloudError::Provider {
            provider: provider.to_string(),
            method: method.to_string(),
            url: url.to_string(),
            status: response.status_code,
            detail: error_detail(&response.body),
        });
    }

    parse_body(&response.body)
}

/// Parse a success body. Empty bodies become `{}`, unparseable ones `{"raw": ...}`.
pub fn parse_body(body: &str) -> Result<Value> {
    if body.trim().is_empty() {
        return Ok(json!({}));
    }
    Ok(serde_json::from_str(body).unwrap_or_else(|_| json!({ "raw": body })))
}

/// Extract the provider's error text from an error body.
///
/// Uses `error.message` when present, suffixed with the bracketed list of
/// `error.details[].reason` and `error.errors[].reason` codes; otherwise
/// the raw body.
pub fn error_detail(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|v| v.pointer("/error/message"))
        .and_then(Value::as_str);

    let Some(message) = message else {
        return body.to_string();
    };

    // `details` on current APIs, `errors` on older ones
    let reasons: Vec<&str> = ["/error/details", "/error/errors"]
        .iter()
        .filter_map(|pointer| parsed.as_ref().and_then(|v| v.pointer(pointer)))
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(|d| d.get("reason").and_then(Value::as_str))
        .collect();

    if reasons.is_empty() {
        message.to_string()
    } else {
        format!("{} [{}]", message, reasons.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://example.test/v1/instances";

    #[test]
    fn test_error_with_reasons() {
        let response = HttpResponse::new(
            400,
            r#"{"error":{"message":"bad request","details":[{"reason":"INVALID_ARGUMENT"}]}}"#,
        );
        let err = normalize("GCP", Method::Post, URL, &response).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("bad request"));
        assert!(message.contains("INVALID_ARGUMENT"));
        assert!(message.starts_with("GCP POST request to https://example.test/v1/instances failed with status 400"));
    }

    #[test]
    fn test_error_without_json_uses_raw_body() {
        let response = HttpResponse::new(502, "upstream unavailable");
        let err = normalize("GCP", Method::Get, URL, &response).unwrap_err();
        assert!(err.to_string().ends_with(": upstream unavailable"));
        assert_eq!(err.status(), Some(502));
    }

    #[test]
    fn test_error_message_without_details() {
        assert_eq!(error_detail(r#"{"error":{"message":"quota exceeded"}}"#), "quota exceeded");
    }

    #[test]
    fn test_legacy_errors_reasons() {
        assert_eq!(
            error_detail(r#"{"error":{"message":"denied","errors":[{"reason":"forbidden"}]}}"#),
            "denied [forbidden]"
        );
    }

    #[test]
    fn test_transport_error_raised_first() {
        let response = HttpResponse::transport_error("connection refused");
        let err = normalize("GCP", Method::Get, URL, &response).unwrap_err();
        assert!(matches!(err, CloudError::Transport { .. }));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_empty_body_is_empty_object() {
        let no_content = HttpResponse::new(204, "");
        assert_eq!(normalize("GCP", Method::Delete, URL, &no_content).unwrap(), json!({}));

        let empty_ok = HttpResponse::new(200, "  ");
        assert_eq!(normalize("GCP", Method::Post, URL, &empty_ok).unwrap(), json!({}));
    }

    #[test]
    fn test_non_json_success_is_wrapped() {
        let response = HttpResponse::new(200, "OK");
        assert_eq!(
            normalize("GCP", Method::Post, URL, &response).unwrap(),
            json!({ "raw": "OK" })
        );
    }

    #[test]
    fn test_json_success() {
        let response = HttpResponse::new(200, r#"{"name":"foo","state":"RUNNABLE"}"#);
        let value = normalize("GCP", Method::Get, URL, &response).unwrap();
        assert_eq!(value["state"], "RUNNABLE");
    }
}
