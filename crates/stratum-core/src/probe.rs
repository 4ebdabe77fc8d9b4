//! Resource existence probe

use crate::normalize::parse_body;
use crate::transport::{HttpRequest, Transport};
use serde_json::{Value, json};

/// GET `url` and return the resource body, or `None` if it does not exist.
///
/// 404, any other status >= 400 and transport errors all read as "does
/// not exist". A 2xx with an empty body is an existing
/// resource with no detail (`{}`).
pub async fn probe(transport: &dyn Transport, url: &str) -> Option<Value> {
    let response = transport.send(HttpRequest::get(url)).await;

    if let Some(error) = &response.error {
        tracing::warn!(url = %url, error = %error, "Probe failed at transport level, treating as absent");
        return None;
    }

    match response.status_code {
        404 => {
            tracing::debug!(url = %url, "Probe miss");
            None
        }
        code if code >= 400 => {
            tracing::warn!(url = %url, status = code, "Probe returned an error status, treating as absent");
            None
        }
        _ => Some(parse_body(&response.body).unwrap_or_else(|_| json!({}))),
    }
}
