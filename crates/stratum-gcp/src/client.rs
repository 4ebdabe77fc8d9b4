//! Google Cloud REST client
//!
//! A [`Transport`] over reqwest using a bearer access token supplied by the
//! host environment.

use crate::error::{GcpError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use stratum_core::{HttpRequest, HttpResponse, Method, Transport};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Configuration for [`GcpClient`]
#[derive(Clone)]
pub struct GcpConfig {
    pub access_token: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for GcpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcpConfig")
            .field("access_token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GcpConfig {
    /// Read `STRATUM_ACCESS_TOKEN` (or `GOOGLE_OAUTH_ACCESS_TOKEN`) and
    /// optionally `STRATUM_API_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self> {
        let access_token = std::env::var("STRATUM_ACCESS_TOKEN")
            .or_else(|_| std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN"))
            .map_err(|_| GcpError::MissingEnvVar("STRATUM_ACCESS_TOKEN".to_string()))?;

        let timeout_secs = match std::env::var("STRATUM_API_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                GcpError::InvalidManifest(format!("STRATUM_API_TIMEOUT_SECS is not a number: {}", raw))
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            access_token,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

pub struct GcpClient {
    client: reqwest::Client,
    access_token: String,
}

impl GcpClient {
    pub fn new(config: GcpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("stratum/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            access_token: config.access_token,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GcpConfig::from_env()?)
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for GcpClient {
    fn label(&self) -> &str {
        "GCP"
    }

    async fn send(&self, request: HttpRequest) -> HttpResponse {
        tracing::debug!(method = %request.method, url = %request.url, "GCP request");

        let mut builder = self
            .client
            .request(to_reqwest(request.method), &request.url)
            .bearer_auth(&self.access_token);

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return HttpResponse::transport_error(e.to_string()),
        };

        let status = response.status();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();

        match response.text().await {
            Ok(body) => HttpResponse {
                status_code: status.as_u16(),
                status: status.to_string(),
                headers,
                body,
                error: None,
            },
            Err(e) => HttpResponse::transport_error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> GcpClient {
        GcpClient::new(GcpConfig {
            access_token: "test-token".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_send_with_bearer_and_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/instances"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_json(json!({"name": "foo"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "operations/1"})))
            .mount(&mock_server)
            .await;

        let response = client()
            .send(HttpRequest::post(
                format!("{}/v1/instances", mock_server.uri()),
                json!({"name": "foo"}),
            ))
            .await;

        assert!(response.is_success());
        assert_eq!(response.status_code, 200);
        assert!(response.body.contains("operations/1"));
    }

    #[tokio::test]
    async fn test_error_status_is_reported_not_raised() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/instances/missing"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"error": {"code": 404, "message": "not found"}})),
            )
            .mount(&mock_server)
            .await;

        let response = client()
            .send(HttpRequest::get(format!("{}/v1/instances/missing", mock_server.uri())))
            .await;

        assert_eq!(response.status_code, 404);
        assert!(response.error.is_none());
        assert!(response.body.contains("not found"));
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport_error() {
        let response = client()
            .send(HttpRequest::get("http://127.0.0.1:9/unreachable"))
            .await;

        assert!(response.error.is_some());
        assert_eq!(response.status_code, 0);
    }

    #[test]
    fn test_config_from_env() {
        temp_env::with_vars(
            [
                ("STRATUM_ACCESS_TOKEN", None),
                ("GOOGLE_OAUTH_ACCESS_TOKEN", Some("fallback")),
                ("STRATUM_API_TIMEOUT_SECS", Some("15")),
            ],
            || {
                let config = GcpConfig::from_env().unwrap();
                assert_eq!(config.access_token, "fallback");
                assert_eq!(config.timeout, Duration::from_secs(15));
                assert!(!format!("{:?}", config).contains("fallback"));
            },
        );

        temp_env::with_vars(
            [
                ("STRATUM_ACCESS_TOKEN", None::<&str>),
                ("GOOGLE_OAUTH_ACCESS_TOKEN", None),
            ],
            || {
                assert!(matches!(GcpConfig::from_env(), Err(GcpError::MissingEnvVar(_))));
            },
        );
    }
}
