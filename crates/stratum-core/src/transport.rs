//! HTTP transport seam
//!
//! The core never talks to the network directly. Providers hand the
//! reconciler a [`Transport`] that signs and sends requests and reports the
//! outcome in a uniform shape, so tests can substitute a scripted fake.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Whether the method changes remote state
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Method::Get)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outgoing request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, url).with_body(body)
    }

    pub fn put(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, url).with_body(body)
    }

    pub fn patch(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Patch, url).with_body(body)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Raw response as reported by the transport
///
/// A transport-level failure (DNS, connect, timeout) is reported through
/// `error` with `status_code == 0` rather than as a Rust error, so the
/// normalizer and the probe can decide how lossy to be.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status_code: u16,
    pub status: String,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub error: Option<String>,
}

impl HttpResponse {
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            status: status_code.to_string(),
            headers: HashMap::new(),
            body: body.into(),
            error: None,
        }
    }

    pub fn json(status_code: u16, body: &Value) -> Self {
        Self::new(status_code, body.to_string())
    }

    pub fn transport_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status_code)
    }
}

/// Signed HTTP access to a provider's control plane
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short provider label used as an error prefix (e.g. "GCP")
    fn label(&self) -> &str;

    /// Send a request. Never fails; failures are reported in the response.
    async fn send(&self, request: HttpRequest) -> HttpResponse;
}
