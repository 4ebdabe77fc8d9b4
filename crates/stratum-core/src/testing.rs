//! Scripted transport for tests

use crate::transport::{HttpRequest, HttpResponse, Method, Transport};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays queued responses in order and records every request.
///
/// When the queue is empty the fallback response is returned, or a
/// transport error if none was set.
#[derive(Default)]
pub struct FakeTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    fallback: Mutex<Option<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: HttpResponse) {
        lock(&self.responses).push_back(response);
    }

    pub fn push_json(&self, status_code: u16, body: Value) {
        self.push(HttpResponse::json(status_code, &body));
    }

    /// Response returned once the queue runs dry
    pub fn set_fallback(&self, response: HttpResponse) {
        *lock(&self.fallback) = Some(response);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn count(&self, method: Method) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|r| r.method == method)
            .count()
    }

    pub fn mutating_count(&self) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|r| r.method.is_mutating())
            .count()
    }

    /// `"METHOD url"` for each recorded request
    pub fn calls(&self) -> Vec<String> {
        lock(&self.requests)
            .iter()
            .map(|r| format!("{} {}", r.method, r.url))
            .collect()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Transport for FakeTransport {
    fn label(&self) -> &str {
        "FAKE"
    }

    async fn send(&self, request: HttpRequest) -> HttpResponse {
        lock(&self.requests).push(request);
        if let Some(response) = lock(&self.responses).pop_front() {
            return response;
        }
        lock(&self.fallback)
            .clone()
            .unwrap_or_else(|| HttpResponse::transport_error("no scripted response"))
    }
}
