//! Named resource actions
//!
//! Actions such as `get-info` or `restore` are invoked by the host with a
//! string-keyed argument map and return text for the operator.

use crate::error::{CloudError, Result};
use crate::normalize::normalize;
use crate::operation::Operation;
use crate::poller::{PollConfig, wait_for};
use crate::probe::probe;
use crate::secret::SecretStore;
use crate::state::ObservedState;
use crate::transport::{HttpRequest, Transport};
use serde_json::Value;
use std::collections::HashMap;

pub type ActionArgs = HashMap<String, String>;

/// Parse `key=value` pairs into an argument map
pub fn parse_args<I, S>(pairs: I) -> Result<ActionArgs>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    pairs
        .into_iter()
        .map(|pair| {
            let pair = pair.as_ref();
            pair.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                .filter(|(k, _)| !k.is_empty())
                .ok_or_else(|| {
                    CloudError::Validation(format!("expected key=value argument, got '{}'", pair))
                })
        })
        .collect()
}

/// Required argument lookup
pub fn required_arg<'a>(args: &'a ActionArgs, key: &str) -> Result<&'a str> {
    args.get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CloudError::Validation(format!("missing required argument '{}'", key)))
}

/// Everything an action may touch
pub struct ActionContext<'a> {
    pub transport: &'a dyn Transport,
    pub poll: PollConfig,
    pub state: &'a mut ObservedState,
    pub secrets: Option<&'a dyn SecretStore>,
}

impl<'a> ActionContext<'a> {
    pub fn new(transport: &'a dyn Transport, poll: PollConfig, state: &'a mut ObservedState) -> Self {
        Self {
            transport,
            poll,
            state,
            secrets: None,
        }
    }

    pub fn with_secrets(mut self, secrets: &'a dyn SecretStore) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Send a request and normalize the response
    pub async fn send(&self, request: HttpRequest) -> Result<Value> {
        let method = request.method;
        let url = request.url.clone();
        let response = self.transport.send(request).await;
        normalize(self.transport.label(), method, &url, &response)
    }

    /// Block until the operation at `operation_url` finishes
    pub async fn wait(&self, operation_url: &str) -> Result<Operation> {
        wait_for(self.transport, operation_url, &self.poll).await
    }

    pub fn secrets(&self) -> Result<&'a dyn SecretStore> {
        self.secrets
            .ok_or_else(|| CloudError::Secret("no secret store configured".to_string()))
    }
}

/// Probe the resource and pretty-print its body
pub async fn get_info(ctx: &mut ActionContext<'_>, probe_url: String) -> Result<String> {
    match probe(ctx.transport, &probe_url).await {
        Some(body) => Ok(serde_json::to_string_pretty(&body)?),
        None => Err(CloudError::NotFound(probe_url)),
    }
}
