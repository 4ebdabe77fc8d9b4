//! Memorystore for Redis

use crate::names::{check_dns_label, check_one_of, copy_attr};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use stratum_core::action::get_info;
use stratum_core::resource::{require, unknown_action};
use stratum_core::{
    ActionArgs, ActionContext, CloudError, HttpRequest, ObservedState, Readiness, ResourceKind,
    Result,
};

pub const REDIS_API: &str = "https://redis.googleapis.com/v1";

const TIERS: &[&str] = &["BASIC", "STANDARD_HA"];

fn default_tier() -> String {
    "BASIC".to_string()
}

fn default_memory_size_gb() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub name: String,

    #[serde(default)]
    pub region: Option<String>,

    #[serde(default = "default_tier")]
    pub tier: String,

    #[serde(default = "default_memory_size_gb")]
    pub memory_size_gb: u32,

    #[serde(default)]
    pub redis_version: Option<String>,

    /// VPC network the instance attaches to
    #[serde(default)]
    pub authorized_network: Option<String>,

    #[serde(default)]
    pub auth_enabled: bool,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub endpoint: Option<String>,
}

pub struct RedisInstance {
    project: String,
    region: String,
    config: RedisConfig,
}

impl RedisInstance {
    pub fn new(project: impl Into<String>, default_region: Option<&str>, config: RedisConfig) -> Self {
        let region = config
            .region
            .clone()
            .or_else(|| default_region.map(str::to_string))
            .unwrap_or_default();
        Self {
            project: project.into(),
            region,
            config,
        }
    }

    fn api(&self) -> &str {
        self.config.endpoint.as_deref().unwrap_or(REDIS_API)
    }

    fn parent(&self) -> String {
        format!("{}/projects/{}/locations/{}", self.api(), self.project, self.region)
    }
}

#[async_trait]
impl ResourceKind for RedisInstance {
    fn kind(&self) -> &str {
        "redis-instance"
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn validate(&self) -> Result<()> {
        check_dns_label("Redis instance name", &self.config.name, 40)?;
        require("region", &self.region)?;
        check_one_of("tier", &self.config.tier, TIERS)?;
        if self.config.memory_size_gb < 1 {
            return Err(CloudError::Validation(
                "memory_size_gb must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn probe_url(&self) -> String {
        format!("{}/instances/{}", self.parent(), self.config.name)
    }

    fn create_request(&self) -> Result<HttpRequest> {
        let mut body = json!({
            "tier": self.config.tier,
            "memorySizeGb": self.config.memory_size_gb,
            "authEnabled": self.config.auth_enabled,
            "labels": self.config.labels,
        });
        if let Some(version) = &self.config.redis_version {
            body["redisVersion"] = json!(version);
        }
        if let Some(network) = &self.config.authorized_network {
            body["authorizedNetwork"] = json!(network);
        }

        Ok(HttpRequest::post(
            format!("{}/instances?instanceId={}", self.parent(), self.config.name),
            body,
        ))
    }

    fn update_request(&self, state: &ObservedState) -> Result<Option<HttpRequest>> {
        let mut mask = Vec::new();
        if state.get_attribute::<u32>("memory_size_gb") != Some(self.config.memory_size_gb) {
            mask.push("memorySizeGb");
        }
        if state
            .get_attribute::<BTreeMap<String, String>>("labels")
            .unwrap_or_default()
            != self.config.labels
        {
            mask.push("labels");
        }
        if mask.is_empty() {
            return Ok(None);
        }

        Ok(Some(HttpRequest::patch(
            format!("{}?updateMask={}", self.probe_url(), mask.join(",")),
            json!({
                "memorySizeGb": self.config.memory_size_gb,
                "labels": self.config.labels,
            }),
        )))
    }

    fn operation_url(&self, operation_ref: &str) -> String {
        format!("{}/{}", self.api(), operation_ref)
    }

    fn populate_state(&self, body: &Value, state: &mut ObservedState) {
        copy_attr(state, body, "/host", "host");
        copy_attr(state, body, "/port", "port");
        copy_attr(state, body, "/state", "state");
        copy_attr(state, body, "/memorySizeGb", "memory_size_gb");
        copy_attr(state, body, "/redisVersion", "redis_version");
        copy_attr(state, body, "/labels", "labels");
    }

    fn readiness(&self, body: &Value) -> Readiness {
        match body.get("state").and_then(Value::as_str) {
            Some("READY") => Readiness::Ready,
            Some(other) => Readiness::NotReady(format!("instance state is {}", other)),
            None => Readiness::NotReady("instance state unknown".to_string()),
        }
    }

    fn actions(&self) -> Vec<&'static str> {
        vec!["get-info", "get-auth-string"]
    }

    async fn run_action(
        &self,
        ctx: &mut ActionContext<'_>,
        action: &str,
        _args: &ActionArgs,
    ) -> Result<String> {
        match action {
            "get-info" => get_info(ctx, self.probe_url()).await,
            "get-auth-string" => {
                let body = ctx
                    .send(HttpRequest::get(format!("{}/authString", self.probe_url())))
                    .await?;
                body.get("authString")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        CloudError::Validation(format!(
                            "AUTH is not enabled on {}",
                            self.config.name
                        ))
                    })
            }
            other => Err(unknown_action(self.kind(), other)),
        }
    }
}
