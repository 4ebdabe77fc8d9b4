//! Cloud SQL instances
//!
//! Cloud SQL Admin reports operations in the legacy shape:
//! `{"kind": "sql#operation", "name": "<uuid>", "status": "PENDING"}`.

use crate::names::{check_dns_label, copy_attr};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::Duration;
use stratum_core::action::get_info;
use stratum_core::resource::{require, unknown_action};
use stratum_core::{
    ActionArgs, ActionContext, HttpRequest, ObservedState, PollConfig, Readiness, ResourceKind,
    Result, required_arg, wait_for,
};

pub const SQL_ADMIN_API: &str = "https://sqladmin.googleapis.com/v1";

/// Restores of large instances routinely take tens of minutes
const RESTORE_BUDGET: Duration = Duration::from_secs(20 * 60);

/// Name of a Cloud SQL operation response
pub(crate) fn sql_operation_ref(response: &Value) -> Option<String> {
    if response.get("kind").and_then(Value::as_str) != Some("sql#operation") {
        return None;
    }
    response
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn default_database_version() -> String {
    "POSTGRES_15".to_string()
}

/// Desired configuration of a Cloud SQL instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlInstanceConfig {
    pub name: String,

    #[serde(default = "default_database_version")]
    pub database_version: String,

    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub tier: String,

    #[serde(default)]
    pub disk_size_gb: Option<u64>,

    /// ZONAL or REGIONAL
    #[serde(default)]
    pub availability_type: Option<String>,

    #[serde(default)]
    pub backups: bool,

    #[serde(default)]
    pub deletion_protection: bool,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub endpoint: Option<String>,
}

pub struct CloudSqlInstance {
    project: String,
    region: String,
    config: SqlInstanceConfig,
}

impl CloudSqlInstance {
    pub fn new(project: impl Into<String>, default_region: Option<&str>, config: SqlInstanceConfig) -> Self {
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

    fn base(&self) -> String {
        format!(
            "{}/projects/{}",
            self.config.endpoint.as_deref().unwrap_or(SQL_ADMIN_API),
            self.project
        )
    }

    fn settings(&self) -> Value {
        let mut settings = json!({
            "tier": self.config.tier,
            "userLabels": self.config.labels,
            "deletionProtectionEnabled": self.config.deletion_protection,
            "backupConfiguration": { "enabled": self.config.backups },
        });
        if let Some(size) = self.config.disk_size_gb {
            settings["dataDiskSizeGb"] = json!(size.to_string());
        }
        if let Some(availability) = &self.config.availability_type {
            settings["availabilityType"] = json!(availability);
        }
        settings
    }

    async fn create_backup(&self, ctx: &mut ActionContext<'_>, args: &ActionArgs) -> Result<String> {
        let description = args
            .get("description")
            .cloned()
            .unwrap_or_else(|| "stratum on-demand backup".to_string());
        let response = ctx
            .send(HttpRequest::post(
                format!("{}/backupRuns", self.probe_url()),
                json!({ "description": description }),
            ))
            .await?;

        if let Some(operation) = sql_operation_ref(&response) {
            ctx.wait(&self.operation_url(&operation)).await?;
        }
        Ok(format!("Backup of {} created", self.config.name))
    }

    async fn list_backups(&self, ctx: &mut ActionContext<'_>) -> Result<String> {
        let response = ctx
            .send(HttpRequest::get(format!("{}/backupRuns", self.probe_url())))
            .await?;

        let items = response
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if items.is_empty() {
            return Ok(format!("No backups for {}", self.config.name));
        }

        let lines: Vec<String> = items
            .iter()
            .map(|item| {
                let field = |key: &str| {
                    item.get(key)
                        .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                        .unwrap_or_else(|| "-".to_string())
                };
                format!("{}\t{}\t{}\t{}", field("id"), field("status"), field("type"), field("startTime"))
            })
            .collect();
        Ok(lines.join("\n"))
    }

    async fn restore(&self, ctx: &mut ActionContext<'_>, args: &ActionArgs) -> Result<String> {
        let backup_id = required_arg(args, "backup_id")?;
        let source = args
            .get("source_instance")
            .map(String::as_str)
            .unwrap_or(&self.config.name);

        let response = ctx
            .send(HttpRequest::post(
                format!("{}/restoreBackup", self.probe_url()),
                json!({
                    "restoreBackupContext": {
                        "backupRunId": backup_id,
                        "instanceId": source,
                        "project": self.project,
                    }
                }),
            ))
            .await?;

        if let Some(operation) = sql_operation_ref(&response) {
            let budget = PollConfig::for_duration(RESTORE_BUDGET, ctx.poll.delay);
            tracing::info!(instance = %self.config.name, backup_id, operation = %operation, "Waiting for restore");
            wait_for(ctx.transport, &self.operation_url(&operation), &budget).await?;
        }
        Ok(format!(
            "Restored {} from backup {} of {}",
            self.config.name, backup_id, source
        ))
    }
}

#[async_trait]
impl ResourceKind for CloudSqlInstance {
    fn kind(&self) -> &str {
        "cloudsql-instance"
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn validate(&self) -> Result<()> {
        check_dns_label("Cloud SQL instance name", &self.config.name, 98)?;
        require("tier", &self.config.tier)?;
        require("region", &self.region)?;
        require("database_version", &self.config.database_version)
    }

    fn probe_url(&self) -> String {
        format!("{}/instances/{}", self.base(), self.config.name)
    }

    fn create_request(&self) -> Result<HttpRequest> {
        Ok(HttpRequest::post(
            format!("{}/instances", self.base()),
            json!({
                "name": self.config.name,
                "databaseVersion": self.config.database_version,
                "region": self.region,
                "settings": self.settings(),
            }),
        ))
    }

    fn update_request(&self, state: &ObservedState) -> Result<Option<HttpRequest>> {
        let tier = state.get_attribute::<String>("tier");
        let labels = state
            .get_attribute::<BTreeMap<String, String>>("labels")
            .unwrap_or_default();
        if tier.as_deref() == Some(self.config.tier.as_str()) && labels == self.config.labels {
            return Ok(None);
        }
        Ok(Some(HttpRequest::patch(
            self.probe_url(),
            json!({
                "settings": {
                    "tier": self.config.tier,
                    "userLabels": self.config.labels,
                }
            }),
        )))
    }

    fn operation_ref(&self, response: &Value) -> Option<String> {
        sql_operation_ref(response)
    }

    fn operation_url(&self, operation_ref: &str) -> String {
        format!("{}/operations/{}", self.base(), operation_ref)
    }

    fn populate_state(&self, body: &Value, state: &mut ObservedState) {
        copy_attr(state, body, "/connectionName", "connection_name");
        copy_attr(state, body, "/state", "state");
        copy_attr(state, body, "/databaseVersion", "database_version");
        copy_attr(state, body, "/ipAddresses/0/ipAddress", "ip_address");
        copy_attr(state, body, "/settings/tier", "tier");
        copy_attr(state, body, "/settings/userLabels", "labels");
        copy_attr(state, body, "/selfLink", "self_link");
    }

    fn readiness(&self, body: &Value) -> Readiness {
        match body.get("state").and_then(Value::as_str) {
            Some("RUNNABLE") => Readiness::Ready,
            Some(other) => Readiness::NotReady(format!("instance state is {}", other)),
            None => Readiness::NotReady("instance state unknown".to_string()),
        }
    }

    fn actions(&self) -> Vec<&'static str> {
        vec!["get-info", "create-backup", "list-backups", "restore"]
    }

    async fn run_action(
        &self,
        ctx: &mut ActionContext<'_>,
        action: &str,
        args: &ActionArgs,
    ) -> Result<String> {
        match action {
            "get-info" => get_info(ctx, self.probe_url()).await,
            "create-backup" => self.create_backup(ctx, args).await,
            "list-backups" => self.list_backups(ctx).await,
            "restore" => self.restore(ctx, args).await,
            other => Err(unknown_action(self.kind(), other)),
        }
    }
}
