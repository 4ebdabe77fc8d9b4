//! Cloud SQL users
//!
//! Passwords are generated on first create and kept in the secret store
//! under [`SqlUser::secret_name`]; the manifest never carries them.

use crate::sql::{SQL_ADMIN_API, sql_operation_ref};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use stratum_core::action::get_info;
use stratum_core::resource::{require, unknown_action};
use stratum_core::{
    ActionArgs, ActionContext, HttpRequest, ObservedState, ResourceKind, Result, SecretStore,
    ensure_secret, rand_string,
};

const PASSWORD_LENGTH: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlUserConfig {
    pub name: String,

    /// Owning Cloud SQL instance
    #[serde(default)]
    pub instance: String,

    #[serde(default)]
    pub endpoint: Option<String>,
}

pub struct SqlUser {
    project: String,
    config: SqlUserConfig,
    secrets: Arc<dyn SecretStore>,
}

impl SqlUser {
    pub fn new(project: impl Into<String>, config: SqlUserConfig, secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            project: project.into(),
            config,
            secrets,
        }
    }

    pub fn secret_name(instance: &str, user: &str) -> String {
        format!("cloudsql-user/{}/{}", instance, user)
    }

    fn instance_url(&self) -> String {
        format!(
            "{}/projects/{}/instances/{}",
            self.config.endpoint.as_deref().unwrap_or(SQL_ADMIN_API),
            self.project,
            self.config.instance
        )
    }

    fn users_url(&self) -> String {
        format!("{}/users", self.instance_url())
    }

    /// The users collection addresses a single user by query parameter
    fn user_query_url(&self) -> String {
        format!("{}?name={}", self.users_url(), self.config.name)
    }

    /// Set a fresh password on the instance. The secret store only sees it
    /// once the provider has accepted it.
    async fn reset_password(&self, ctx: &mut ActionContext<'_>) -> Result<String> {
        let secrets = ctx.secrets()?;
        let secret_name = Self::secret_name(&self.config.instance, &self.config.name);
        let password = rand_string(PASSWORD_LENGTH);

        let response = ctx
            .send(HttpRequest::put(
                self.user_query_url(),
                json!({ "name": self.config.name, "password": password }),
            ))
            .await?;
        if let Some(operation) = sql_operation_ref(&response) {
            ctx.wait(&self.operation_url(&operation)).await?;
        }
        secrets.set(&secret_name, &password)?;

        tracing::info!(user = %self.config.name, instance = %self.config.instance, "Password rotated");
        Ok(format!(
            "Password for {} on {} rotated; stored as secret '{}'",
            self.config.name, self.config.instance, secret_name
        ))
    }
}

#[async_trait]
impl ResourceKind for SqlUser {
    fn kind(&self) -> &str {
        "cloudsql-user"
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn validate(&self) -> Result<()> {
        require("instance", &self.config.instance)?;
        require("name", &self.config.name)
    }

    fn probe_url(&self) -> String {
        format!("{}/{}", self.users_url(), self.config.name)
    }

    fn create_request(&self) -> Result<HttpRequest> {
        let secret_name = Self::secret_name(&self.config.instance, &self.config.name);
        let password = ensure_secret(self.secrets.as_ref(), &secret_name, PASSWORD_LENGTH)?;
        Ok(HttpRequest::post(
            self.users_url(),
            json!({
                "name": self.config.name,
                "instance": self.config.instance,
                "project": self.project,
                "password": password,
            }),
        ))
    }

    fn delete_request(&self, _state: &ObservedState) -> HttpRequest {
        HttpRequest::delete(self.user_query_url())
    }

    fn operation_ref(&self, response: &Value) -> Option<String> {
        sql_operation_ref(response)
    }

    fn operation_url(&self, operation_ref: &str) -> String {
        format!(
            "{}/projects/{}/operations/{}",
            self.config.endpoint.as_deref().unwrap_or(SQL_ADMIN_API),
            self.project,
            operation_ref
        )
    }

    fn populate_state(&self, body: &Value, state: &mut ObservedState) {
        crate::names::copy_attr(state, body, "/name", "user");
        crate::names::copy_attr(state, body, "/host", "host");
        state.set_attribute("instance", json!(self.config.instance));
        state.set_attribute(
            "password_secret",
            json!(Self::secret_name(&self.config.instance, &self.config.name)),
        );
    }

    fn actions(&self) -> Vec<&'static str> {
        vec!["get-info", "reset-password"]
    }

    async fn run_action(
        &self,
        ctx: &mut ActionContext<'_>,
        action: &str,
        _args: &ActionArgs,
    ) -> Result<String> {
        match action {
            "get-info" => get_info(ctx, self.probe_url()).await,
            "reset-password" => self.reset_password(ctx).await,
            other => Err(unknown_action(self.kind(), other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_core::testing::FakeTransport;
    use stratum_core::{CloudError, HttpResponse, MemorySecretStore, Method, PollConfig};

    const SECRET: &str = "cloudsql-user/orders-db/app";

    fn config() -> SqlUserConfig {
        SqlUserConfig {
            name: "app".to_string(),
            instance: "orders-db".to_string(),
            endpoint: None,
        }
    }

    fn user(secrets: &Arc<MemorySecretStore>) -> SqlUser {
        SqlUser::new("acme", config(), secrets.clone())
    }

    #[test]
    fn test_password_created_with_first_create_request() {
        let secrets = Arc::new(MemorySecretStore::new());
        let user = user(&secrets);
        assert!(secrets.get(SECRET).is_err());

        let first = user.create_request().unwrap().body.unwrap();
        let stored = secrets.get(SECRET).unwrap();
        assert_eq!(stored.len(), PASSWORD_LENGTH);
        assert_eq!(first["password"], stored.as_str());

        let second = user.create_request().unwrap().body.unwrap();
        assert_eq!(second["password"], stored.as_str());
    }

    #[test]
    fn test_urls() {
        let secrets = Arc::new(MemorySecretStore::new());
        let user = user(&secrets);
        assert_eq!(
            user.probe_url(),
            "https://sqladmin.googleapis.com/v1/projects/acme/instances/orders-db/users/app"
        );
        let delete = user.delete_request(&ObservedState::new());
        assert_eq!(delete.method, Method::Delete);
        assert!(delete.url.ends_with("/instances/orders-db/users?name=app"));
        assert!(secrets.get(SECRET).is_err());
    }

    #[test]
    fn test_requires_instance() {
        let mut config = config();
        config.instance = String::new();
        let user = SqlUser::new("acme", config, Arc::new(MemorySecretStore::new()));
        assert!(matches!(user.validate(), Err(CloudError::Validation(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_password_stores_accepted_password() {
        let secrets = Arc::new(MemorySecretStore::new());
        secrets.set(SECRET, "old-password").unwrap();
        let user = user(&secrets);

        let transport = FakeTransport::new();
        transport.push_json(200, json!({"kind": "sql#operation", "name": "op-9", "status": "PENDING"}));
        transport.push_json(200, json!({"kind": "sql#operation", "name": "op-9", "status": "DONE"}));

        let mut state = ObservedState::new();
        let mut ctx =
            ActionContext::new(&transport, PollConfig::default(), &mut state).with_secrets(secrets.as_ref());
        let output = user
            .run_action(&mut ctx, "reset-password", &ActionArgs::new())
            .await
            .unwrap();
        assert!(output.contains(SECRET));

        let new = secrets.get(SECRET).unwrap();
        assert_ne!(new, "old-password");

        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::Put);
        assert_eq!(requests[0].body.as_ref().unwrap()["password"], new.as_str());
        assert!(requests[1].url.ends_with("/projects/acme/operations/op-9"));
    }

    #[tokio::test]
    async fn test_rejected_reset_keeps_stored_password() {
        let secrets = Arc::new(MemorySecretStore::new());
        secrets.set(SECRET, "old-password").unwrap();
        let user = user(&secrets);

        let transport = FakeTransport::new();
        transport.push(HttpResponse::new(
            403,
            r#"{"error":{"code":403,"message":"Not authorized"}}"#,
        ));

        let mut state = ObservedState::new();
        let mut ctx =
            ActionContext::new(&transport, PollConfig::default(), &mut state).with_secrets(secrets.as_ref());
        let err = user
            .run_action(&mut ctx, "reset-password", &ActionArgs::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Provider { .. }));
        assert_eq!(secrets.get(SECRET).unwrap(), "old-password");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reset_operation_keeps_stored_password() {
        let secrets = Arc::new(MemorySecretStore::new());
        secrets.set(SECRET, "old-password").unwrap();
        let user = user(&secrets);

        let transport = FakeTransport::new();
        transport.push_json(200, json!({"kind": "sql#operation", "name": "op-10", "status": "PENDING"}));
        transport.push_json(
            200,
            json!({
                "kind": "sql#operation",
                "name": "op-10",
                "status": "DONE",
                "error": {"errors": [{"code": "INTERNAL_ERROR", "message": "password policy"}]}
            }),
        );

        let mut state = ObservedState::new();
        let mut ctx =
            ActionContext::new(&transport, PollConfig::default(), &mut state).with_secrets(secrets.as_ref());
        let err = user
            .run_action(&mut ctx, "reset-password", &ActionArgs::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::OperationFailed { .. }));
        assert_eq!(secrets.get(SECRET).unwrap(), "old-password");
    }

    #[tokio::test]
    async fn test_reset_password_needs_secret_store() {
        let secrets = Arc::new(MemorySecretStore::new());
        let user = user(&secrets);
        let transport = FakeTransport::new();
        let mut state = ObservedState::new();
        let mut ctx = ActionContext::new(&transport, PollConfig::default(), &mut state);

        let err = user
            .run_action(&mut ctx, "reset-password", &ActionArgs::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Secret(_)));
        assert_eq!(transport.request_count(), 0);
    }
}
