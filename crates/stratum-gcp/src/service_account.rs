//! IAM service accounts

use crate::names::copy_attr;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use stratum_core::{CloudError, HttpRequest, ObservedState, ResourceKind, Result};

pub const IAM_API: &str = "https://iam.googleapis.com/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccountConfig {
    /// Account ID, the local part of the account email
    pub name: String,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub endpoint: Option<String>,
}

pub struct ServiceAccount {
    project: String,
    config: ServiceAccountConfig,
}

impl ServiceAccount {
    pub fn new(project: impl Into<String>, config: ServiceAccountConfig) -> Self {
        Self {
            project: project.into(),
            config,
        }
    }

    pub fn email(&self) -> String {
        format!("{}@{}.iam.gserviceaccount.com", self.config.name, self.project)
    }

    fn api(&self) -> &str {
        self.config.endpoint.as_deref().unwrap_or(IAM_API)
    }

    fn display_name(&self) -> &str {
        self.config.display_name.as_deref().unwrap_or(&self.config.name)
    }
}

/// `[a-z][a-z0-9-]{4,28}[a-z0-9]`
fn valid_account_id(id: &str) -> bool {
    let bytes = id.as_bytes();
    (6..=30).contains(&bytes.len())
        && bytes[0].is_ascii_lowercase()
        && bytes[bytes.len() - 1] != b'-'
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}

#[async_trait]
impl ResourceKind for ServiceAccount {
    fn kind(&self) -> &str {
        "service-account"
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn validate(&self) -> Result<()> {
        if !valid_account_id(&self.config.name) {
            return Err(CloudError::Validation(format!(
                "service account id '{}' must be 6-30 lowercase letters, digits or hyphens, start with a letter and not end with a hyphen",
                self.config.name
            )));
        }
        Ok(())
    }

    fn probe_url(&self) -> String {
        format!(
            "{}/projects/{}/serviceAccounts/{}",
            self.api(),
            self.project,
            self.email()
        )
    }

    fn create_request(&self) -> Result<HttpRequest> {
        let mut account = json!({ "displayName": self.display_name() });
        if let Some(description) = &self.config.description {
            account["description"] = json!(description);
        }
        Ok(HttpRequest::post(
            format!("{}/projects/{}/serviceAccounts", self.api(), self.project),
            json!({
                "accountId": self.config.name,
                "serviceAccount": account,
            }),
        ))
    }

    fn update_request(&self, state: &ObservedState) -> Result<Option<HttpRequest>> {
        let display_name = state.get_attribute::<String>("display_name");
        let description = state.get_attribute::<String>("description");
        if display_name.as_deref() == Some(self.display_name())
            && description == self.config.description
        {
            return Ok(None);
        }
        Ok(Some(HttpRequest::patch(
            self.probe_url(),
            json!({
                "serviceAccount": {
                    "displayName": self.display_name(),
                    "description": self.config.description.clone().unwrap_or_default(),
                },
                "updateMask": "displayName,description",
            }),
        )))
    }

    fn operation_ref(&self, _response: &Value) -> Option<String> {
        None
    }

    fn operation_url(&self, operation_ref: &str) -> String {
        format!("{}/{}", self.api(), operation_ref)
    }

    fn populate_state(&self, body: &Value, state: &mut ObservedState) {
        copy_attr(state, body, "/email", "email");
        copy_attr(state, body, "/uniqueId", "unique_id");
        copy_attr(state, body, "/displayName", "display_name");
        copy_attr(state, body, "/description", "description");
    }
}
