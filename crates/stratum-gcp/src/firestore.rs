//! Firestore databases

use crate::names::{check_one_of, copy_attr};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use stratum_core::resource::require;
use stratum_core::{CloudError, HttpRequest, ObservedState, ResourceKind, Result};

pub const FIRESTORE_API: &str = "https://firestore.googleapis.com/v1";

const DATABASE_TYPES: &[&str] = &["FIRESTORE_NATIVE", "DATASTORE_MODE"];

fn default_database_type() -> String {
    "FIRESTORE_NATIVE".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirestoreConfig {
    /// Database ID; `(default)` addresses the project's default database
    pub name: String,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default = "default_database_type", rename = "type")]
    pub database_type: String,

    #[serde(default)]
    pub delete_protection: bool,

    #[serde(default)]
    pub endpoint: Option<String>,
}

pub struct FirestoreDatabase {
    project: String,
    location: String,
    config: FirestoreConfig,
}

impl FirestoreDatabase {
    pub fn new(project: impl Into<String>, default_region: Option<&str>, config: FirestoreConfig) -> Self {
        let location = config
            .location
            .clone()
            .or_else(|| default_region.map(str::to_string))
            .unwrap_or_default();
        Self {
            project: project.into(),
            location,
            config,
        }
    }

    fn api(&self) -> &str {
        self.config.endpoint.as_deref().unwrap_or(FIRESTORE_API)
    }

    fn databases_url(&self) -> String {
        format!("{}/projects/{}/databases", self.api(), self.project)
    }

    fn delete_protection_state(&self) -> &'static str {
        if self.config.delete_protection {
            "DELETE_PROTECTION_ENABLED"
        } else {
            "DELETE_PROTECTION_DISABLED"
        }
    }
}

fn valid_database_id(id: &str) -> bool {
    id == "(default)"
        || ((4..=63).contains(&id.len())
            && id.starts_with(|c: char| c.is_ascii_lowercase())
            && !id.ends_with('-')
            && id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'))
}

#[async_trait]
impl ResourceKind for FirestoreDatabase {
    fn kind(&self) -> &str {
        "firestore-database"
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn validate(&self) -> Result<()> {
        if !valid_database_id(&self.config.name) {
            return Err(CloudError::Validation(format!(
                "database id '{}' must be '(default)' or 4-63 lowercase letters, digits or hyphens",
                self.config.name
            )));
        }
        require("location", &self.location)?;
        check_one_of("type", &self.config.database_type, DATABASE_TYPES)
    }

    fn probe_url(&self) -> String {
        format!("{}/{}", self.databases_url(), self.config.name)
    }

    fn create_request(&self) -> Result<HttpRequest> {
        Ok(HttpRequest::post(
            format!("{}?databaseId={}", self.databases_url(), self.config.name),
            json!({
                "locationId": self.location,
                "type": self.config.database_type,
                "deleteProtectionState": self.delete_protection_state(),
            }),
        ))
    }

    fn update_request(&self, state: &ObservedState) -> Result<Option<HttpRequest>> {
        let current = state.get_attribute::<String>("delete_protection_state");
        if current.as_deref() == Some(self.delete_protection_state()) {
            return Ok(None);
        }
        Ok(Some(HttpRequest::patch(
            format!("{}?updateMask=deleteProtectionState", self.probe_url()),
            json!({ "deleteProtectionState": self.delete_protection_state() }),
        )))
    }

    fn operation_url(&self, operation_ref: &str) -> String {
        format!("{}/{}", self.api(), operation_ref)
    }

    fn populate_state(&self, body: &Value, state: &mut ObservedState) {
        copy_attr(state, body, "/name", "resource_name");
        copy_attr(state, body, "/uid", "uid");
        copy_attr(state, body, "/locationId", "location");
        copy_attr(state, body, "/type", "type");
        copy_attr(state, body, "/deleteProtectionState", "delete_protection_state");
    }
}
