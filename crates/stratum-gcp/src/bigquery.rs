//! BigQuery datasets
//!
//! Dataset calls complete synchronously; there is no operation to follow.

use crate::names::copy_attr;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use stratum_core::{CloudError, HttpRequest, ObservedState, ResourceKind, Result};

pub const BIGQUERY_API: &str = "https://bigquery.googleapis.com/bigquery/v2";

const MAX_DATASET_ID_LEN: usize = 1024;

fn default_location() -> String {
    "US".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Dataset ID: letters, digits and underscores
    pub name: String,

    #[serde(default = "default_location")]
    pub location: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub default_table_expiration_ms: Option<u64>,

    /// Drop contained tables when the dataset is deleted
    #[serde(default)]
    pub delete_contents: bool,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub endpoint: Option<String>,
}

pub struct BigQueryDataset {
    project: String,
    config: DatasetConfig,
}

impl BigQueryDataset {
    pub fn new(project: impl Into<String>, config: DatasetConfig) -> Self {
        Self {
            project: project.into(),
            config,
        }
    }

    fn datasets_url(&self) -> String {
        format!(
            "{}/projects/{}/datasets",
            self.config.endpoint.as_deref().unwrap_or(BIGQUERY_API),
            self.project
        )
    }

    fn body(&self) -> Value {
        let mut body = json!({
            "datasetReference": {
                "projectId": self.project,
                "datasetId": self.config.name,
            },
            "location": self.config.location,
            "labels": self.config.labels,
        });
        if let Some(description) = &self.config.description {
            body["description"] = json!(description);
        }
        if let Some(expiration) = self.config.default_table_expiration_ms {
            body["defaultTableExpirationMs"] = json!(expiration.to_string());
        }
        body
    }

    /// True when the last observed dataset matches the configured
    /// description, labels and table expiration
    fn in_sync(&self, state: &ObservedState) -> bool {
        let description = state.get_attribute::<String>("description");
        let labels = state
            .get_attribute::<BTreeMap<String, String>>("labels")
            .unwrap_or_default();
        // the API encodes int64 fields as strings
        let expiration = state.attributes.get("default_table_expiration_ms").and_then(|v| match v {
            Value::String(s) => s.parse::<u64>().ok(),
            other => other.as_u64(),
        });

        description == self.config.description
            && labels == self.config.labels
            && expiration == self.config.default_table_expiration_ms
    }
}

#[async_trait]
impl ResourceKind for BigQueryDataset {
    fn kind(&self) -> &str {
        "bigquery-dataset"
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn validate(&self) -> Result<()> {
        let id = &self.config.name;
        let valid = !id.is_empty()
            && id.len() <= MAX_DATASET_ID_LEN
            && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(CloudError::Validation(format!(
                "dataset id '{}' must be 1-{} letters, digits or underscores",
                id, MAX_DATASET_ID_LEN
            )));
        }
        Ok(())
    }

    fn probe_url(&self) -> String {
        format!("{}/{}", self.datasets_url(), self.config.name)
    }

    fn create_request(&self) -> Result<HttpRequest> {
        Ok(HttpRequest::post(self.datasets_url(), self.body()))
    }

    fn update_request(&self, state: &ObservedState) -> Result<Option<HttpRequest>> {
        if self.in_sync(state) {
            return Ok(None);
        }
        Ok(Some(HttpRequest::patch(self.probe_url(), self.body())))
    }

    fn delete_request(&self, _state: &ObservedState) -> HttpRequest {
        if self.config.delete_contents {
            HttpRequest::delete(format!("{}?deleteContents=true", self.probe_url()))
        } else {
            HttpRequest::delete(self.probe_url())
        }
    }

    fn operation_ref(&self, _response: &Value) -> Option<String> {
        None
    }

    fn operation_url(&self, operation_ref: &str) -> String {
        format!("{}/{}", self.datasets_url(), operation_ref)
    }

    fn populate_state(&self, body: &Value, state: &mut ObservedState) {
        copy_attr(state, body, "/id", "id");
        copy_attr(state, body, "/location", "location");
        copy_attr(state, body, "/selfLink", "self_link");
        copy_attr(state, body, "/etag", "etag");

        // unset fields are omitted from the body; drop what a previous read saw
        for key in ["description", "labels", "default_table_expiration_ms"] {
            state.attributes.remove(key);
        }
        copy_attr(state, body, "/description", "description");
        copy_attr(state, body, "/labels", "labels");
        copy_attr(state, body, "/defaultTableExpirationMs", "default_table_expiration_ms");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use stratum_core::testing::FakeTransport;
    use stratum_core::{HttpResponse, Method, Reconciler};

    fn dataset(name: &str) -> BigQueryDataset {
        BigQueryDataset::new(
            "acme",
            DatasetConfig {
                name: name.to_string(),
                location: default_location(),
                description: Some("events".to_string()),
                default_table_expiration_ms: Some(86_400_000),
                delete_contents: false,
                labels: BTreeMap::new(),
                endpoint: None,
            },
        )
    }

    #[test]
    fn test_dataset_id_rules() {
        assert!(dataset("analytics_2026").validate().is_ok());
        assert!(dataset("").validate().is_err());
        assert!(dataset("analytics-2026").validate().is_err());
        assert!(dataset(&"a".repeat(1025)).validate().is_err());
    }

    #[test]
    fn test_delete_contents() {
        let mut ds = dataset("analytics");
        assert!(!ds.delete_request(&ObservedState::new()).url.contains("deleteContents"));
        ds.config.delete_contents = true;
        assert!(ds.delete_request(&ObservedState::new()).url.ends_with("?deleteContents=true"));
    }

    #[tokio::test]
    async fn test_synchronous_create_is_ready() {
        let transport = Arc::new(FakeTransport::new());
        let reconciler = Reconciler::new(transport.clone());
        let ds = dataset("analytics");
        let mut state = ObservedState::new();

        transport.push(HttpResponse::new(404, ""));
        transport.push_json(
            200,
            json!({"id": "acme:analytics", "location": "US", "datasetReference": {"datasetId": "analytics"}}),
        );

        assert!(reconciler.create(&ds, &mut state).await.unwrap().is_ready());
        assert_eq!(state.operation_ref(), None);
        assert_eq!(state.get_attribute::<String>("id").as_deref(), Some("acme:analytics"));

        let body = transport.requests()[1].body.clone().unwrap();
        assert_eq!(body["datasetReference"]["datasetId"], "analytics");
        assert_eq!(body["defaultTableExpirationMs"], "86400000");
        assert_eq!(transport.count(Method::Post), 1);
    }

    #[tokio::test]
    async fn test_update_only_on_drift() {
        let transport = Arc::new(FakeTransport::new());
        let reconciler = Reconciler::new(transport.clone());
        let mut ds = dataset("analytics");
        let mut state = ObservedState::new();

        transport.push_json(
            200,
            json!({
                "id": "acme:analytics",
                "location": "US",
                "description": "events",
                "defaultTableExpirationMs": "86400000"
            }),
        );
        reconciler.create(&ds, &mut state).await.unwrap();
        assert!(ds.update_request(&state).unwrap().is_none());

        transport.push_json(200, json!({"id": "acme:analytics"}));
        let action = reconciler.plan(&ds, &state).await.unwrap();
        assert_eq!(action.action_type, stratum_core::ActionType::NoOp);

        assert!(reconciler.update(&ds, &mut state).await.unwrap().is_ready());
        assert_eq!(transport.count(Method::Patch), 0);

        ds.config.labels.insert("team".to_string(), "data".to_string());
        let request = ds.update_request(&state).unwrap().unwrap();
        assert_eq!(request.method, Method::Patch);
        assert_eq!(request.body.unwrap()["labels"]["team"], "data");

        // a description removed upstream is drift too
        let mut bare = ObservedState::new();
        ds.populate_state(&json!({"id": "acme:analytics", "labels": {"team": "data"}}), &mut bare);
        assert!(ds.update_request(&bare).unwrap().is_some());
    }
}
