//! Desired-state manifest
//!
//! ```yaml
//! project: acme-prod
//! region: us-central1
//! resources:
//!   - kind: cloudsql-instance
//!     name: orders-db
//!     tier: db-custom-1-3840
//!   - kind: cloudsql-user
//!     name: app
//!     instance: orders-db
//! ```

use crate::bigquery::{BigQueryDataset, DatasetConfig};
use crate::error::{GcpError, Result};
use crate::firestore::{FirestoreConfig, FirestoreDatabase};
use crate::redis::{RedisConfig, RedisInstance};
use crate::service_account::{ServiceAccount, ServiceAccountConfig};
use crate::sql::{CloudSqlInstance, SqlInstanceConfig};
use crate::sql_user::{SqlUser, SqlUserConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use stratum_core::{ResourceKind, SecretStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub project: String,

    /// Default region for regional resources
    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub resources: Vec<ResourceSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ResourceSpec {
    CloudsqlInstance(SqlInstanceConfig),
    CloudsqlUser(SqlUserConfig),
    RedisInstance(RedisConfig),
    BigqueryDataset(DatasetConfig),
    FirestoreDatabase(FirestoreConfig),
    ServiceAccount(ServiceAccountConfig),
}

impl ResourceSpec {
    pub fn name(&self) -> &str {
        match self {
            ResourceSpec::CloudsqlInstance(c) => &c.name,
            ResourceSpec::CloudsqlUser(c) => &c.name,
            ResourceSpec::RedisInstance(c) => &c.name,
            ResourceSpec::BigqueryDataset(c) => &c.name,
            ResourceSpec::FirestoreDatabase(c) => &c.name,
            ResourceSpec::ServiceAccount(c) => &c.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ResourceSpec::CloudsqlInstance(_) => "cloudsql-instance",
            ResourceSpec::CloudsqlUser(_) => "cloudsql-user",
            ResourceSpec::RedisInstance(_) => "redis-instance",
            ResourceSpec::BigqueryDataset(_) => "bigquery-dataset",
            ResourceSpec::FirestoreDatabase(_) => "firestore-database",
            ResourceSpec::ServiceAccount(_) => "service-account",
        }
    }
}

impl Manifest {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Loading manifest");
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    /// Resource kinds in manifest order.
    ///
    /// Kinds that need credentials keep `secrets` and resolve them when a
    /// create request is built.
    pub fn build(&self, secrets: Arc<dyn SecretStore>) -> Vec<Box<dyn ResourceKind>> {
        let region = self.region.as_deref();
        self.resources
            .iter()
            .map(|spec| -> Box<dyn ResourceKind> {
                match spec {
                    ResourceSpec::CloudsqlInstance(c) => {
                        Box::new(CloudSqlInstance::new(&self.project, region, c.clone()))
                    }
                    ResourceSpec::CloudsqlUser(c) => {
                        Box::new(SqlUser::new(&self.project, c.clone(), secrets.clone()))
                    }
                    ResourceSpec::RedisInstance(c) => {
                        Box::new(RedisInstance::new(&self.project, region, c.clone()))
                    }
                    ResourceSpec::BigqueryDataset(c) => {
                        Box::new(BigQueryDataset::new(&self.project, c.clone()))
                    }
                    ResourceSpec::FirestoreDatabase(c) => {
                        Box::new(FirestoreDatabase::new(&self.project, region, c.clone()))
                    }
                    ResourceSpec::ServiceAccount(c) => {
                        Box::new(ServiceAccount::new(&self.project, c.clone()))
                    }
                }
            })
            .collect()
    }

    pub fn find(&self, name: &str) -> Option<&ResourceSpec> {
        self.resources.iter().find(|r| r.name() == name)
    }

    fn check(&self) -> Result<()> {
        if self.project.trim().is_empty() {
            return Err(GcpError::InvalidManifest("project is required".to_string()));
        }
        let mut seen = HashSet::new();
        for resource in &self.resources {
            if !seen.insert((resource.kind(), resource.name())) {
                return Err(GcpError::InvalidManifest(format!(
                    "duplicate resource {} '{}'",
                    resource.kind(),
                    resource.name()
                )));
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for Manifest {
    type Err = GcpError;

    fn from_str(content: &str) -> Result<Self> {
        let manifest: Manifest = serde_yaml::from_str(content)?;
        manifest.check()?;
        Ok(manifest)
    }
}
