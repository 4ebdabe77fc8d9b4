//! Manifest, state and secrets of one project directory

use crate::config;
use anyhow::{Context, bail};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stratum_core::{FileSecretStore, PollConfig, Reconciler, ResourceKind, StateFile, StateManager};
use stratum_gcp::{GcpClient, Manifest};

pub struct Project {
    pub manifest_path: PathBuf,
    pub manifest: Manifest,
    pub state: StateManager,
    pub secrets: Arc<FileSecretStore>,
}

impl Project {
    pub fn open(manifest: Option<&Path>, project_root: Option<&Path>) -> anyhow::Result<Self> {
        let root = config::project_root(project_root)?;
        let manifest_path = config::find_manifest(manifest, &root)?;
        let manifest = Manifest::load(&manifest_path)
            .with_context(|| format!("failed to load {}", manifest_path.display()))?;

        tracing::debug!(
            manifest = %manifest_path.display(),
            root = %root.display(),
            resources = manifest.resources.len(),
            "Project loaded"
        );

        let state = StateManager::new(&root);
        let secrets = Arc::new(FileSecretStore::new(state.state_dir()));
        Ok(Self {
            manifest_path,
            manifest,
            state,
            secrets,
        })
    }

    /// Manifest resources in order, optionally narrowed to one
    pub fn resources(&self, only: Option<&str>) -> anyhow::Result<Vec<Box<dyn ResourceKind>>> {
        let resources = self.manifest.build(self.secrets.clone());
        let Some(selector) = only else {
            return Ok(resources);
        };

        let selected: Vec<_> = resources
            .into_iter()
            .filter(|r| matches_selector(r.as_ref(), selector))
            .collect();
        match selected.len() {
            0 => bail!("no resource '{}' in {}", selector, self.manifest_path.display()),
            1 => Ok(selected),
            _ => bail!("'{}' is ambiguous; use kind:name", selector),
        }
    }

    pub fn reconciler(&self, poll: PollConfig) -> anyhow::Result<Reconciler> {
        let client = GcpClient::from_env()?;
        Ok(Reconciler::new(Arc::new(client)).with_poll_config(poll))
    }

    pub async fn load_state(&self) -> anyhow::Result<StateFile> {
        Ok(self.state.load().await?)
    }
}

fn matches_selector(resource: &dyn ResourceKind, selector: &str) -> bool {
    match selector.split_once(':') {
        Some((kind, name)) => resource.kind() == kind && resource.name() == name,
        None => resource.name() == selector,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
project: acme
region: us-central1
resources:
  - kind: bigquery-dataset
    name: shared
  - kind: service-account
    name: shared
  - kind: redis-instance
    name: cache
"#;

    fn project(dir: &TempDir) -> Project {
        fs::write(dir.path().join("stratum.yaml"), MANIFEST).unwrap();
        Project::open(None, Some(dir.path())).unwrap()
    }

    #[test]
    fn test_open_uses_project_root() {
        let dir = TempDir::new().unwrap();
        let project = project(&dir);
        assert_eq!(project.manifest.project, "acme");
        assert_eq!(project.state.state_dir(), dir.path().join(".stratum"));
    }

    #[test]
    fn test_building_resources_writes_no_secrets() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("stratum.yaml"),
            "project: acme\nresources:\n  - kind: cloudsql-user\n    name: app\n    instance: orders-db\n",
        )
        .unwrap();
        let project = Project::open(None, Some(dir.path())).unwrap();

        assert_eq!(project.resources(None).unwrap().len(), 1);
        assert!(!dir.path().join(".stratum/secrets.json").exists());
    }

    #[test]
    fn test_selector() {
        let dir = TempDir::new().unwrap();
        let project = project(&dir);

        assert_eq!(project.resources(None).unwrap().len(), 3);
        assert_eq!(project.resources(Some("cache")).unwrap()[0].kind(), "redis-instance");
        assert_eq!(
            project.resources(Some("service-account:shared")).unwrap()[0].kind(),
            "service-account"
        );

        let err = project.resources(Some("shared")).err().unwrap();
        assert!(err.to_string().contains("ambiguous"));
        assert!(project.resources(Some("missing")).is_err());
    }
}
