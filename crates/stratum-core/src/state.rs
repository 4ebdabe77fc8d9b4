//! Observed state of managed resources
//!
//! [`ObservedState`] is the per-resource record the reconciler mutates.
//! [`StateManager`] persists all of them in `.stratum/state.json` between
//! passes.

use crate::error::{CloudError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

const STATE_VERSION: u32 = 1;
pub const STATE_DIR: &str = ".stratum";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const LOCK_FILE: &str = "lock.json";
/// Terminal operation names remembered per resource
const FINISHED_OPERATIONS_KEPT: usize = 16;

/// Where a resource is in the reconciliation state machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Unprobed,
    Adopted,
    Creating,
    OperationPending,
    Ready,
    Failed,
    Deleting,
    Deleted,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Unprobed => "unprobed",
            Phase::Adopted => "adopted",
            Phase::Creating => "creating",
            Phase::OperationPending => "operation_pending",
            Phase::Ready => "ready",
            Phase::Failed => "failed",
            Phase::Deleting => "deleting",
            Phase::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// Mutable record of what the reconciler has seen for one resource
///
/// `existing` only changes through [`mark_adopted`](Self::mark_adopted) and
/// [`mark_created`](Self::mark_created). `operation_name` only through
/// [`begin_operation`](Self::begin_operation) and
/// [`finish_operation`](Self::finish_operation).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedState {
    #[serde(default)]
    existing: bool,

    #[serde(default, alias = "operationRef", skip_serializing_if = "Option::is_none")]
    operation_name: Option<String>,

    /// Operations already observed terminal
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    finished_operations: Vec<String>,

    #[serde(default)]
    pub phase: Phase,

    /// Resource-specific identifying fields, opaque to the core
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ObservedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the resource pre-existed and was adopted
    pub fn existing(&self) -> bool {
        self.existing
    }

    /// True once this state has adopted or created the resource and not
    /// yet seen it deleted
    pub fn is_tracked(&self) -> bool {
        !matches!(self.phase, Phase::Unprobed | Phase::Deleted)
    }

    /// In-flight operation, if any
    pub fn operation_ref(&self) -> Option<&str> {
        self.operation_name.as_deref()
    }

    /// Record adoption of a pre-existing resource. Only a state that has not
    /// seen the resource yet (or saw it deleted) adopts; a resource this state
    /// already created or adopted keeps its flag and phase.
    pub fn mark_adopted(&mut self) -> bool {
        let fresh = matches!(self.phase, Phase::Unprobed | Phase::Deleted);
        if fresh {
            self.existing = true;
            self.phase = Phase::Adopted;
        }
        self.touch();
        fresh
    }

    /// Record a fresh creation. Resets everything left from a previous life.
    pub fn mark_created(&mut self) {
        self.existing = false;
        self.operation_name = None;
        self.attributes.clear();
        self.last_error = None;
        self.phase = Phase::Creating;
        self.touch();
    }

    /// Start tracking an operation. Rejects names already observed terminal.
    pub fn begin_operation(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if self.finished_operations.contains(&name) {
            return Err(CloudError::State(format!(
                "operation {} has already finished and cannot be tracked again",
                name
            )));
        }
        if let Some(current) = &self.operation_name {
            tracing::warn!(current = %current, next = %name, "Replacing pending operation");
        }
        self.operation_name = Some(name);
        self.phase = Phase::OperationPending;
        self.touch();
        Ok(())
    }

    /// Stop tracking the current operation, returning its name
    pub fn finish_operation(&mut self) -> Option<String> {
        let name = self.operation_name.take();
        if let Some(name) = &name {
            self.finished_operations.push(name.clone());
            let excess = self.finished_operations.len().saturating_sub(FINISHED_OPERATIONS_KEPT);
            self.finished_operations.drain(..excess);
        }
        self.touch();
        name
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
        self.touch();
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.phase = Phase::Failed;
        self.last_error = Some(message.into());
        self.touch();
    }

    /// Clear resource fields after a successful delete
    pub fn mark_deleted(&mut self) {
        self.existing = false;
        self.operation_name = None;
        self.finished_operations.clear();
        self.attributes.clear();
        self.last_error = None;
        self.phase = Phase::Deleted;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

/// Contents of the state file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,

    pub updated_at: DateTime<Utc>,

    /// Observed states keyed by `kind:name`
    pub resources: BTreeMap<String, ObservedState>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

impl StateFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(kind: &str, name: &str) -> String {
        format!("{}:{}", kind, name)
    }

    /// Observed state for a resource, empty if never seen
    pub fn resource(&self, kind: &str, name: &str) -> ObservedState {
        self.resources
            .get(&Self::key(kind, name))
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_resource(&mut self, kind: &str, name: &str, state: ObservedState) {
        self.resources.insert(Self::key(kind, name), state);
        self.updated_at = Utc::now();
    }

    pub fn remove_resource(&mut self, kind: &str, name: &str) -> Option<ObservedState> {
        let result = self.resources.remove(&Self::key(kind, name));
        if result.is_some() {
            self.updated_at = Utc::now();
        }
        result
    }
}

/// Reads and writes the state file under a project root
pub struct StateManager {
    project_root: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.project_root.join(STATE_DIR)
    }

    fn state_path(&self) -> PathBuf {
        self.state_dir().join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir().join(STATE_BACKUP)
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir().join(LOCK_FILE)
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    pub async fn load(&self) -> Result<StateFile> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("State file not found, returning empty state");
            return Ok(StateFile::new());
        }

        let content = fs::read_to_string(&path).await?;
        let state: StateFile = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(CloudError::State(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!("Loaded state with {} resources", state.resources.len());
        Ok(state)
    }

    /// Write the state, keeping the previous file as a backup
    pub async fn save(&self, state: &StateFile) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let backup = self.backup_path();

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
        }

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&path, content).await?;

        tracing::debug!("Saved state with {} resources", state.resources.len());
        Ok(())
    }

    /// Take the exclusive state lock. Locks older than an hour are stale.
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();

        if lock_path.exists() {
            let content = fs::read_to_string(&lock_path).await?;
            let lock_info: LockInfo = serde_json::from_str(&content)?;

            let age = Utc::now().signed_duration_since(lock_info.acquired_at);
            if age.num_hours() < 1 {
                return Err(CloudError::Lock(format!(
                    "State is locked by {} (pid {}) since {}",
                    lock_info.holder, lock_info.pid, lock_info.acquired_at
                )));
            }

            tracing::warn!("Removing stale lock from {}", lock_info.holder);
        }

        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };

        let content = serde_json::to_string_pretty(&lock_info)?;
        fs::write(&lock_path, content).await?;

        tracing::debug!("Acquired state lock");
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    #[serde(default)]
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for the state lock
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
