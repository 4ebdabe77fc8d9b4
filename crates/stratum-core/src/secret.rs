//! Secret storage for provisioned credentials
//!
//! Password-bearing resources read an existing secret first and only
//! generate one when none is stored. Values are never logged.

use crate::error::{CloudError, Result};
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const SECRETS_FILE: &str = "secrets.json";

pub trait SecretStore: Send + Sync {
    /// Stored value; errors when absent
    fn get(&self, name: &str) -> Result<String>;

    fn set(&self, name: &str, value: &str) -> Result<()>;

    fn remove(&self, name: &str) -> Result<()>;
}

/// Random alphanumeric string
pub fn rand_string(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Return the stored secret, generating and storing one if reading fails
pub fn ensure_secret(store: &dyn SecretStore, name: &str, length: usize) -> Result<String> {
    match store.get(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => {
            tracing::info!(secret = %name, "Generating new secret");
            let value = rand_string(length);
            store.set(name, &value)?;
            Ok(value)
        }
    }
}

/// Secrets kept in `<dir>/secrets.json`
pub struct FileSecretStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileSecretStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(SECRETS_FILE),
            guard: Mutex::new(()),
        }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&content)
            .map_err(|e| CloudError::Secret(format!("{}: {}", self.path.display(), e)))
    }

    fn write_all(&self, secrets: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(secrets)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn with_lock<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| CloudError::Secret("secret store lock poisoned".to_string()))?;
        f()
    }
}

impl SecretStore for FileSecretStore {
    fn get(&self, name: &str) -> Result<String> {
        self.with_lock(|| {
            self.read_all()?
                .remove(name)
                .ok_or_else(|| CloudError::Secret(format!("secret '{}' not found", name)))
        })
    }

    fn set(&self, name: &str, value: &str) -> Result<()> {
        self.with_lock(|| {
            let mut secrets = self.read_all()?;
            secrets.insert(name.to_string(), value.to_string());
            self.write_all(&secrets)
        })
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.with_lock(|| {
            let mut secrets = self.read_all()?;
            if secrets.remove(name).is_some() {
                self.write_all(&secrets)?;
            }
            Ok(())
        })
    }
}

/// In-process store
#[derive(Default)]
pub struct MemorySecretStore {
    secrets: Mutex<BTreeMap<String, String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.secrets
            .lock()
            .map_err(|_| CloudError::Secret("secret store lock poisoned".to_string()))
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, name: &str) -> Result<String> {
        self.lock()?
            .get(name)
            .cloned()
            .ok_or_else(|| CloudError::Secret(format!("secret '{}' not found", name)))
    }

    fn set(&self, name: &str, value: &str) -> Result<()> {
        self.lock()?.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.lock()?.remove(name);
        Ok(())
    }
}
