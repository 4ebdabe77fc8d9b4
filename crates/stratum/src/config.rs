//! Manifest discovery

use anyhow::{Context, bail};
use std::path::{Path, PathBuf};

const CANDIDATES: &[&str] = &["stratum.local.yaml", "stratum.yaml"];

/// Locate the manifest.
///
/// Precedence:
/// 1. `explicit` (`--manifest` / `STRATUM_MANIFEST`)
/// 2. `stratum.local.yaml`, `stratum.yaml` in `dir`
/// 3. the same names under `dir/.stratum/`
/// 4. `<config_dir>/stratum/stratum.yaml`
pub fn find_manifest(explicit: Option<&Path>, dir: &Path) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        bail!("manifest not found: {}", path.display());
    }

    for base in [dir.to_path_buf(), dir.join(stratum_core::state::STATE_DIR)] {
        for name in CANDIDATES {
            let path = base.join(name);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("stratum").join("stratum.yaml");
        if global.exists() {
            return Ok(global);
        }
    }

    bail!(
        "no manifest found in {} (looked for {})",
        dir.display(),
        CANDIDATES.join(", ")
    )
}

/// Directory holding `.stratum/`: the explicit root, or the current directory
pub fn project_root(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(root) => Ok(root.to_path_buf()),
        None => std::env::current_dir().context("cannot determine current directory"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_path_wins() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("stratum.yaml"), "project: a").unwrap();
        let other = dir.path().join("other.yaml");
        fs::write(&other, "project: b").unwrap();

        assert_eq!(find_manifest(Some(&other), dir.path()).unwrap(), other);
        assert!(find_manifest(Some(&dir.path().join("missing.yaml")), dir.path()).is_err());
    }

    #[test]
    fn test_local_override_before_base() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("stratum.yaml"), "project: a").unwrap();
        assert_eq!(
            find_manifest(None, dir.path()).unwrap(),
            dir.path().join("stratum.yaml")
        );

        fs::write(dir.path().join("stratum.local.yaml"), "project: a").unwrap();
        assert_eq!(
            find_manifest(None, dir.path()).unwrap(),
            dir.path().join("stratum.local.yaml")
        );
    }

    #[test]
    fn test_state_dir_fallback() {
        let dir = TempDir::new().unwrap();
        let hidden = dir.path().join(".stratum");
        fs::create_dir(&hidden).unwrap();
        fs::write(hidden.join("stratum.yaml"), "project: a").unwrap();

        assert_eq!(find_manifest(None, dir.path()).unwrap(), hidden.join("stratum.yaml"));
    }

    #[test]
    fn test_global_config_fallback() {
        let dir = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let global = home.path().join("stratum");
        fs::create_dir_all(&global).unwrap();
        fs::write(global.join("stratum.yaml"), "project: a").unwrap();

        // dirs::config_dir honours XDG_CONFIG_HOME on Linux
        temp_env::with_var("XDG_CONFIG_HOME", Some(home.path()), || {
            if cfg!(target_os = "linux") {
                assert_eq!(
                    find_manifest(None, dir.path()).unwrap(),
                    global.join("stratum.yaml")
                );
            }
        });
    }

    #[test]
    fn test_nothing_found() {
        let dir = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        temp_env::with_var("XDG_CONFIG_HOME", Some(home.path()), || {
            if cfg!(target_os = "linux") {
                let err = find_manifest(None, dir.path()).unwrap_err();
                assert!(err.to_string().contains("no manifest found"));
            }
        });
    }
}
