use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct TestProject {
    pub root: TempDir,
    config_home: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
            config_home: tempfile::tempdir().unwrap(),
        }
    }

    pub fn write_manifest(&self, content: &str) {
        fs::write(self.root.path().join("stratum.yaml"), content).unwrap();
    }

    #[allow(dead_code)]
    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    #[allow(dead_code)]
    pub fn state_json(&self) -> serde_json::Value {
        let content = fs::read_to_string(self.root.path().join(".stratum/state.json")).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    /// `stratum` running in the project with a fake token and no poll delay
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("stratum").unwrap();
        cmd.current_dir(self.root.path())
            .env("STRATUM_ACCESS_TOKEN", "test-token")
            .env("STRATUM_POLL_DELAY_SECS", "0")
            .env("XDG_CONFIG_HOME", self.config_home.path())
            .env_remove("STRATUM_MANIFEST")
            .env_remove("RUST_LOG");
        cmd
    }
}

#[allow(dead_code)]
pub fn manifest_with_endpoint(endpoint: &str, resources: &str) -> String {
    format!(
        "project: acme\nregion: us-central1\nresources:\n{}",
        resources.replace("{endpoint}", endpoint)
    )
}
