//! Google Cloud provider error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GcpError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Cloud(#[from] stratum_core::CloudError),
}

pub type Result<T> = std::result::Result<T, GcpError>;
