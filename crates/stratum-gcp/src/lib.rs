//! Google Cloud provider for Stratum
//!
//! Resource kinds for the reconciliation core plus a reqwest-backed
//! [`Transport`](stratum_core::Transport).
//!
//! # Requirements
//!
//! - `STRATUM_ACCESS_TOKEN` (or `GOOGLE_OAUTH_ACCESS_TOKEN`), e.g. from
//!   `gcloud auth print-access-token`
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use stratum_core::{MemorySecretStore, Reconciler};
//! use stratum_gcp::{GcpClient, Manifest};
//!
//! let manifest = Manifest::load("stratum.yaml")?;
//! let reconciler = Reconciler::new(Arc::new(GcpClient::from_env()?));
//!
//! for resource in manifest.build(Arc::new(MemorySecretStore::new())) {
//!     let mut state = Default::default();
//!     let outcome = reconciler.converge(resource.as_ref(), &mut state).await?;
//!     println!("{}: {}", resource.name(), outcome);
//! }
//! ```

pub mod bigquery;
pub mod client;
pub mod error;
pub mod firestore;
pub mod manifest;
pub mod names;
pub mod redis;
pub mod service_account;
pub mod sql;
pub mod sql_user;

pub use bigquery::{BigQueryDataset, DatasetConfig};
pub use client::{GcpClient, GcpConfig};
pub use error::{GcpError, Result};
pub use firestore::{FirestoreConfig, FirestoreDatabase};
pub use manifest::{Manifest, ResourceSpec};
pub use redis::{RedisConfig, RedisInstance};
pub use service_account::{ServiceAccount, ServiceAccountConfig};
pub use sql::{CloudSqlInstance, SqlInstanceConfig};
pub use sql_user::{SqlUser, SqlUserConfig};
