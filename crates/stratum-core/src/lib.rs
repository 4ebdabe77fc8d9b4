//! Stratum reconciliation core
//!
//! Converges remote cloud resources to a desired configuration: adopt what
//! already exists, create what does not, and follow provider-side
//! asynchronous operations until they finish or fail.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  stratum CLI                     │
//! │           (plan / apply / check / delete)        │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 stratum-core                     │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  Reconciler  (probe → create|adopt →      │   │
//! │  │              poll → populate → ready)     │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────────┐     │
//! │  │Normalizer│ │  Poller  │ │ State / Lock │     │
//! │  └──────────┘ └──────────┘ └──────────────┘     │
//! └───────┬─────────────────────────────────────────┘
//!         │ trait Transport / trait ResourceKind
//! ┌───────▼───────┐
//! │  stratum-gcp  │
//! └───────────────┘
//! ```

pub mod action;
pub mod error;
pub mod normalize;
pub mod operation;
pub mod plan;
pub mod poller;
pub mod probe;
pub mod reconciler;
pub mod resource;
pub mod secret;
pub mod state;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-exports
pub use action::{ActionArgs, ActionContext, parse_args, required_arg};
pub use error::{CloudError, Result};
pub use normalize::normalize;
pub use operation::{Operation, OperationShape, OperationState, is_operation_done, is_operation_failed};
pub use plan::{Action, ActionType, Plan, PlanSummary};
pub use poller::{PollConfig, check_operation, wait_for};
pub use probe::probe;
pub use reconciler::{DeleteOutcome, ReconciliationOutcome, Reconciler};
pub use resource::{Readiness, ResourceKind};
pub use secret::{FileSecretStore, MemorySecretStore, SecretStore, ensure_secret, rand_string};
pub use state::{ObservedState, Phase, StateFile, StateLock, StateManager};
pub use transport::{HttpRequest, HttpResponse, Method, Transport};
