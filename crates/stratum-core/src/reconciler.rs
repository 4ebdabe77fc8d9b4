//! Reconciliation state machine
//!
//! ```text
//! UNPROBED ──probe hit──▶ ADOPTED
//!    │
//!    └─probe miss─▶ CREATING ──sync──▶ READY
//!                      │
//!                      └─operation─▶ OPERATION_PENDING ──done──▶ READY
//!                                          │
//!                                          └─error──▶ FAILED
//! any ──▶ DELETING ──▶ DELETED   (skipped for adopted resources)
//! ```
//!
//! Every call within a pass is awaited before the next one is issued; the
//! reconciler never runs two requests for the same resource at once.

use crate::error::{CloudError, Result};
use crate::normalize::normalize;
use crate::operation::OperationState;
use crate::plan::{Action, ActionType};
use crate::poller::{PollConfig, check_operation, wait_for};
use crate::probe::probe;
use crate::resource::{Readiness, ResourceKind};
use crate::state::{ObservedState, Phase};
use crate::transport::{HttpRequest, Transport};
use serde_json::Value;
use std::sync::Arc;

/// Result of a reconciliation attempt. Fatal conditions are `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    Ready,
    /// Retry later
    NotReady { reason: String },
}

impl ReconciliationOutcome {
    pub fn not_ready(reason: impl Into<String>) -> Self {
        Self::NotReady {
            reason: reason.into(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl std::fmt::Display for ReconciliationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::NotReady { reason } => write!(f, "not ready: {}", reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The provider reported the resource gone already
    AlreadyGone,
    /// Adopted resources are never deleted
    SkippedAdopted,
    /// No record of this state creating the resource
    NotTracked,
}

/// Drives resources through the state machine against one transport
pub struct Reconciler {
    transport: Arc<dyn Transport>,
    poll: PollConfig,
}

impl Reconciler {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            poll: PollConfig::default(),
        }
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn poll_config(&self) -> PollConfig {
        self.poll
    }

    async fn send(&self, request: HttpRequest) -> Result<Value> {
        let method = request.method;
        let url = request.url.clone();
        tracing::debug!(method = %method, url = %url, "Sending request");
        let response = self.transport.send(request).await;
        normalize(self.transport.label(), method, &url, &response)
    }

    /// Adopt the resource if it exists, otherwise create it.
    ///
    /// Adoption makes no further API calls. An asynchronous creation stores
    /// the operation reference and returns not-ready; call
    /// [`check_readiness`](Self::check_readiness) later. While an operation
    /// is pending no request is made at all.
    pub async fn create(
        &self,
        resource: &dyn ResourceKind,
        state: &mut ObservedState,
    ) -> Result<ReconciliationOutcome> {
        resource.validate()?;

        // an interrupted pass left an operation behind; never submit a second create
        if let Some(operation) = state.operation_ref() {
            return Ok(ReconciliationOutcome::not_ready(format!(
                "operation {} in progress",
                operation
            )));
        }

        let probe_url = resource.probe_url();
        if let Some(body) = probe(self.transport(), &probe_url).await {
            if state.mark_adopted() {
                tracing::info!(kind = resource.kind(), resource = resource.name(), "Adopted existing resource");
            } else {
                tracing::debug!(kind = resource.kind(), resource = resource.name(), "Resource already tracked");
            }
            resource.populate_state(&body, state);
            return Ok(self.apply_readiness(resource, &body, state));
        }

        let request = resource.create_request()?;
        state.mark_created();
        tracing::info!(kind = resource.kind(), resource = resource.name(), url = %request.url, "Creating resource");

        let response = match self.send(request).await {
            Ok(response) => response,
            Err(e) => {
                state.fail(e.to_string());
                return Err(e);
            }
        };

        self.after_mutation(resource, &response, state)
    }

    /// Follow up on a pending operation, or re-probe the resource.
    ///
    /// Performs a single operation check rather than a blocking wait. A
    /// failed operation is cleared, recorded and surfaced once.
    pub async fn check_readiness(
        &self,
        resource: &dyn ResourceKind,
        state: &mut ObservedState,
    ) -> Result<ReconciliationOutcome> {
        if let Some(operation_ref) = state.operation_ref().map(str::to_string) {
            let url = resource.operation_url(&operation_ref);
            let operation = check_operation(self.transport(), &url).await?;

            match operation.state() {
                OperationState::Running => {
                    tracing::debug!(resource = resource.name(), operation = %operation_ref, "Operation still running");
                    return Ok(ReconciliationOutcome::not_ready(format!(
                        "operation {} still running",
                        operation_ref
                    )));
                }
                OperationState::Failed { message } => {
                    return Err(self.operation_failed(resource, state, operation_ref, message));
                }
                OperationState::Succeeded => {
                    state.finish_operation();
                    tracing::info!(resource = resource.name(), operation = %operation_ref, "Operation completed");
                }
            }
        }

        match probe(self.transport(), &resource.probe_url()).await {
            Some(body) => {
                resource.populate_state(&body, state);
                Ok(self.apply_readiness(resource, &body, state))
            }
            None => Ok(ReconciliationOutcome::not_ready("resource not found")),
        }
    }

    /// Create or adopt, then block on any pending operation until the
    /// resource is ready or the poll budget runs out.
    pub async fn converge(
        &self,
        resource: &dyn ResourceKind,
        state: &mut ObservedState,
    ) -> Result<ReconciliationOutcome> {
        let outcome = self.create(resource, state).await?;
        self.wait_pending(resource, state).await?;
        if state.operation_ref().is_none() && outcome.is_ready() {
            return Ok(outcome);
        }
        self.check_readiness(resource, state).await
    }

    /// Bring an existing resource in line with its desired configuration
    pub async fn update(
        &self,
        resource: &dyn ResourceKind,
        state: &mut ObservedState,
    ) -> Result<ReconciliationOutcome> {
        resource.validate()?;

        if let Some(operation) = state.operation_ref() {
            return Ok(ReconciliationOutcome::not_ready(format!(
                "operation {} still pending",
                operation
            )));
        }

        let Some(request) = resource.update_request(state)? else {
            tracing::debug!(resource = resource.name(), "No updatable fields");
            return Ok(ReconciliationOutcome::Ready);
        };

        tracing::info!(kind = resource.kind(), resource = resource.name(), url = %request.url, "Updating resource");
        let response = match self.send(request).await {
            Ok(response) => response,
            Err(e) => {
                state.fail(e.to_string());
                return Err(e);
            }
        };

        self.after_mutation(resource, &response, state)
    }

    /// Delete the resource if this state created it.
    ///
    /// Adopted resources and states that never saw a creation are left
    /// alone without a request. A 404 counts as success. If the provider
    /// answers with an operation the call blocks until it finishes.
    pub async fn delete(
        &self,
        resource: &dyn ResourceKind,
        state: &mut ObservedState,
    ) -> Result<DeleteOutcome> {
        if state.existing() {
            tracing::warn!(kind = resource.kind(), resource = resource.name(), "Resource was adopted, skipping delete");
            return Ok(DeleteOutcome::SkippedAdopted);
        }
        if !state.is_tracked() {
            tracing::warn!(kind = resource.kind(), resource = resource.name(), phase = %state.phase, "Resource not created by stratum, skipping delete");
            return Ok(DeleteOutcome::NotTracked);
        }

        state.phase = Phase::Deleting;
        let request = resource.delete_request(state);
        tracing::info!(kind = resource.kind(), resource = resource.name(), url = %request.url, "Deleting resource");

        let response = match self.send(request).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => {
                tracing::warn!(resource = resource.name(), "Resource already gone");
                state.mark_deleted();
                return Ok(DeleteOutcome::AlreadyGone);
            }
            Err(e) => {
                state.fail(e.to_string());
                return Err(e);
            }
        };

        if let Some(operation_ref) = resource.operation_ref(&response) {
            state.begin_operation(&operation_ref)?;
            self.wait_pending(resource, state).await?;
        }

        state.mark_deleted();
        Ok(DeleteOutcome::Deleted)
    }

    /// Describe what [`create`](Self::create) or [`update`](Self::update)
    /// would do. Only issues GETs.
    pub async fn plan(&self, resource: &dyn ResourceKind, state: &ObservedState) -> Result<Action> {
        resource.validate()?;
        let (kind, name) = (resource.kind(), resource.name());

        if let Some(operation) = state.operation_ref() {
            return Ok(Action::new(
                ActionType::NoOp,
                kind,
                name,
                format!("waiting for operation {}", operation),
            ));
        }

        let action = match probe(self.transport(), &resource.probe_url()).await {
            None => Action::new(ActionType::Create, kind, name, format!("create {} {}", kind, name)),
            Some(_) if matches!(state.phase, Phase::Unprobed | Phase::Deleted) => Action::new(
                ActionType::Adopt,
                kind,
                name,
                format!("adopt existing {} {}", kind, name),
            ),
            Some(_) if resource.update_request(state)?.is_some() => Action::new(
                ActionType::Update,
                kind,
                name,
                format!("update {} {}", kind, name),
            ),
            Some(_) => Action::new(ActionType::NoOp, kind, name, "up to date"),
        };
        Ok(action)
    }

    /// Describe what [`delete`](Self::delete) would do. No API calls.
    pub fn plan_delete(&self, resource: &dyn ResourceKind, state: &ObservedState) -> Action {
        let (kind, name) = (resource.kind(), resource.name());
        if state.existing() {
            Action::new(ActionType::NoOp, kind, name, "adopted, will not be deleted")
        } else if state.phase == Phase::Deleted {
            Action::new(ActionType::NoOp, kind, name, "already deleted")
        } else if !state.is_tracked() {
            Action::new(ActionType::NoOp, kind, name, "not tracked, will not be deleted")
        } else {
            Action::new(ActionType::Delete, kind, name, format!("delete {} {}", kind, name))
        }
    }

    fn after_mutation(
        &self,
        resource: &dyn ResourceKind,
        response: &Value,
        state: &mut ObservedState,
    ) -> Result<ReconciliationOutcome> {
        if let Some(operation_ref) = resource.operation_ref(response) {
            state.begin_operation(&operation_ref)?;
            tracing::info!(resource = resource.name(), operation = %operation_ref, "Operation submitted");
            return Ok(ReconciliationOutcome::not_ready(format!(
                "operation {} in progress",
                operation_ref
            )));
        }

        resource.populate_state(response, state);
        Ok(self.apply_readiness(resource, response, state))
    }

    fn apply_readiness(
        &self,
        resource: &dyn ResourceKind,
        body: &Value,
        state: &mut ObservedState,
    ) -> ReconciliationOutcome {
        match resource.readiness(body) {
            Readiness::Ready => {
                state.phase = Phase::Ready;
                ReconciliationOutcome::Ready
            }
            Readiness::NotReady(reason) => ReconciliationOutcome::NotReady { reason },
        }
    }

    /// Blocking wait on the pending operation, if any
    async fn wait_pending(&self, resource: &dyn ResourceKind, state: &mut ObservedState) -> Result<()> {
        let Some(operation_ref) = state.operation_ref().map(str::to_string) else {
            return Ok(());
        };

        let url = resource.operation_url(&operation_ref);
        match wait_for(self.transport(), &url, &self.poll).await {
            Ok(_) => {
                state.finish_operation();
                tracing::info!(resource = resource.name(), operation = %operation_ref, "Operation completed");
                Ok(())
            }
            Err(CloudError::OperationFailed { message, .. }) => {
                Err(self.operation_failed(resource, state, operation_ref, message))
            }
            // timeouts keep the reference so the next pass re-polls it
            Err(e) => Err(e),
        }
    }

    fn operation_failed(
        &self,
        resource: &dyn ResourceKind,
        state: &mut ObservedState,
        operation: String,
        message: String,
    ) -> CloudError {
        state.finish_operation();
        state.fail(message.clone());
        tracing::warn!(resource = resource.name(), operation = %operation, error = %message, "Operation failed");
        CloudError::OperationFailed { operation, message }
    }
}
