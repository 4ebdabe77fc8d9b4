//! Planned actions for managed resources

use serde::{Deserialize, Serialize};

/// A planned change for one resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub action_type: ActionType,

    /// Resource kind (e.g. "cloudsql-instance")
    pub kind: String,

    pub name: String,

    pub description: String,
}

impl Action {
    pub fn new(
        action_type: ActionType,
        kind: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            action_type,
            kind: kind.into(),
            name: name.into(),
            description: description.into(),
        }
    }

    pub fn id(&self) -> String {
        format!("{}-{}:{}", self.action_type, self.kind, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Resource is absent and will be created
    Create,
    /// Resource exists remotely and will be adopted, never deleted by us
    Adopt,
    /// Resource exists and has updatable fields
    Update,
    Delete,
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Adopt => write!(f, "adopt"),
            ActionType::Update => write!(f, "update"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub actions: Vec<Action>,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    pub fn has_changes(&self) -> bool {
        self.actions
            .iter()
            .any(|a| a.action_type != ActionType::NoOp)
    }

    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            adopt: self.actions_by_type(ActionType::Adopt).len(),
            update: self.actions_by_type(ActionType::Update).len(),
            delete: self.actions_by_type(ActionType::Delete).len(),
            no_change: self.actions_by_type(ActionType::NoOp).len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub adopt: usize,
    pub update: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to adopt, {} to update, {} to delete, {} unchanged",
            self.create, self.adopt, self.update, self.delete, self.no_change
        )
    }
}
