//! Workflow definitions, instances and history

use chrono::{DateTime, Utc};
use contractflow_authz::ConditionSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Action a reviewer can take on a workflow step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    Approve,
    Reject,
    RequestChanges,
    Assign,
    Comment,
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepAction::Approve => "approve",
            StepAction::Reject => "reject",
            StepAction::RequestChanges => "request_changes",
            StepAction::Assign => "assign",
            StepAction::Comment => "comment",
        };
        write!(f, "{s}")
    }
}

/// Which actions a step accepts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedActions {
    #[serde(default)]
    pub approve: bool,
    #[serde(default)]
    pub reject: bool,
    #[serde(default)]
    pub request_changes: bool,
    #[serde(default)]
    pub assign: bool,
    #[serde(default)]
    pub comment: bool,
}

impl AllowedActions {
    /// approve + reject + request_changes + comment; the usual review step
    pub fn review() -> Self {
        Self {
            approve: true,
            reject: true,
            request_changes: true,
            assign: false,
            comment: true,
        }
    }

    /// Everything allowed
    pub fn all() -> Self {
        Self {
            approve: true,
            reject: true,
            request_changes: true,
            assign: true,
            comment: true,
        }
    }

    pub fn permits(&self, action: StepAction) -> bool {
        match action {
            StepAction::Approve => self.approve,
            StepAction::Reject => self.reject,
            StepAction::RequestChanges => self.request_changes,
            StepAction::Assign => self.assign,
            StepAction::Comment => self.comment,
        }
    }
}

/// One step in a workflow template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStepDefinition {
    /// Step identifier, unique within the workflow
    pub id: String,

    /// Human-readable step name
    pub name: String,

    /// Role the acting subject must hold
    pub required_role: String,

    /// "resource:action" pairs that must ALL pass the permission
    /// evaluator (conjunction, unlike the single-condition-wins rule
    /// inside one permission)
    #[serde(default)]
    pub required_permissions: Vec<String>,

    /// Optional extra condition evaluated against the step context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionSet>,

    /// Actions this step accepts
    pub allowed_actions: AllowedActions,

    /// Expected effort, feeds the progress estimate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,

    /// Step may be skipped by configuration
    #[serde(default)]
    pub optional: bool,

    /// Step may be skipped at runtime
    #[serde(default)]
    pub skippable: bool,
}

impl WorkflowStepDefinition {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        required_role: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            required_role: required_role.into(),
            required_permissions: Vec::new(),
            condition: None,
            allowed_actions: AllowedActions::review(),
            estimated_hours: None,
            optional: false,
            skippable: false,
        }
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.required_permissions.push(permission.into());
        self
    }

    pub fn with_condition(mut self, condition: ConditionSet) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_allowed_actions(mut self, allowed: AllowedActions) -> Self {
        self.allowed_actions = allowed;
        self
    }

    pub fn with_estimated_hours(mut self, hours: f64) -> Self {
        self.estimated_hours = Some(hours);
        self
    }
}

/// An ordered approval template for one document type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Workflow identifier (e.g., "employment_contract")
    pub id: String,

    /// Document type this workflow applies to
    pub document_type: String,

    /// Steps in execution order; the index is the sequence number
    pub steps: Vec<WorkflowStepDefinition>,

    /// Hard deadline for the whole workflow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_duration_days: Option<u32>,

    /// Whether an external scheduler should escalate overdue instances
    #[serde(default)]
    pub auto_escalate: bool,

    /// Hours before an overdue instance becomes eligible for escalation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation_hours: Option<u32>,
}

impl WorkflowDefinition {
    pub fn new(id: impl Into<String>, document_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            document_type: document_type.into(),
            steps: Vec::new(),
            max_duration_days: None,
            auto_escalate: false,
            escalation_hours: None,
        }
    }

    pub fn with_step(mut self, step: WorkflowStepDefinition) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_max_duration_days(mut self, days: u32) -> Self {
        self.max_duration_days = Some(days);
        self
    }

    pub fn with_escalation(mut self, hours: u32) -> Self {
        self.auto_escalate = true;
        self.escalation_hours = Some(hours);
        self
    }

    /// Step at a sequence position, if any
    pub fn step_at(&self, index: usize) -> Option<&WorkflowStepDefinition> {
        self.steps.get(index)
    }
}

/// Lifecycle state of a workflow instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Active,
    Completed,
    Cancelled,
    Escalated,
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstanceStatus::Active => "active",
            InstanceStatus::Completed => "completed",
            InstanceStatus::Cancelled => "cancelled",
            InstanceStatus::Escalated => "escalated",
        };
        write!(f, "{s}")
    }
}

/// One append-only history record per executed action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepHistoryEntry {
    pub step_id: String,
    pub step_name: String,
    pub actor_id: String,
    pub actor_name: String,
    pub action: StepAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// One in-flight execution of a workflow definition, bound to a document.
///
/// Invariants: `current_step_index` stays within `0..=steps.len()`;
/// once the status is Completed or Cancelled the instance is terminal
/// and accepts no further transitions. Instances are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: String,
    pub document_id: String,
    pub workflow_id: String,
    pub current_step_index: usize,
    pub status: InstanceStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub history: Vec<StepHistoryEntry>,
}

impl WorkflowInstance {
    pub fn new(document_id: impl Into<String>, workflow_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.into(),
            workflow_id: workflow_id.into(),
            current_step_index: 0,
            status: InstanceStatus::Active,
            started_at: Utc::now(),
            completed_at: None,
            history: Vec::new(),
        }
    }

    /// Completed and Cancelled instances accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            InstanceStatus::Completed | InstanceStatus::Cancelled
        )
    }
}

/// The acting identity, as supplied by the identity boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Actor used for scheduler-driven transitions
    pub fn scheduler() -> Self {
        Self::new("system:scheduler", "Escalation scheduler")
    }
}
