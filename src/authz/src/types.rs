//! Core permission and condition types

use serde::{Deserialize, Serialize};

/// Unique role identifier
pub type RoleId = String;

/// Subject (acting identity) identifier
pub type SubjectId = String;

/// A single permission: a resource/action pair, optionally narrowed by
/// a condition set.
///
/// Permissions only exist inside a [`Role`](crate::catalog::Role); they
/// are never granted directly to a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    /// Resource the permission governs (e.g., "contract"). `*` matches any.
    pub resource: String,

    /// Action the permission governs (e.g., "approve"). `*` matches any.
    pub action: String,

    /// Optional condition narrowing the permission to a context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionSet>,
}

impl Permission {
    /// Create an unconditional permission
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
            condition: None,
        }
    }

    /// Attach a condition set to the permission
    pub fn with_condition(mut self, condition: ConditionSet) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Check whether this permission covers the given resource/action pair
    pub fn grants(&self, resource: &str, action: &str) -> bool {
        Self::matches(&self.resource, resource) && Self::matches(&self.action, action)
    }

    fn matches(pattern: &str, value: &str) -> bool {
        pattern == "*" || pattern == value
    }
}

/// Inclusive amount range for amount-gated permissions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmountRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl AmountRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    /// Range with only an upper bound
    pub fn up_to(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

/// A condition set narrowing a permission to a context.
///
/// Evaluation is **single-condition-wins**: keys are checked in a fixed
/// order (owner, department, document_type, assigned, status, amount)
/// and the first populated key produces the decision. The remaining
/// keys are NOT conjoined. An empty set always evaluates true.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionSet {
    /// Subject must (or must not) be the owner of the resource
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<bool>,

    /// Resource must belong to this department
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,

    /// Resource's document type must be one of these
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub document_type: Option<Vec<String>>,

    /// Subject must (or must not) be assigned to the resource
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned: Option<bool>,

    /// Resource's status must be one of these
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Vec<String>>,

    /// Resource's monetary amount must fall inside this range
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<AmountRange>,
}

impl ConditionSet {
    pub fn owner() -> Self {
        Self {
            owner: Some(true),
            ..Default::default()
        }
    }

    pub fn department(department: impl Into<String>) -> Self {
        Self {
            department: Some(department.into()),
            ..Default::default()
        }
    }

    pub fn document_type(types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            document_type: Some(types.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    pub fn assigned() -> Self {
        Self {
            assigned: Some(true),
            ..Default::default()
        }
    }

    pub fn status(statuses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            status: Some(statuses.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    pub fn amount(range: AmountRange) -> Self {
        Self {
            amount: Some(range),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.owner.is_none()
            && self.department.is_none()
            && self.document_type.is_none()
            && self.assigned.is_none()
            && self.status.is_none()
            && self.amount.is_none()
    }

    /// Evaluate the condition set for a subject against a context.
    ///
    /// Missing context fields resolve to false for the condition being
    /// checked; they never fault.
    pub fn evaluate(&self, subject_id: &str, ctx: &AccessContext) -> bool {
        if let Some(required) = self.owner {
            let is_owner = ctx.owner_id.as_deref() == Some(subject_id);
            return is_owner == required;
        }
        if let Some(department) = &self.department {
            return ctx.department.as_deref() == Some(department.as_str());
        }
        if let Some(types) = &self.document_type {
            return ctx
                .document_type
                .as_ref()
                .map_or(false, |t| types.contains(t));
        }
        if let Some(required) = self.assigned {
            let is_assigned = ctx.assignees.iter().any(|a| a == subject_id);
            return is_assigned == required;
        }
        if let Some(statuses) = &self.status {
            return ctx.status.as_ref().map_or(false, |s| statuses.contains(s));
        }
        if let Some(range) = &self.amount {
            return ctx.amount.map_or(false, |v| range.contains(v));
        }
        true
    }
}

/// Context a permission check is evaluated against.
///
/// All fields are optional; an empty context simply fails any condition
/// that needs the missing field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessContext {
    /// Owner of the resource being accessed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,

    /// Department the resource belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,

    /// Document type of the resource
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,

    /// Subjects currently assigned to the resource
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignees: Vec<String>,

    /// Current status of the resource
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Monetary amount attached to the resource
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

impl AccessContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn with_document_type(mut self, document_type: impl Into<String>) -> Self {
        self.document_type = Some(document_type.into());
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignees.push(assignee.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_grants() {
        let perm = Permission::new("contract", "approve");
        assert!(perm.grants("contract", "approve"));
        assert!(!perm.grants("contract", "delete"));
        assert!(!perm.grants("invoice", "approve"));

        let wildcard = Permission::new("*", "*");
        assert!(wildcard.grants("contract", "approve"));
        assert!(wildcard.grants("anything", "at-all"));
    }

    #[test]
    fn test_empty_condition_set_is_true() {
        let cond = ConditionSet::default();
        assert!(cond.is_empty());
        assert!(cond.evaluate("user:alice", &AccessContext::new()));
    }

    #[test]
    fn test_owner_condition() {
        let cond = ConditionSet::owner();

        let ctx = AccessContext::new().with_owner("user:alice");
        assert!(cond.evaluate("user:alice", &ctx));
        assert!(!cond.evaluate("user:bob", &ctx));

        // Missing owner field resolves to false, not a fault
        assert!(!cond.evaluate("user:alice", &AccessContext::new()));
    }

    #[test]
    fn test_single_condition_wins() {
        // Both owner and department populated; owner is checked first
        // and decides alone. Department is ignored even though it would
        // fail.
        let cond = ConditionSet {
            owner: Some(true),
            department: Some("legal".to_string()),
            ..Default::default()
        };

        let ctx = AccessContext::new()
            .with_owner("user:alice")
            .with_department("finance");
        assert!(cond.evaluate("user:alice", &ctx));
    }

    #[test]
    fn test_document_type_condition() {
        let cond = ConditionSet::document_type(["employment_contract", "nda"]);

        let ctx = AccessContext::new().with_document_type("nda");
        assert!(cond.evaluate("user:alice", &ctx));

        let ctx = AccessContext::new().with_document_type("vendor_agreement");
        assert!(!cond.evaluate("user:alice", &ctx));

        assert!(!cond.evaluate("user:alice", &AccessContext::new()));
    }

    #[test]
    fn test_assigned_condition() {
        let cond = ConditionSet::assigned();

        let ctx = AccessContext::new()
            .with_assignee("user:bob")
            .with_assignee("user:carol");
        assert!(cond.evaluate("user:bob", &ctx));
        assert!(!cond.evaluate("user:alice", &ctx));
    }

    #[test]
    fn test_status_condition() {
        let cond = ConditionSet::status(["draft", "in_review"]);

        let ctx = AccessContext::new().with_status("draft");
        assert!(cond.evaluate("user:alice", &ctx));

        let ctx = AccessContext::new().with_status("signed");
        assert!(!cond.evaluate("user:alice", &ctx));
    }

    #[test]
    fn test_amount_condition() {
        let cond = ConditionSet::amount(AmountRange::new(Some(100.0), Some(50_000.0)));

        assert!(cond.evaluate("u", &AccessContext::new().with_amount(100.0)));
        assert!(cond.evaluate("u", &AccessContext::new().with_amount(50_000.0)));
        assert!(!cond.evaluate("u", &AccessContext::new().with_amount(99.99)));
        assert!(!cond.evaluate("u", &AccessContext::new().with_amount(50_000.01)));
        assert!(!cond.evaluate("u", &AccessContext::new()));
    }

    #[test]
    fn test_amount_range_open_bounds() {
        assert!(AmountRange::up_to(1000.0).contains(0.0));
        assert!(!AmountRange::up_to(1000.0).contains(1000.5));
        assert!(AmountRange::new(None, None).contains(f64::MAX));
    }
}
