//! Workflow definition registry
//!
//! A pure lookup table. Defining workflows is a configuration-time
//! concern; the registry has no mutation API.

use crate::types::{AllowedActions, WorkflowDefinition, WorkflowStepDefinition};
use contractflow_authz::ConditionSet;
use std::collections::HashMap;

/// Immutable catalog of workflow templates, keyed by workflow id and
/// searchable by document type
pub struct WorkflowRegistry {
    definitions: Vec<WorkflowDefinition>,
    by_id: HashMap<String, usize>,
}

impl WorkflowRegistry {
    pub fn from_definitions(definitions: impl IntoIterator<Item = WorkflowDefinition>) -> Self {
        let definitions: Vec<_> = definitions.into_iter().collect();
        let by_id = definitions
            .iter()
            .enumerate()
            .map(|(i, def)| (def.id.clone(), i))
            .collect();
        Self { definitions, by_id }
    }

    /// Get a workflow definition by id
    pub fn get(&self, workflow_id: &str) -> Option<&WorkflowDefinition> {
        self.by_id
            .get(workflow_id)
            .map(|&i| &self.definitions[i])
    }

    /// First definition registered for a document type
    pub fn get_by_document_type(&self, document_type: &str) -> Option<&WorkflowDefinition> {
        self.definitions
            .iter()
            .find(|def| def.document_type == document_type)
    }

    /// All registered definitions, in registration order
    pub fn list(&self) -> &[WorkflowDefinition] {
        &self.definitions
    }

    /// The built-in contract approval workflows
    pub fn builtin() -> Self {
        Self::from_definitions([
            WorkflowDefinition::new("employment_contract", "employment_contract")
                .with_max_duration_days(30)
                .with_escalation(72)
                .with_step(
                    WorkflowStepDefinition::new("hr_review", "HR Review", "hr_manager")
                        .with_permission("contract:review")
                        .with_condition(ConditionSet::document_type(["employment_contract"]))
                        .with_estimated_hours(4.0),
                )
                .with_step(
                    WorkflowStepDefinition::new("legal_review", "Legal Review", "legal_reviewer")
                        .with_permission("contract:review")
                        .with_estimated_hours(8.0),
                )
                .with_step(
                    WorkflowStepDefinition::new(
                        "finance_review",
                        "Finance Review",
                        "finance_approver",
                    )
                    .with_permission("contract:approve")
                    .with_estimated_hours(16.0),
                )
                .with_step(
                    WorkflowStepDefinition::new(
                        "department_approval",
                        "Department Approval",
                        "department_head",
                    )
                    .with_permission("contract:approve")
                    .with_allowed_actions(AllowedActions::all())
                    .with_estimated_hours(24.0),
                )
                .with_step(
                    WorkflowStepDefinition::new(
                        "executive_signoff",
                        "Executive Sign-off",
                        "executive",
                    )
                    .with_permission("contract:approve")
                    .with_permission("contract:sign")
                    .with_estimated_hours(2.0),
                ),
            WorkflowDefinition::new("vendor_agreement", "vendor_agreement")
                .with_max_duration_days(14)
                .with_escalation(48)
                .with_step(
                    WorkflowStepDefinition::new("legal_review", "Legal Review", "legal_reviewer")
                        .with_permission("contract:review")
                        .with_estimated_hours(8.0),
                )
                .with_step(
                    WorkflowStepDefinition::new(
                        "finance_review",
                        "Finance Review",
                        "finance_approver",
                    )
                    .with_permission("contract:approve")
                    .with_estimated_hours(16.0),
                )
                .with_step(
                    WorkflowStepDefinition::new(
                        "executive_signoff",
                        "Executive Sign-off",
                        "executive",
                    )
                    .with_permission("contract:sign")
                    .with_estimated_hours(4.0),
                ),
            WorkflowDefinition::new("nda_standard", "nda_standard")
                .with_max_duration_days(7)
                .with_step(
                    WorkflowStepDefinition::new("legal_review", "Legal Review", "legal_reviewer")
                        .with_permission("contract:review")
                        .with_estimated_hours(4.0),
                )
                .with_step(
                    WorkflowStepDefinition::new(
                        "compliance_approval",
                        "Compliance Approval",
                        "compliance_officer",
                    )
                    .with_permission("contract:approve")
                    .with_estimated_hours(2.0),
                ),
        ])
    }
}
