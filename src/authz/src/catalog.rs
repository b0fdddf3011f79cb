//! Static role catalog with explicit inheritance resolution
//!
//! Roles are configuration-time data: the catalog is immutable after
//! construction. `effective_permissions` resolves `inherits` chains
//! transitively with a visited-set guard, so a cycle in a hand-written
//! catalog cannot loop forever.

use crate::types::{AmountRange, ConditionSet, Permission, RoleId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A named set of permissions, optionally inheriting other roles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    /// Role identifier (e.g., "legal_reviewer")
    pub id: RoleId,

    /// Human-readable role name
    pub name: String,

    /// Short description of what the role is for
    #[serde(default)]
    pub description: String,

    /// Permissions granted by this role
    pub permissions: Vec<Permission>,

    /// Roles whose permissions this role also carries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inherits: Vec<RoleId>,
}

impl Role {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            permissions: Vec::new(),
            inherits: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }

    pub fn inherits_from(mut self, role_id: impl Into<String>) -> Self {
        self.inherits.push(role_id.into());
        self
    }
}

/// Immutable table of roles, keyed by role id
pub struct PermissionCatalog {
    roles: HashMap<RoleId, Role>,
}

impl PermissionCatalog {
    /// Build a catalog from an explicit role list.
    ///
    /// Later duplicates replace earlier entries.
    pub fn from_roles(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: roles.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }

    /// Get a role by id
    pub fn get(&self, role_id: &str) -> Option<&Role> {
        self.roles.get(role_id)
    }

    /// All roles in the catalog
    pub fn list(&self) -> Vec<&Role> {
        self.roles.values().collect()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Permissions of a role including everything reachable through
    /// `inherits`. Unknown role ids (the root or any parent) contribute
    /// nothing. Cycles are cut by the visited set.
    pub fn effective_permissions(&self, role_id: &str) -> Vec<Permission> {
        let mut permissions = Vec::new();
        let mut visited = HashSet::new();
        self.collect_permissions(role_id, &mut visited, &mut permissions);
        permissions
    }

    fn collect_permissions(
        &self,
        role_id: &str,
        visited: &mut HashSet<RoleId>,
        out: &mut Vec<Permission>,
    ) {
        if !visited.insert(role_id.to_string()) {
            return;
        }
        let Some(role) = self.roles.get(role_id) else {
            tracing::warn!(role_id, "effective_permissions: unknown role id");
            return;
        };
        out.extend(role.permissions.iter().cloned());
        for parent in &role.inherits {
            self.collect_permissions(parent, visited, out);
        }
    }

    /// The built-in contract-management catalog.
    ///
    /// Covers the reviewer/approver roles the built-in workflows refer
    /// to, with conditioned permissions exercising every condition key.
    pub fn builtin() -> Self {
        Self::from_roles([
            Role::new("admin", "Administrator")
                .with_description("Unrestricted access to every resource")
                .with_permission(Permission::new("*", "*")),
            Role::new("employee", "Employee")
                .with_description("Baseline access for any staff member")
                .with_permission(Permission::new("contract", "create"))
                .with_permission(
                    Permission::new("contract", "view").with_condition(ConditionSet::owner()),
                )
                .with_permission(
                    Permission::new("contract", "edit").with_condition(ConditionSet::status([
                        "draft",
                        "changes_requested",
                    ])),
                ),
            Role::new("contract_manager", "Contract Manager")
                .with_description("Owns the contract lifecycle end to end")
                .inherits_from("employee")
                .with_permission(Permission::new("contract", "view"))
                .with_permission(Permission::new("contract", "edit"))
                .with_permission(Permission::new("contract", "submit"))
                .with_permission(
                    Permission::new("contract", "delete")
                        .with_condition(ConditionSet::status(["draft"])),
                )
                .with_permission(
                    Permission::new("contract", "assign").with_condition(ConditionSet::assigned()),
                ),
            Role::new("legal_reviewer", "Legal Reviewer")
                .with_description("Reviews contract terms and wording")
                .with_permission(Permission::new("contract", "view"))
                .with_permission(Permission::new("contract", "review"))
                .with_permission(Permission::new("contract", "comment")),
            Role::new("compliance_officer", "Compliance Officer")
                .with_description("Legal review plus regulatory sign-off")
                .inherits_from("legal_reviewer")
                .with_permission(Permission::new("audit_log", "view"))
                .with_permission(
                    Permission::new("contract", "approve").with_condition(
                        ConditionSet::document_type(["nda_standard", "data_processing"]),
                    ),
                ),
            Role::new("finance_approver", "Finance Approver")
                .with_description("Approves spend up to a delegated limit")
                .with_permission(Permission::new("contract", "view"))
                .with_permission(
                    Permission::new("contract", "approve")
                        .with_condition(ConditionSet::amount(AmountRange::up_to(250_000.0))),
                ),
            Role::new("department_head", "Department Head")
                .with_description("Approves contracts for their own department")
                .with_permission(Permission::new("contract", "view"))
                .with_permission(Permission::new("contract", "approve"))
                .with_permission(Permission::new("contract", "reject")),
            Role::new("hr_manager", "HR Manager")
                .with_description("Handles employment paperwork")
                .with_permission(Permission::new("contract", "view"))
                .with_permission(
                    Permission::new("contract", "review")
                        .with_condition(ConditionSet::document_type(["employment_contract"])),
                )
                .with_permission(
                    Permission::new("contract", "approve")
                        .with_condition(ConditionSet::document_type(["employment_contract"])),
                ),
            Role::new("executive", "Executive")
                .with_description("Final signature authority")
                .with_permission(Permission::new("contract", "view"))
                .with_permission(Permission::new("contract", "approve"))
                .with_permission(Permission::new("contract", "sign"))
                .with_permission(Permission::new("contract", "reject")),
        ])
    }
}
