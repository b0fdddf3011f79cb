//! Permission evaluator
//!
//! Answers "can this subject perform this action on this resource in
//! this context?" using the role catalog plus the subject's live role
//! assignments, with a decision cache in front.
//!
//! # Pipeline
//!
//! ```text
//! Request → DecisionCache → assignments → effective permissions → conditions
//!              ↓ (miss)                                              ↓
//!              └───────────────── cache result ←───────────────── allow/deny
//! ```
//!
//! `has_permission` is infallible by design: missing roles, missing
//! context fields and store failures all resolve to a denial, never to
//! a fault. Role mutations go through the engine so that every mutation
//! clears the cache and lands in the audit sink.

use crate::assignments::{
    InMemoryRoleAssignmentStore, RoleAssignment, RoleAssignmentStore, RoleScope,
};
use crate::audit::{AuditEvent, AuditSink, TracingAuditSink};
use crate::cache::{CacheStats, DecisionCache};
use crate::catalog::PermissionCatalog;
use crate::error::Result;
use crate::types::AccessContext;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

/// Role-based permission evaluator with contextual conditions
pub struct AuthzEngine {
    catalog: Arc<PermissionCatalog>,
    assignments: Arc<dyn RoleAssignmentStore>,
    cache: DecisionCache,
    audit: Arc<dyn AuditSink>,
}

impl AuthzEngine {
    pub fn new(
        catalog: Arc<PermissionCatalog>,
        assignments: Arc<dyn RoleAssignmentStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            catalog,
            assignments,
            cache: DecisionCache::default(),
            audit,
        }
    }

    /// Engine over the built-in catalog, an in-memory assignment store
    /// and the tracing audit sink
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(PermissionCatalog::builtin()),
            Arc::new(InMemoryRoleAssignmentStore::new()),
            Arc::new(TracingAuditSink),
        )
    }

    /// Check whether a subject may perform an action on a resource.
    ///
    /// Results, including denials, are cached until the next role
    /// mutation. Expired assignments do not grant.
    pub async fn has_permission(
        &self,
        subject_id: &str,
        resource: &str,
        action: &str,
        ctx: &AccessContext,
    ) -> bool {
        let key = DecisionCache::compute_key(subject_id, resource, action, ctx);
        if let Some(cached) = self.cache.get(&key) {
            debug!(subject_id, resource, action, cached, "cache hit");
            return cached;
        }

        let allowed = self.evaluate(subject_id, resource, action, ctx).await;
        self.cache.put(key, allowed);

        debug!(subject_id, resource, action, allowed, "permission evaluated");
        allowed
    }

    async fn evaluate(
        &self,
        subject_id: &str,
        resource: &str,
        action: &str,
        ctx: &AccessContext,
    ) -> bool {
        let assignments = match self.assignments.assignments_for(subject_id).await {
            Ok(assignments) => assignments,
            Err(e) => {
                // Fail closed on store trouble
                warn!(subject_id, error = %e, "assignment store failed, denying");
                return false;
            }
        };

        let now = Utc::now();
        for assignment in assignments.iter().filter(|a| !a.is_expired(now)) {
            for permission in self.catalog.effective_permissions(&assignment.role_id) {
                if !permission.grants(resource, action) {
                    continue;
                }
                let matched = permission
                    .condition
                    .as_ref()
                    .map_or(true, |cond| cond.evaluate(subject_id, ctx));
                if matched {
                    debug!(
                        subject_id,
                        role = %assignment.role_id,
                        resource,
                        action,
                        "permission granted"
                    );
                    return true;
                }
            }
        }

        false
    }

    /// Grant a role to a subject.
    ///
    /// Fails with `DuplicateRoleAssignment` when the same
    /// (subject, role, scope, scope_id) grant already exists. On
    /// success the decision cache is cleared in bulk and an audit event
    /// is emitted.
    pub async fn assign_role(
        &self,
        subject_id: &str,
        role_id: &str,
        scope: RoleScope,
        scope_id: Option<String>,
        granted_by: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<RoleAssignment> {
        let mut assignment =
            RoleAssignment::new(subject_id, role_id, scope, scope_id.clone(), granted_by);
        if let Some(expiry) = expires_at {
            assignment = assignment.with_expiry(expiry);
        }
        let granted = assignment.clone();

        self.assignments.insert(assignment).await?;
        self.cache.clear();

        self.audit
            .record(
                AuditEvent::new(granted_by, "role.assigned", "role")
                    .with_resource_id(role_id)
                    .with_changes(json!({
                        "subject_id": subject_id,
                        "scope": scope.to_string(),
                        "scope_id": scope_id,
                        "expires_at": expires_at,
                    })),
            )
            .await;

        Ok(granted)
    }

    /// Remove a role grant. Removing a grant that does not exist is a
    /// no-op and returns `false`.
    pub async fn remove_role(
        &self,
        subject_id: &str,
        role_id: &str,
        scope: RoleScope,
        scope_id: Option<&str>,
        removed_by: &str,
    ) -> Result<bool> {
        let removed = self
            .assignments
            .remove(subject_id, role_id, scope, scope_id)
            .await?;

        if removed {
            self.cache.clear();
            self.audit
                .record(
                    AuditEvent::new(removed_by, "role.removed", "role")
                        .with_resource_id(role_id)
                        .with_changes(json!({
                            "subject_id": subject_id,
                            "scope": scope.to_string(),
                            "scope_id": scope_id,
                        })),
                )
                .await;
        }

        Ok(removed)
    }

    /// Snapshot of a subject's current role assignments
    pub async fn roles_for(&self, subject_id: &str) -> Result<Vec<RoleAssignment>> {
        self.assignments.assignments_for(subject_id).await
    }

    /// Whether the subject currently holds the given role (any scope,
    /// expired grants excluded)
    pub async fn holds_role(&self, subject_id: &str, role_id: &str) -> bool {
        let now = Utc::now();
        match self.assignments.assignments_for(subject_id).await {
            Ok(assignments) => assignments
                .iter()
                .any(|a| a.role_id == role_id && !a.is_expired(now)),
            Err(e) => {
                warn!(subject_id, error = %e, "assignment store failed, denying");
                false
            }
        }
    }

    /// The role catalog this engine evaluates against
    pub fn catalog(&self) -> &PermissionCatalog {
        &self.catalog
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
