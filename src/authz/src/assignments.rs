//! Role assignments and the assignment store boundary
//!
//! The store is a repository trait so the in-memory implementation can
//! be swapped for a persistent backend without touching the evaluator.

use crate::error::{AuthzError, Result};
use crate::types::{RoleId, SubjectId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Scope at which a role is granted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleScope {
    Global,
    Department,
    Project,
}

impl fmt::Display for RoleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleScope::Global => write!(f, "global"),
            RoleScope::Department => write!(f, "department"),
            RoleScope::Project => write!(f, "project"),
        }
    }
}

/// A role granted to a subject.
///
/// Uniqueness invariant: no two assignments share
/// `(subject_id, role_id, scope, scope_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Assignment identifier
    pub id: String,

    /// Subject the role is granted to
    pub subject_id: SubjectId,

    /// Granted role
    pub role_id: RoleId,

    /// Scope of the grant
    pub scope: RoleScope,

    /// Department or project id when the scope is not global
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_id: Option<String>,

    /// Subject that performed the grant
    pub granted_by: SubjectId,

    /// When the grant was made
    pub granted_at: DateTime<Utc>,

    /// Optional expiry; expired assignments no longer grant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl RoleAssignment {
    pub fn new(
        subject_id: impl Into<String>,
        role_id: impl Into<String>,
        scope: RoleScope,
        scope_id: Option<String>,
        granted_by: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            subject_id: subject_id.into(),
            role_id: role_id.into(),
            scope,
            scope_id,
            granted_by: granted_by.into(),
            granted_at: Utc::now(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |expiry| expiry < now)
    }

    /// Compare against the uniqueness key
    pub fn key_matches(&self, role_id: &str, scope: RoleScope, scope_id: Option<&str>) -> bool {
        self.role_id == role_id && self.scope == scope && self.scope_id.as_deref() == scope_id
    }
}

/// Assignment persistence boundary
#[async_trait]
pub trait RoleAssignmentStore: Send + Sync {
    /// Snapshot of a subject's assignments
    async fn assignments_for(&self, subject_id: &str) -> Result<Vec<RoleAssignment>>;

    /// Insert a new assignment.
    ///
    /// Fails with [`AuthzError::DuplicateRoleAssignment`] when an
    /// assignment with the same uniqueness key already exists. The
    /// check and the insert are atomic with respect to other callers.
    async fn insert(&self, assignment: RoleAssignment) -> Result<()>;

    /// Remove a matching assignment. Returns whether anything was
    /// removed; removing a non-existent assignment is a no-op.
    async fn remove(
        &self,
        subject_id: &str,
        role_id: &str,
        scope: RoleScope,
        scope_id: Option<&str>,
    ) -> Result<bool>;

    /// All assignments across subjects
    async fn all(&self) -> Result<Vec<RoleAssignment>>;
}

/// In-memory assignment store
pub struct InMemoryRoleAssignmentStore {
    inner: RwLock<HashMap<SubjectId, Vec<RoleAssignment>>>,
}

impl InMemoryRoleAssignmentStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryRoleAssignmentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoleAssignmentStore for InMemoryRoleAssignmentStore {
    async fn assignments_for(&self, subject_id: &str) -> Result<Vec<RoleAssignment>> {
        let inner = self.inner.read().await;
        Ok(inner.get(subject_id).cloned().unwrap_or_default())
    }

    async fn insert(&self, assignment: RoleAssignment) -> Result<()> {
        // Single write lock makes check-then-insert atomic
        let mut inner = self.inner.write().await;
        let entries = inner.entry(assignment.subject_id.clone()).or_default();

        if entries.iter().any(|a| {
            a.key_matches(
                &assignment.role_id,
                assignment.scope,
                assignment.scope_id.as_deref(),
            )
        }) {
            return Err(AuthzError::DuplicateRoleAssignment {
                subject_id: assignment.subject_id,
                role_id: assignment.role_id,
                scope: assignment.scope,
            });
        }

        entries.push(assignment);
        Ok(())
    }

    async fn remove(
        &self,
        subject_id: &str,
        role_id: &str,
        scope: RoleScope,
        scope_id: Option<&str>,
    ) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let Some(entries) = inner.get_mut(subject_id) else {
            return Ok(false);
        };

        let before = entries.len();
        entries.retain(|a| !a.key_matches(role_id, scope, scope_id));
        Ok(entries.len() < before)
    }

    async fn all(&self) -> Result<Vec<RoleAssignment>> {
        let inner = self.inner.read().await;
        Ok(inner.values().flatten().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_insert_and_snapshot() {
        let store = InMemoryRoleAssignmentStore::new();
        let assignment =
            RoleAssignment::new("user:alice", "legal_reviewer", RoleScope::Global, None, "admin");

        store.insert(assignment).await.unwrap();

        let roles = store.assignments_for("user:alice").await.unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].role_id, "legal_reviewer");
    }

    #[tokio::test]
    async fn test_duplicate_insert_fails() {
        let store = InMemoryRoleAssignmentStore::new();
        let first = RoleAssignment::new(
            "user:alice",
            "legal_reviewer",
            RoleScope::Department,
            Some("legal".to_string()),
            "admin",
        );
        let second = RoleAssignment::new(
            "user:alice",
            "legal_reviewer",
            RoleScope::Department,
            Some("legal".to_string()),
            "admin",
        );

        store.insert(first).await.unwrap();
        let err = store.insert(second).await.unwrap_err();
        assert!(matches!(err, AuthzError::DuplicateRoleAssignment { .. }));

        // Exactly one entry remains
        let roles = store.assignments_for("user:alice").await.unwrap();
        assert_eq!(roles.len(), 1);
    }

    #[tokio::test]
    async fn test_same_role_different_scope_id_allowed() {
        let store = InMemoryRoleAssignmentStore::new();
        store
            .insert(RoleAssignment::new(
                "user:alice",
                "department_head",
                RoleScope::Department,
                Some("legal".to_string()),
                "admin",
            ))
            .await
            .unwrap();
        store
            .insert(RoleAssignment::new(
                "user:alice",
                "department_head",
                RoleScope::Department,
                Some("finance".to_string()),
                "admin",
            ))
            .await
            .unwrap();

        let roles = store.assignments_for("user:alice").await.unwrap();
        assert_eq!(roles.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = InMemoryRoleAssignmentStore::new();
        store
            .insert(RoleAssignment::new(
                "user:alice",
                "employee",
                RoleScope::Global,
                None,
                "admin",
            ))
            .await
            .unwrap();

        let removed = store
            .remove("user:alice", "employee", RoleScope::Global, None)
            .await
            .unwrap();
        assert!(removed);

        // Second removal is a no-op, not an error
        let removed = store
            .remove("user:alice", "employee", RoleScope::Global, None)
            .await
            .unwrap();
        assert!(!removed);

        // Unknown subject is a no-op too
        let removed = store
            .remove("user:ghost", "employee", RoleScope::Global, None)
            .await
            .unwrap();
        assert!(!removed);
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let assignment =
            RoleAssignment::new("user:alice", "employee", RoleScope::Global, None, "admin")
                .with_expiry(now - Duration::hours(1));
        assert!(assignment.is_expired(now));

        let live = RoleAssignment::new("user:alice", "employee", RoleScope::Global, None, "admin")
            .with_expiry(now + Duration::hours(1));
        assert!(!live.is_expired(now));
    }
}
