//! Error types for the authorization engine

use crate::assignments::RoleScope;
use thiserror::Error;

/// Authorization engine errors.
///
/// Denied permission checks are NOT errors; `has_permission` and friends
/// report denial as `false`. Errors are reserved for invariant
/// violations and store failures.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// An identical (subject, role, scope, scope_id) assignment already exists
    #[error("duplicate role assignment: subject={subject_id} role={role_id} scope={scope}")]
    DuplicateRoleAssignment {
        subject_id: String,
        role_id: String,
        scope: RoleScope,
    },

    /// Assignment store failure
    #[error("store error: {0}")]
    Store(String),
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
