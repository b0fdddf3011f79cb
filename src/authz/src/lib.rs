//! # ContractFlow Authorization Engine
//!
//! Role-based permission evaluator with contextual conditions.
//!
//! ## Features
//!
//! - **Static role catalog** with explicit, cycle-safe inheritance
//!   resolution
//! - **Scoped role assignments** (global / department / project) with
//!   optional expiry
//! - **Contextual conditions** (ownership, department, document type,
//!   assignment, status, amount range)
//! - **Decision caching** keyed by BLAKE3 over the full request, bulk
//!   invalidated on any role mutation
//! - **Audit events** for every role mutation, fire-and-forget
//!
//! ## Example
//!
//! ```rust
//! use contractflow_authz::{AccessContext, AuthzEngine, RoleScope};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = AuthzEngine::in_memory();
//!
//!     engine
//!         .assign_role("user:alice", "legal_reviewer", RoleScope::Global, None, "admin", None)
//!         .await?;
//!
//!     let ctx = AccessContext::new().with_document_type("nda_standard");
//!     if engine.has_permission("user:alice", "contract", "review", &ctx).await {
//!         println!("Access granted!");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod assignments;
pub mod audit;
pub mod cache;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use assignments::{
    InMemoryRoleAssignmentStore, RoleAssignment, RoleAssignmentStore, RoleScope,
};
pub use audit::{AuditEvent, AuditSink, MemoryAuditSink, NullAuditSink, TracingAuditSink};
pub use cache::{CacheStats, DecisionCache};
pub use catalog::{PermissionCatalog, Role};
pub use engine::AuthzEngine;
pub use error::{AuthzError, Result};
pub use types::{AccessContext, AmountRange, ConditionSet, Permission, RoleId, SubjectId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
