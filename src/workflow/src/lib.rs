//! Multi-step approval workflows and stage-gated drafting for
//! contract documents.
//!
//! Workflow definitions are immutable templates of ordered steps; each
//! step names the role and permissions required to act on it. The
//! [`WorkflowInstanceManager`] runs instances of those templates
//! against the [`contractflow_authz`] permission evaluator, recording
//! every action in an append-only history. The [`StageGateController`]
//! gates the drafting flow that precedes approval.
//!
//! ```no_run
//! use contractflow_authz::{AuthzEngine, RoleScope};
//! use contractflow_workflow::{Actor, StepAction, WorkflowInstanceManager};
//! use std::sync::Arc;
//!
//! # async fn demo() -> contractflow_workflow::Result<()> {
//! let authz = Arc::new(AuthzEngine::in_memory());
//! authz
//!     .assign_role("user:lena", "legal_reviewer", RoleScope::Global, None, "admin", None)
//!     .await
//!     .map_err(|e| contractflow_workflow::WorkflowError::Store(e.to_string()))?;
//!
//! let manager = WorkflowInstanceManager::with_defaults(authz);
//! let instance = manager
//!     .create_instance("doc-42", "nda_standard", "user:lena")
//!     .await?;
//! let outcome = manager
//!     .execute_step(
//!         &instance.id,
//!         "legal_review",
//!         &Actor::new("user:lena", "Lena Legal"),
//!         StepAction::Approve,
//!         None,
//!     )
//!     .await;
//! assert!(outcome.is_applied());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod manager;
pub mod registry;
pub mod stage_gate;
pub mod store;
pub mod types;

pub use error::{Result, WorkflowError};
pub use manager::{
    AssignmentResolver, DenialReason, DocumentContextProvider, NoopAssignmentResolver,
    StaticDocumentContexts, StepOutcome, StepTransition, WorkflowInstanceManager,
    WorkflowProgress, WorkflowStatistics,
};
pub use registry::WorkflowRegistry;
pub use stage_gate::{
    DefaultStageValidator, DraftContract, DraftStage, Milestone, StageGateController,
    StageStatus, StageValidation, StageValidator, ValidationReport,
};
pub use store::{InMemoryInstanceStore, InstanceStore};
pub use types::{
    Actor, AllowedActions, InstanceStatus, StepAction, StepHistoryEntry, WorkflowDefinition,
    WorkflowInstance, WorkflowStepDefinition,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
