//! Error types for the workflow engine

use thiserror::Error;

/// Workflow engine errors.
///
/// Denied step executions are NOT errors; `execute_step` reports them
/// as a structured [`StepOutcome::Denied`](crate::manager::StepOutcome)
/// value. Errors are reserved for missing entities and store failures.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Unknown workflow definition id
    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    /// Unknown workflow instance id
    #[error("workflow instance not found: {0}")]
    WorkflowInstanceNotFound(String),

    /// Instance store failure
    #[error("store error: {0}")]
    Store(String),
}

/// Result type for workflow operations
pub type Result<T> = std::result::Result<T, WorkflowError>;
