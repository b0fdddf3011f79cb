//! Workflow instance manager
//!
//! Creates and advances workflow instances, authorizing every step
//! transition through the permission evaluator. `execute_step` is
//! serialized per instance id: two reviewers racing on the same step
//! cannot double-advance an instance.

use crate::error::{Result, WorkflowError};
use crate::registry::WorkflowRegistry;
use crate::store::{InMemoryInstanceStore, InstanceStore};
use crate::types::{
    Actor, InstanceStatus, StepAction, StepHistoryEntry, WorkflowDefinition, WorkflowInstance,
    WorkflowStepDefinition,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use contractflow_authz::{AccessContext, AuditEvent, AuditSink, AuthzEngine, TracingAuditSink};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// State change applied by a successful `execute_step`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepTransition {
    /// Step approved, instance moved to the next step
    Advanced { next_step: usize },
    /// Final step approved, workflow completed
    Completed,
    /// Step rejected, workflow cancelled
    Cancelled,
    /// Changes requested, instance reset to the first step
    SentBackToStart,
    /// History-only action (assign/comment), no state change
    Recorded,
}

/// Why a step execution was refused.
///
/// Denial is an expected outcome, not a fault; keeping the reasons
/// apart makes failure diagnosis testable instead of collapsing them
/// into one boolean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DenialReason {
    /// No instance with that id
    InstanceNotFound,
    /// The instance's workflow definition is not registered
    UnknownWorkflow,
    /// Instance already completed or cancelled
    TerminalInstance { status: InstanceStatus },
    /// The given step is not the current step
    WrongStep { expected: String, requested: String },
    /// The current step does not accept this action
    ActionNotAllowed { action: StepAction },
    /// Actor lacks the required role or permissions
    NotPermitted,
}

/// Structured result of `execute_step`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Applied(StepTransition),
    Denied(DenialReason),
}

impl StepOutcome {
    /// Whether the step was executed and state (or history) changed
    pub fn is_applied(&self) -> bool {
        matches!(self, StepOutcome::Applied(_))
    }
}

/// Progress summary for one instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowProgress {
    pub current_step: usize,
    pub total_steps: usize,
    /// Rounded percentage, 0..=100
    pub progress: u32,
    pub estimated_completion: DateTime<Utc>,
    pub is_overdue: bool,
}

/// Aggregate counts across all instances
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowStatistics {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub escalated: usize,
    /// Mean completion time in days over completed instances; 0 if none
    pub average_completion_days: f64,
}

/// Resolves who should work the next step after an approval.
///
/// Invoked by the manager after a non-final approve; a resolved actor
/// is recorded in history as an assign entry.
#[async_trait]
pub trait AssignmentResolver: Send + Sync {
    async fn resolve_assignee(
        &self,
        step: &WorkflowStepDefinition,
        instance: &WorkflowInstance,
    ) -> Option<Actor>;
}

/// Default resolver: assigns nobody
pub struct NoopAssignmentResolver;

#[async_trait]
impl AssignmentResolver for NoopAssignmentResolver {
    async fn resolve_assignee(
        &self,
        step: &WorkflowStepDefinition,
        _instance: &WorkflowInstance,
    ) -> Option<Actor> {
        debug!(step = %step.id, "no assignment resolver configured");
        None
    }
}

/// Supplies the document attributes permission conditions evaluate
/// against (owner, department, amount, status). Backed by the document
/// persistence collaborator.
#[async_trait]
pub trait DocumentContextProvider: Send + Sync {
    async fn context_for(&self, document_id: &str) -> AccessContext;
}

/// Fixed per-document contexts; empty context for unknown documents
#[derive(Default)]
pub struct StaticDocumentContexts {
    contexts: HashMap<String, AccessContext>,
}

impl StaticDocumentContexts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, document_id: impl Into<String>, ctx: AccessContext) -> Self {
        self.contexts.insert(document_id.into(), ctx);
        self
    }
}

#[async_trait]
impl DocumentContextProvider for StaticDocumentContexts {
    async fn context_for(&self, document_id: &str) -> AccessContext {
        self.contexts.get(document_id).cloned().unwrap_or_default()
    }
}

/// Creates and advances workflow instances
pub struct WorkflowInstanceManager {
    registry: Arc<WorkflowRegistry>,
    instances: Arc<dyn InstanceStore>,
    authz: Arc<AuthzEngine>,
    documents: Arc<dyn DocumentContextProvider>,
    resolver: Arc<dyn AssignmentResolver>,
    audit: Arc<dyn AuditSink>,
    /// Per-instance locks serializing execute_step/escalate
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl WorkflowInstanceManager {
    pub fn new(
        registry: Arc<WorkflowRegistry>,
        instances: Arc<dyn InstanceStore>,
        authz: Arc<AuthzEngine>,
        documents: Arc<dyn DocumentContextProvider>,
        resolver: Arc<dyn AssignmentResolver>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            registry,
            instances,
            authz,
            documents,
            resolver,
            audit,
            locks: DashMap::new(),
        }
    }

    /// Manager over the built-in registry with in-memory storage and
    /// default collaborators
    pub fn with_defaults(authz: Arc<AuthzEngine>) -> Self {
        Self::new(
            Arc::new(WorkflowRegistry::builtin()),
            Arc::new(InMemoryInstanceStore::new()),
            authz,
            Arc::new(StaticDocumentContexts::new()),
            Arc::new(NoopAssignmentResolver),
            Arc::new(TracingAuditSink),
        )
    }

    /// Start a workflow instance for a document.
    ///
    /// Fails with [`WorkflowError::WorkflowNotFound`] for an unknown
    /// workflow id; otherwise the instance begins at step 0, active,
    /// with empty history.
    pub async fn create_instance(
        &self,
        document_id: &str,
        workflow_id: &str,
        actor_id: &str,
    ) -> Result<WorkflowInstance> {
        if self.registry.get(workflow_id).is_none() {
            return Err(WorkflowError::WorkflowNotFound(workflow_id.to_string()));
        }

        let instance = WorkflowInstance::new(document_id, workflow_id);
        self.instances.put(instance.clone()).await?;

        info!(
            instance = %instance.id,
            document = document_id,
            workflow = workflow_id,
            "workflow instance created"
        );
        self.audit
            .record(
                AuditEvent::new(actor_id, "workflow.instance_created", "workflow_instance")
                    .with_resource_id(&instance.id)
                    .with_changes(json!({
                        "document_id": document_id,
                        "workflow_id": workflow_id,
                    })),
            )
            .await;

        Ok(instance)
    }

    /// Start an instance using the registry's document-type mapping
    pub async fn create_for_document_type(
        &self,
        document_id: &str,
        document_type: &str,
        actor_id: &str,
    ) -> Result<WorkflowInstance> {
        let workflow_id = self
            .registry
            .get_by_document_type(document_type)
            .map(|def| def.id.clone())
            .ok_or_else(|| WorkflowError::WorkflowNotFound(document_type.to_string()))?;
        self.create_instance(document_id, &workflow_id, actor_id).await
    }

    /// Whether the actor may execute the given step right now.
    ///
    /// Fails closed: unknown instance, wrong step, missing role or any
    /// failing required permission all yield `false`.
    pub async fn can_execute_step(
        &self,
        instance_id: &str,
        step_id: &str,
        actor_id: &str,
    ) -> bool {
        let instance = match self.instances.get(instance_id).await {
            Ok(Some(instance)) => instance,
            Ok(None) => return false,
            Err(e) => {
                warn!(instance_id, error = %e, "instance store failed, denying");
                return false;
            }
        };
        let Some(definition) = self.registry.get(&instance.workflow_id) else {
            warn!(workflow = %instance.workflow_id, "instance references unknown workflow");
            return false;
        };
        let Some(step) = definition.step_at(instance.current_step_index) else {
            return false;
        };
        if step.id != step_id {
            return false;
        }
        self.authorize(&instance, definition, step, actor_id).await
    }

    /// Execute an action on the current step of an instance.
    ///
    /// Returns a structured outcome; denials do not mutate anything.
    /// Serialized per instance id so concurrent callers cannot
    /// double-advance the same instance.
    pub async fn execute_step(
        &self,
        instance_id: &str,
        step_id: &str,
        actor: &Actor,
        action: StepAction,
        comment: Option<String>,
    ) -> StepOutcome {
        let lock = self.lock_for(instance_id);
        let _guard = lock.lock().await;

        let mut instance = match self.instances.get(instance_id).await {
            Ok(Some(instance)) => instance,
            Ok(None) => return StepOutcome::Denied(DenialReason::InstanceNotFound),
            Err(e) => {
                warn!(instance_id, error = %e, "instance store failed, denying");
                return StepOutcome::Denied(DenialReason::InstanceNotFound);
            }
        };

        if instance.is_terminal() {
            return StepOutcome::Denied(DenialReason::TerminalInstance {
                status: instance.status,
            });
        }

        let Some(definition) = self.registry.get(&instance.workflow_id) else {
            warn!(workflow = %instance.workflow_id, "instance references unknown workflow");
            return StepOutcome::Denied(DenialReason::UnknownWorkflow);
        };
        let Some(step) = definition.step_at(instance.current_step_index) else {
            return StepOutcome::Denied(DenialReason::WrongStep {
                expected: String::new(),
                requested: step_id.to_string(),
            });
        };
        if step.id != step_id {
            return StepOutcome::Denied(DenialReason::WrongStep {
                expected: step.id.clone(),
                requested: step_id.to_string(),
            });
        }
        if !step.allowed_actions.permits(action) {
            return StepOutcome::Denied(DenialReason::ActionNotAllowed { action });
        }
        if !self.authorize(&instance, definition, step, &actor.id).await {
            return StepOutcome::Denied(DenialReason::NotPermitted);
        }

        let step = step.clone();
        instance.history.push(StepHistoryEntry {
            step_id: step.id.clone(),
            step_name: step.name.clone(),
            actor_id: actor.id.clone(),
            actor_name: actor.name.clone(),
            action,
            comment: comment.clone(),
            timestamp: Utc::now(),
        });

        let transition = match action {
            StepAction::Approve => self.apply_approve(&mut instance, definition).await,
            StepAction::Reject => {
                instance.status = InstanceStatus::Cancelled;
                instance.completed_at = Some(Utc::now());
                StepTransition::Cancelled
            }
            StepAction::RequestChanges => {
                // Deliberate policy: back to the FIRST step, not one back
                instance.current_step_index = 0;
                StepTransition::SentBackToStart
            }
            StepAction::Assign | StepAction::Comment => StepTransition::Recorded,
        };

        // A persistence failure must not retract a decided transition
        if let Err(e) = self.instances.put(instance.clone()).await {
            warn!(instance_id, error = %e, "failed to persist instance");
        }

        info!(
            instance = instance_id,
            step = %step.id,
            action = %action,
            status = %instance.status,
            "workflow step executed"
        );
        self.audit
            .record(
                AuditEvent::new(&actor.id, "workflow.step_executed", "workflow_instance")
                    .with_resource_id(instance_id)
                    .with_changes(json!({
                        "step_id": step.id,
                        "action": action.to_string(),
                        "comment": comment,
                        "status": instance.status.to_string(),
                        "current_step_index": instance.current_step_index,
                    })),
            )
            .await;

        StepOutcome::Applied(transition)
    }

    async fn apply_approve(
        &self,
        instance: &mut WorkflowInstance,
        definition: &WorkflowDefinition,
    ) -> StepTransition {
        instance.current_step_index += 1;

        if instance.current_step_index >= definition.steps.len() {
            instance.status = InstanceStatus::Completed;
            instance.completed_at = Some(Utc::now());
            return StepTransition::Completed;
        }

        // Auto-assignment hook for the step that just became current
        if let Some(next) = definition.step_at(instance.current_step_index) {
            if let Some(assignee) = self.resolver.resolve_assignee(next, instance).await {
                instance.history.push(StepHistoryEntry {
                    step_id: next.id.clone(),
                    step_name: next.name.clone(),
                    actor_id: assignee.id,
                    actor_name: assignee.name,
                    action: StepAction::Assign,
                    comment: Some("auto-assigned".to_string()),
                    timestamp: Utc::now(),
                });
            }
        }

        StepTransition::Advanced {
            next_step: instance.current_step_index,
        }
    }

    /// Role + permissions + step condition, all of which must pass
    async fn authorize(
        &self,
        instance: &WorkflowInstance,
        definition: &WorkflowDefinition,
        step: &WorkflowStepDefinition,
        actor_id: &str,
    ) -> bool {
        if !self.authz.holds_role(actor_id, &step.required_role).await {
            debug!(actor_id, role = %step.required_role, "actor lacks required role");
            return false;
        }

        let ctx = self.step_context(instance, definition).await;

        // required_permissions are ANDed
        for perm in &step.required_permissions {
            let Some((resource, action)) = perm.split_once(':') else {
                warn!(permission = %perm, "malformed required permission, denying");
                return false;
            };
            if !self.authz.has_permission(actor_id, resource, action, &ctx).await {
                debug!(actor_id, permission = %perm, "required permission denied");
                return false;
            }
        }

        if let Some(condition) = &step.condition {
            if !condition.evaluate(actor_id, &ctx) {
                debug!(actor_id, step = %step.id, "step condition failed");
                return false;
            }
        }

        true
    }

    async fn step_context(
        &self,
        instance: &WorkflowInstance,
        definition: &WorkflowDefinition,
    ) -> AccessContext {
        let mut ctx = self.documents.context_for(&instance.document_id).await;
        if ctx.document_type.is_none() {
            ctx.document_type = Some(definition.document_type.clone());
        }
        ctx
    }

    /// Look up an instance
    pub async fn get_instance(&self, instance_id: &str) -> Result<WorkflowInstance> {
        self.instances
            .get(instance_id)
            .await?
            .ok_or_else(|| WorkflowError::WorkflowInstanceNotFound(instance_id.to_string()))
    }

    /// Progress summary for an instance.
    ///
    /// The estimate sums estimated hours of all steps up to AND
    /// including the current one.
    pub async fn get_workflow_progress(&self, instance_id: &str) -> Result<WorkflowProgress> {
        let instance = self.get_instance(instance_id).await?;
        let definition = self
            .registry
            .get(&instance.workflow_id)
            .ok_or_else(|| WorkflowError::WorkflowNotFound(instance.workflow_id.clone()))?;

        let total_steps = definition.steps.len();
        let current_step = instance.current_step_index;
        let progress = if total_steps == 0 {
            0
        } else {
            ((current_step as f64 / total_steps as f64) * 100.0).round() as u32
        };

        let hours: f64 = if total_steps == 0 {
            0.0
        } else {
            let last = current_step.min(total_steps - 1);
            definition.steps[..=last]
                .iter()
                .filter_map(|s| s.estimated_hours)
                .sum()
        };
        let estimated_completion =
            instance.started_at + Duration::seconds((hours * 3600.0) as i64);

        Ok(WorkflowProgress {
            current_step,
            total_steps,
            progress,
            estimated_completion,
            is_overdue: estimated_completion < Utc::now(),
        })
    }

    /// Counts by status plus mean completion time
    pub async fn get_statistics(&self) -> Result<WorkflowStatistics> {
        let instances = self.instances.list().await?;
        let mut stats = WorkflowStatistics {
            total: instances.len(),
            ..Default::default()
        };

        let mut completion_days = Vec::new();
        for instance in &instances {
            match instance.status {
                InstanceStatus::Active => stats.active += 1,
                InstanceStatus::Completed => {
                    stats.completed += 1;
                    if let Some(completed_at) = instance.completed_at {
                        let days = (completed_at - instance.started_at).num_seconds() as f64
                            / 86_400.0;
                        completion_days.push(days);
                    }
                }
                InstanceStatus::Cancelled => stats.cancelled += 1,
                InstanceStatus::Escalated => stats.escalated += 1,
            }
        }

        if !completion_days.is_empty() {
            stats.average_completion_days =
                completion_days.iter().sum::<f64>() / completion_days.len() as f64;
        }

        Ok(stats)
    }

    /// Active instances past their escalation deadline at `now`.
    ///
    /// Meant to be driven by an external periodic scheduler; the
    /// manager never runs a timer of its own.
    pub async fn overdue_instances(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let instances = self.instances.list().await?;
        let mut overdue = Vec::new();

        for instance in instances {
            if instance.status != InstanceStatus::Active {
                continue;
            }
            let Some(definition) = self.registry.get(&instance.workflow_id) else {
                continue;
            };
            if let Some(deadline) = Self::escalation_deadline(definition, &instance) {
                if deadline < now {
                    overdue.push(instance.id);
                }
            }
        }

        Ok(overdue)
    }

    /// Flag an overdue active instance as escalated. Returns `false`
    /// (without mutation) when the instance is not active.
    pub async fn escalate(&self, instance_id: &str) -> Result<bool> {
        let lock = self.lock_for(instance_id);
        let _guard = lock.lock().await;

        let mut instance = self.get_instance(instance_id).await?;
        if instance.status != InstanceStatus::Active {
            return Ok(false);
        }
        let definition = self
            .registry
            .get(&instance.workflow_id)
            .ok_or_else(|| WorkflowError::WorkflowNotFound(instance.workflow_id.clone()))?;

        instance.status = InstanceStatus::Escalated;
        let scheduler = Actor::scheduler();
        let step = definition.step_at(instance.current_step_index);
        instance.history.push(StepHistoryEntry {
            step_id: step.map(|s| s.id.clone()).unwrap_or_default(),
            step_name: step.map(|s| s.name.clone()).unwrap_or_default(),
            actor_id: scheduler.id.clone(),
            actor_name: scheduler.name.clone(),
            action: StepAction::Comment,
            comment: Some("escalated: past deadline".to_string()),
            timestamp: Utc::now(),
        });
        self.instances.put(instance.clone()).await?;

        info!(instance = instance_id, "workflow instance escalated");
        self.audit
            .record(
                AuditEvent::new(&scheduler.id, "workflow.escalated", "workflow_instance")
                    .with_resource_id(instance_id),
            )
            .await;

        Ok(true)
    }

    fn escalation_deadline(
        definition: &WorkflowDefinition,
        instance: &WorkflowInstance,
    ) -> Option<DateTime<Utc>> {
        let by_duration = definition
            .max_duration_days
            .map(|days| instance.started_at + Duration::days(days as i64));
        let by_hours = definition
            .auto_escalate
            .then_some(definition.escalation_hours)
            .flatten()
            .map(|hours| instance.started_at + Duration::hours(hours as i64));

        match (by_duration, by_hours) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn lock_for(&self, instance_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(instance_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
