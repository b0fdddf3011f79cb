//! Workflow manager integration tests: full approval chains against
//! the built-in registry and the real permission evaluator.

use chrono::{Duration, Utc};
use contractflow_authz::{AccessContext, AuthzEngine, RoleScope};
use contractflow_workflow::{
    Actor, DenialReason, InMemoryInstanceStore, InstanceStatus, InstanceStore,
    NoopAssignmentResolver, StaticDocumentContexts, StepAction, StepOutcome, StepTransition,
    WorkflowInstance, WorkflowInstanceManager, WorkflowRegistry,
};
use proptest::prelude::*;
use std::sync::Arc;

struct Harness {
    manager: Arc<WorkflowInstanceManager>,
    store: Arc<InMemoryInstanceStore>,
}

async fn harness() -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let authz = Arc::new(AuthzEngine::in_memory());
    for (subject, role) in [
        ("user:hr", "hr_manager"),
        ("user:legal", "legal_reviewer"),
        ("user:finance", "finance_approver"),
        ("user:head", "department_head"),
        ("user:ceo", "executive"),
    ] {
        authz
            .assign_role(subject, role, RoleScope::Global, None, "admin", None)
            .await
            .unwrap();
    }

    let store = Arc::new(InMemoryInstanceStore::new());
    let documents = StaticDocumentContexts::new()
        .with_context("doc-1", AccessContext::new().with_amount(50_000.0));
    let manager = WorkflowInstanceManager::new(
        Arc::new(WorkflowRegistry::builtin()),
        store.clone(),
        authz,
        Arc::new(documents),
        Arc::new(NoopAssignmentResolver),
        Arc::new(contractflow_authz::NullAuditSink),
    );

    Harness {
        manager: Arc::new(manager),
        store,
    }
}

fn reviewers() -> [(&'static str, Actor); 5] {
    [
        ("hr_review", Actor::new("user:hr", "Hank HR")),
        ("legal_review", Actor::new("user:legal", "Lena Legal")),
        ("finance_review", Actor::new("user:finance", "Fiona Finance")),
        ("department_approval", Actor::new("user:head", "Devon Head")),
        ("executive_signoff", Actor::new("user:ceo", "Eve Exec")),
    ]
}

#[tokio::test]
async fn new_instance_starts_at_step_zero() {
    let h = harness().await;
    let instance = h
        .manager
        .create_instance("doc-1", "employment_contract", "user:hr")
        .await
        .unwrap();

    assert_eq!(instance.current_step_index, 0);
    assert_eq!(instance.status, InstanceStatus::Active);
    assert!(instance.history.is_empty());
}

#[tokio::test]
async fn full_approval_chain_completes_instance() {
    let h = harness().await;
    let instance = h
        .manager
        .create_instance("doc-1", "employment_contract", "user:hr")
        .await
        .unwrap();

    let steps = reviewers();
    for (i, (step_id, actor)) in steps.iter().enumerate() {
        assert!(
            h.manager.can_execute_step(&instance.id, step_id, &actor.id).await,
            "step {step_id} should be executable by {}",
            actor.id
        );
        let outcome = h
            .manager
            .execute_step(&instance.id, step_id, actor, StepAction::Approve, None)
            .await;

        if i + 1 == steps.len() {
            assert_eq!(outcome, StepOutcome::Applied(StepTransition::Completed));
        } else {
            assert_eq!(
                outcome,
                StepOutcome::Applied(StepTransition::Advanced { next_step: i + 1 })
            );
        }
    }

    let loaded = h.manager.get_instance(&instance.id).await.unwrap();
    assert_eq!(loaded.status, InstanceStatus::Completed);
    assert_eq!(loaded.current_step_index, 5);
    assert!(loaded.completed_at.is_some());
    assert_eq!(loaded.history.len(), 5);
}

#[tokio::test]
async fn reject_cancels_and_freezes_history() {
    let h = harness().await;
    let instance = h
        .manager
        .create_instance("doc-1", "employment_contract", "user:hr")
        .await
        .unwrap();

    let steps = reviewers();
    for (step_id, actor) in &steps[..2] {
        h.manager
            .execute_step(&instance.id, step_id, actor, StepAction::Approve, None)
            .await;
    }

    let outcome = h
        .manager
        .execute_step(
            &instance.id,
            "finance_review",
            &steps[2].1,
            StepAction::Reject,
            Some("over budget".to_string()),
        )
        .await;
    assert_eq!(outcome, StepOutcome::Applied(StepTransition::Cancelled));

    let loaded = h.manager.get_instance(&instance.id).await.unwrap();
    assert_eq!(loaded.status, InstanceStatus::Cancelled);
    assert!(loaded.completed_at.is_some());
    let history_len = loaded.history.len();

    // Terminal instance refuses further work and appends no history
    let outcome = h
        .manager
        .execute_step(&instance.id, "finance_review", &steps[2].1, StepAction::Approve, None)
        .await;
    assert_eq!(
        outcome,
        StepOutcome::Denied(DenialReason::TerminalInstance {
            status: InstanceStatus::Cancelled
        })
    );
    let loaded = h.manager.get_instance(&instance.id).await.unwrap();
    assert_eq!(loaded.history.len(), history_len);
}

#[tokio::test]
async fn request_changes_sends_instance_back_to_start() {
    let h = harness().await;
    let instance = h
        .manager
        .create_instance("doc-1", "employment_contract", "user:hr")
        .await
        .unwrap();

    let steps = reviewers();
    for (step_id, actor) in &steps[..3] {
        h.manager
            .execute_step(&instance.id, step_id, actor, StepAction::Approve, None)
            .await;
    }

    let outcome = h
        .manager
        .execute_step(
            &instance.id,
            "department_approval",
            &steps[3].1,
            StepAction::RequestChanges,
            Some("salary band needs rework".to_string()),
        )
        .await;
    assert_eq!(outcome, StepOutcome::Applied(StepTransition::SentBackToStart));

    let loaded = h.manager.get_instance(&instance.id).await.unwrap();
    assert_eq!(loaded.current_step_index, 0);
    assert_eq!(loaded.status, InstanceStatus::Active);
    // History keeps the full trail, including the send-back
    assert_eq!(loaded.history.len(), 4);
}

#[tokio::test]
async fn progress_estimate_sums_hours_through_current_step() {
    let h = harness().await;
    let instance = h
        .manager
        .create_instance("doc-1", "employment_contract", "user:hr")
        .await
        .unwrap();

    h.manager
        .execute_step(
            &instance.id,
            "hr_review",
            &Actor::new("user:hr", "Hank HR"),
            StepAction::Approve,
            None,
        )
        .await;

    let progress = h.manager.get_workflow_progress(&instance.id).await.unwrap();
    assert_eq!(progress.current_step, 1);
    assert_eq!(progress.total_steps, 5);
    assert_eq!(progress.progress, 20);

    // hours [4,8,16,24,2], at step 1: 4 + 8 = 12h
    let loaded = h.manager.get_instance(&instance.id).await.unwrap();
    assert_eq!(
        progress.estimated_completion,
        loaded.started_at + Duration::hours(12)
    );
    assert!(!progress.is_overdue);
}

#[tokio::test]
async fn statistics_average_excludes_active_instances() {
    let h = harness().await;

    let mut two_days = WorkflowInstance::new("doc-a", "nda_standard");
    two_days.status = InstanceStatus::Completed;
    two_days.started_at = Utc::now() - Duration::days(10);
    two_days.completed_at = Some(two_days.started_at + Duration::days(2));
    two_days.current_step_index = 2;

    let mut four_days = WorkflowInstance::new("doc-b", "nda_standard");
    four_days.status = InstanceStatus::Completed;
    four_days.started_at = Utc::now() - Duration::days(10);
    four_days.completed_at = Some(four_days.started_at + Duration::days(4));
    four_days.current_step_index = 2;

    let active = WorkflowInstance::new("doc-c", "nda_standard");

    for instance in [two_days, four_days, active] {
        h.store.put(instance).await.unwrap();
    }

    let stats = h.manager.get_statistics().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.active, 1);
    assert!((stats.average_completion_days - 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn statistics_empty_store() {
    let h = harness().await;
    let stats = h.manager.get_statistics().await.unwrap();
    assert_eq!(stats.total, 0);
    assert_eq!(stats.average_completion_days, 0.0);
}

#[tokio::test]
async fn finance_approval_respects_amount_limit() {
    let h = harness().await;
    // doc-9 has no context entry, so no amount is visible and the
    // finance approver's amount-bounded permission fails closed
    let instance = h
        .manager
        .create_instance("doc-9", "employment_contract", "user:hr")
        .await
        .unwrap();

    let steps = reviewers();
    for (step_id, actor) in &steps[..2] {
        let outcome = h
            .manager
            .execute_step(&instance.id, step_id, actor, StepAction::Approve, None)
            .await;
        assert!(outcome.is_applied());
    }

    let outcome = h
        .manager
        .execute_step(&instance.id, "finance_review", &steps[2].1, StepAction::Approve, None)
        .await;
    assert_eq!(outcome, StepOutcome::Denied(DenialReason::NotPermitted));
}

#[tokio::test]
async fn escalated_instance_still_accepts_work() {
    let h = harness().await;
    let instance = h
        .manager
        .create_instance("doc-1", "vendor_agreement", "user:legal")
        .await
        .unwrap();

    assert!(h.manager.escalate(&instance.id).await.unwrap());
    let loaded = h.manager.get_instance(&instance.id).await.unwrap();
    assert_eq!(loaded.status, InstanceStatus::Escalated);

    // Escalation flags the instance but does not block review.
    // The instance only leaves Escalated through a terminal action.
    let outcome = h
        .manager
        .execute_step(
            &instance.id,
            "legal_review",
            &Actor::new("user:legal", "Lena Legal"),
            StepAction::Comment,
            Some("picking this up".to_string()),
        )
        .await;
    assert!(outcome.is_applied());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn progress_percentage_stays_in_range(step in 0usize..=5) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        rt.block_on(async {
            let h = harness().await;
            let mut instance = WorkflowInstance::new("doc-p", "employment_contract");
            instance.current_step_index = step;
            let id = instance.id.clone();
            h.store.put(instance).await.unwrap();

            let progress = h.manager.get_workflow_progress(&id).await.unwrap();
            prop_assert!(progress.progress <= 100);
            Ok(())
        })?;
    }
}
