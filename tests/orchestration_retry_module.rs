use procflow::catalog::{ProcessTypeId, StepStatus, StepTypeId};
use procflow::lease::LeaseManager;
use procflow::orchestration::{
    EngineError, FailureKind, NotificationType, RetryDeclineController, RetryPolicy,
};
use procflow::shared::{ProcessId, StepId, VersionToken};
use procflow::store::{ProcessRecord, ProcessStore, ProcessUpdate, StepRecord};
use tempfile::tempdir;

fn process(process_type: ProcessTypeId) -> ProcessRecord {
    ProcessRecord {
        id: ProcessId::generate(),
        process_type,
        version: VersionToken::generate(),
        lock_expiry_date: None,
        created_at: 0,
    }
}

fn step(process: &ProcessRecord, step_type: StepTypeId, status: StepStatus) -> StepRecord {
    StepRecord {
        id: StepId::generate(),
        process_id: process.id,
        step_type,
        status,
        message: None,
        retry_at: None,
        created_at: 0,
        updated_at: 0,
    }
}

#[test]
fn retry_module_retrigger_leaves_the_failed_step_untouched() {
    let temp = tempdir().expect("tempdir");
    let store = ProcessStore::open(&temp.path().join("procflow.db")).expect("open store");
    store.ensure_schema().expect("ensure schema");
    store.bootstrap_catalog().expect("bootstrap catalog");
    let created = store
        .create_process_with_steps(
            ProcessTypeId::ServiceAccountSync,
            &[StepTypeId::SynchronizeServiceAccounts],
            1,
        )
        .expect("create process");
    let original = created.steps[0].clone();

    let lease = LeaseManager::new(store.clone())
        .try_acquire(created.process.id, "worker-a", 30, 10)
        .expect("acquire");
    let controller = RetryDeclineController::default();
    let plan = controller.plan_failure(
        &original,
        FailureKind::Transient,
        "upstream timed out",
        &created.steps,
    );
    assert!(plan.yield_lease);
    assert!(plan.notifications.is_empty());
    assert_eq!(plan.retry_delay_secs, Some(5));
    let mut transition = plan.transition.clone();
    transition.appends_retry_at = Some(17);
    store
        .commit_step_transition(
            created.process.id,
            &ProcessUpdate::new(lease.version, Some(lease.expires_at)),
            &transition,
            12,
        )
        .expect("commit failure");

    let snapshot = store.read_process(created.process.id).expect("read");
    assert_eq!(snapshot.steps.len(), 2);
    let failed = snapshot.step(original.id).expect("original step");
    assert_eq!(failed.status, StepStatus::Failed);
    assert_eq!(failed.message.as_deref(), Some("upstream timed out"));
    assert_eq!(failed.created_at, original.created_at);

    let todo = snapshot
        .steps
        .iter()
        .filter(|step| step.status == StepStatus::Todo)
        .collect::<Vec<_>>();
    assert_eq!(todo.len(), 1);
    assert_eq!(
        todo[0].step_type,
        StepTypeId::RetriggerSynchronizeServiceAccounts
    );
    assert_ne!(todo[0].id, original.id);
    assert_eq!(todo[0].retry_at, Some(17));
    assert!(!todo[0].is_ready(16));
    assert!(todo[0].is_ready(17));
    assert_eq!(failed.retry_at, None);
}

#[test]
fn retry_module_exhaustion_appends_the_decline_step() {
    let process = process(ProcessTypeId::ApplicationChecklist);
    let steps = vec![
        step(&process, StepTypeId::StartClearingHouse, StepStatus::Failed),
        step(&process, StepTypeId::RetriggerClearingHouse, StepStatus::Failed),
        step(&process, StepTypeId::RetriggerClearingHouse, StepStatus::Todo),
        step(&process, StepTypeId::StartSelfDescriptionLp, StepStatus::Todo),
    ];
    let controller = RetryDeclineController::new(RetryPolicy {
        max_retriggers: 2,
        ..RetryPolicy::default()
    });

    let plan = controller.plan_failure(&steps[2], FailureKind::Transient, "still down", &steps);

    assert_eq!(plan.transition.appends, vec![StepTypeId::DeclineApplication]);
    assert_eq!(plan.transition.updates.len(), 2);
    assert_eq!(plan.transition.updates[0].step_id, steps[2].id);
    assert_eq!(plan.transition.updates[0].status, StepStatus::Failed);
    assert!(plan.transition.updates[0]
        .message
        .as_deref()
        .unwrap_or_default()
        .contains("retries exhausted after 3 attempts"));
    assert_eq!(plan.transition.updates[1].step_id, steps[3].id);
    assert_eq!(plan.transition.updates[1].status, StepStatus::Skipped);
    assert_eq!(plan.notifications.len(), 1);
    assert_eq!(
        plan.notifications[0].notification_type,
        NotificationType::RetriesExhausted
    );
}

#[test]
fn retry_module_within_cap_appends_exactly_one_retrigger() {
    let process = process(ProcessTypeId::ApplicationChecklist);
    let steps = vec![
        step(&process, StepTypeId::StartClearingHouse, StepStatus::Failed),
        step(&process, StepTypeId::RetriggerClearingHouse, StepStatus::Todo),
    ];
    let controller = RetryDeclineController::default();

    let plan = controller.plan_failure(&steps[1], FailureKind::Transient, "blip", &steps);
    assert_eq!(
        plan.transition.appends,
        vec![StepTypeId::RetriggerClearingHouse]
    );
    assert_eq!(plan.transition.updates.len(), 1);
    assert_eq!(plan.retry_delay_secs, Some(10));
}

#[test]
fn retry_module_exhaustion_without_decline_path_leaves_the_branch_failed() {
    let process = process(ProcessTypeId::ServiceAccountSync);
    let steps = vec![step(
        &process,
        StepTypeId::SynchronizeServiceAccounts,
        StepStatus::Todo,
    )];
    let controller = RetryDeclineController::new(RetryPolicy {
        max_retriggers: 0,
        ..RetryPolicy::default()
    });

    let plan = controller.plan_failure(&steps[0], FailureKind::Transient, "down", &steps);
    assert!(plan.transition.appends.is_empty());
    assert_eq!(plan.transition.updates.len(), 1);
    assert_eq!(
        plan.notifications[0].notification_type,
        NotificationType::RetriesExhausted
    );
}

#[test]
fn retry_module_business_decline_closes_the_branch() {
    let process = process(ProcessTypeId::OfferSubscription);
    let steps = vec![
        step(&process, StepTypeId::ActivateSubscription, StepStatus::Todo),
        step(&process, StepTypeId::TriggerProviderCallback, StepStatus::Todo),
    ];
    let controller = RetryDeclineController::default();

    let plan = controller.plan_failure(
        &steps[0],
        FailureKind::BusinessDecline,
        "offer withdrawn",
        &steps,
    );
    assert_eq!(plan.transition.appends, vec![StepTypeId::DeclineSubscription]);
    assert_eq!(plan.transition.updates[0].status, StepStatus::Failed);
    assert_eq!(plan.transition.updates[1].status, StepStatus::Skipped);
    assert_eq!(
        plan.notifications[0].notification_type,
        NotificationType::StepDeclined
    );
    assert_eq!(
        plan.notifications[0].subject_ids,
        vec![process.id.to_string(), steps[0].id.to_string()]
    );
}

#[test]
fn retry_module_pending_decline_is_not_appended_twice() {
    let process = process(ProcessTypeId::CertificateApproval);
    let steps = vec![
        step(&process, StepTypeId::DeclineCertificate, StepStatus::Todo),
        step(&process, StepTypeId::PublishCertificate, StepStatus::Todo),
    ];
    let controller = RetryDeclineController::default();

    let plan = controller.plan_failure(
        &steps[1],
        FailureKind::BusinessDecline,
        "revoked",
        &steps,
    );
    assert!(plan.transition.appends.is_empty());
}

#[test]
fn retry_module_operator_decline_requires_a_decline_path() {
    let controller = RetryDeclineController::default();

    let sync = process(ProcessTypeId::ServiceAccountSync);
    let err = controller
        .plan_operator_decline(&sync, StepTypeId::SynchronizeServiceAccounts, "ops", &[])
        .expect_err("no decline path");
    assert!(matches!(err, EngineError::NoDeclinePath { .. }));

    let checklist = process(ProcessTypeId::ApplicationChecklist);
    let err = controller
        .plan_operator_decline(&checklist, StepTypeId::VerifyCertificate, "ops", &[])
        .expect_err("foreign step type");
    assert!(matches!(err, EngineError::StepTypeMismatch { .. }));

    let steps = vec![step(
        &checklist,
        StepTypeId::VerifyRegistration,
        StepStatus::Todo,
    )];
    let plan = controller
        .plan_operator_decline(&checklist, StepTypeId::VerifyRegistration, "ops", &steps)
        .expect("decline planned");
    assert_eq!(plan.transition.appends, vec![StepTypeId::DeclineApplication]);
    assert_eq!(plan.transition.updates[0].status, StepStatus::Skipped);
}
