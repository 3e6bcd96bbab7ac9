//! Push lifecycle transitions, the audit gate and sync engine failures

mod support;

use datapush_core::OperationOutcome;
use datapush_domain::constants::{AUDIT_TYPE_CHANGE, AUDIT_TYPE_PUBLISH, AUDIT_TYPE_STOP};
use datapush_domain::{
    AuditMessage, AuditState, DataPushError, Operation, PushJob, PushStatus, ScheduleType,
};
use support::fixtures::{at, once, period, request};
use support::{EngineCall, Harness};

async fn published(harness: &Harness, schedule: datapush_domain::ScheduleBody) -> PushJob {
    let mut req = request("orders");
    req.schedule = schedule;
    let job = harness.service.create_job(req).await.expect("job should be created");
    harness.service.operate(&job.id, Operation::Publish).await.expect("publish should succeed");
    harness.repository.job(&job.id)
}

#[tokio::test]
async fn test_publish_immediate_runs_once_and_goes() {
    let harness = Harness::new();
    let job = harness.service.create_job(request("orders")).await.expect("job should be created");

    let outcome = harness.service.operate(&job.id, Operation::Publish).await.expect("publish");

    assert_eq!(outcome, OperationOutcome::Applied(PushStatus::Going));
    assert_eq!(harness.engine.calls(), vec![
        EngineCall::CreateModel(job.id.clone()),
        EngineCall::Run(job.id.clone()),
    ]);
    let stored = harness.repository.job(&job.id);
    assert_eq!(stored.status, PushStatus::Going);
    assert_eq!(stored.published_at, Some(at("2024-06-01 12:00:00")));
    assert_eq!(harness.engine.models()[0].sql, job.sql);
}

#[tokio::test]
async fn test_publish_future_schedule_registers_workflow() {
    let harness = Harness::new();

    let job = published(&harness, once("2024-06-02 08:00:00")).await;

    assert_eq!(job.status, PushStatus::Starting);
    assert_eq!(harness.engine.calls(), vec![
        EngineCall::CreateModel(job.id.clone()),
        EngineCall::CreateWorkflow(job.id.clone()),
    ]);
}

#[tokio::test]
async fn test_starting_job_stops_and_rejects_publish() {
    let harness = Harness::new();
    let job = published(&harness, once("2024-06-02 08:00:00")).await;

    let outcome = harness.service.operate(&job.id, Operation::Stop).await.expect("stop");

    assert_eq!(outcome, OperationOutcome::Applied(PushStatus::Stopped));
    assert!(harness.engine.calls().contains(&EngineCall::Online(job.id.clone(), false)));
    assert_eq!(harness.repository.job(&job.id).status, PushStatus::Stopped);

    let err = harness
        .service
        .operate(&job.id, Operation::Publish)
        .await
        .expect_err("stopped job cannot be published");
    assert!(matches!(err, DataPushError::InvalidOperation(_)), "{err:?}");

    let fresh = published(&harness, once("2024-06-03 08:00:00")).await;
    let err = harness
        .service
        .operate(&fresh.id, Operation::Publish)
        .await
        .expect_err("starting job cannot be published again");
    assert!(matches!(err, DataPushError::InvalidOperation(_)), "{err:?}");
}

#[tokio::test]
async fn test_change_applies_draft_schedule() {
    let harness = Harness::new();
    let job = published(&harness, once("2024-06-01 00:00:00")).await;
    assert_eq!(job.status, PushStatus::Going);

    let mut edit = request("orders");
    edit.schedule = period("2024-07-01", "2024-07-31", "0 0 2 * * ?");
    let edited = harness.service.update_job(&job.id, edit).await.expect("draft edit");
    assert!(edited.draft_schedule.is_some());
    assert_eq!(harness.repository.job(&job.id).schedule.schedule_type, ScheduleType::Once);

    let outcome = harness.service.operate(&job.id, Operation::Change).await.expect("change");

    assert_eq!(outcome, OperationOutcome::Applied(PushStatus::Starting));
    let stored = harness.repository.job(&job.id);
    assert_eq!(stored.schedule.schedule_type, ScheduleType::Period);
    assert_eq!(stored.schedule.crontab.as_deref(), Some("0 0 2 * * ?"));
    assert!(stored.draft_schedule.is_none());
    assert!(harness.engine.calls().contains(&EngineCall::UpdateWorkflow(job.id.clone())));
}

#[tokio::test]
async fn test_restart_immediate_job_runs_again() {
    let harness = Harness::new();
    let job = harness.service.create_job(request("orders")).await.expect("job should be created");
    harness.service.operate(&job.id, Operation::Publish).await.expect("publish");
    harness.service.operate(&job.id, Operation::Stop).await.expect("stop");

    let outcome = harness.service.operate(&job.id, Operation::Restart).await.expect("restart");

    assert_eq!(outcome, OperationOutcome::Applied(PushStatus::Going));
    let runs = harness.engine.calls().iter().filter(|c| matches!(c, EngineCall::Run(_))).count();
    assert_eq!(runs, 2);
}

#[tokio::test]
async fn test_rerun_of_immediate_job_moves_publication_anchor() {
    let harness = Harness::new();
    let job = harness.service.create_job(request("orders")).await.expect("job should be created");
    harness.service.operate(&job.id, Operation::Publish).await.expect("publish");
    assert_eq!(harness.repository.job(&job.id).published_at, Some(at("2024-06-01 12:00:00")));

    harness.service.operate(&job.id, Operation::Stop).await.expect("stop");
    harness.clock.set("2024-06-01 15:30:00");
    harness.service.operate(&job.id, Operation::Restart).await.expect("restart");
    assert_eq!(harness.repository.job(&job.id).published_at, Some(at("2024-06-01 15:30:00")));

    harness.clock.set("2024-06-01 16:00:00");
    let outcome = harness.service.operate(&job.id, Operation::Change).await.expect("change");
    assert_eq!(outcome, OperationOutcome::Applied(PushStatus::Going));
    let stored = harness.repository.job(&job.id);
    assert_eq!(stored.published_at, Some(at("2024-06-01 16:00:00")));
    let runs = harness.engine.calls().iter().filter(|c| matches!(c, EngineCall::Run(_))).count();
    assert_eq!(runs, 3);
}

#[tokio::test]
async fn test_change_audit_shows_the_draft_schedule() {
    let harness = Harness::new();
    let job = published(&harness, once("2024-06-01 00:00:00")).await;
    let mut edit = request("orders");
    edit.schedule = period("2024-07-01", "2024-07-31", "0 0 2 * * ?");
    harness.service.update_job(&job.id, edit).await.expect("draft edit");
    harness.audit.bind(AUDIT_TYPE_CHANGE);

    harness.service.operate(&job.id, Operation::Change).await.expect("submitted");

    let submitted = harness.audit.submitted();
    assert_eq!(submitted.len(), 1);
    let metadata = &submitted[0].metadata;
    assert_eq!(metadata["schedule"]["scheduleType"], "PERIOD");
    assert_eq!(metadata["schedule"]["crontab"], "0 0 2 * * ?");
    assert_eq!(metadata["currentSchedule"]["scheduleType"], "ONCE");
    assert_eq!(metadata["currentSchedule"]["onceTime"], "2024-06-01 00:00:00");
}

#[tokio::test]
async fn test_publish_audit_without_draft_has_no_current_schedule() {
    let harness = Harness::new();
    harness.audit.bind(AUDIT_TYPE_PUBLISH);
    let job = harness.service.create_job(request("orders")).await.expect("job should be created");

    harness.service.operate(&job.id, Operation::Publish).await.expect("submitted");

    let metadata = &harness.audit.submitted()[0].metadata;
    assert_eq!(metadata["schedule"]["scheduleType"], "ONCE");
    assert!(metadata["currentSchedule"].is_null());
}

#[tokio::test]
async fn test_engine_failure_is_recorded_on_job() {
    let harness = Harness::new();
    let job = harness.service.create_job(request("orders")).await.expect("job should be created");
    harness.engine.fail_next(DataPushError::SyncEngine {
        code: Some(80004),
        message: "workflow already scheduled".into(),
    });

    let err = harness.service.operate(&job.id, Operation::Publish).await.expect_err("engine fails");

    assert!(matches!(err, DataPushError::SyncEngine { .. }), "{err:?}");
    let stored = harness.repository.job(&job.id);
    assert_eq!(stored.status, PushStatus::Draft);
    let note = stored.error_message.expect("error recorded");
    assert!(note.starts_with("scheduling conflict"), "{note}");

    harness.service.operate(&job.id, Operation::Publish).await.expect("retry succeeds");
    assert!(harness.repository.job(&job.id).error_message.is_none());
}

#[tokio::test]
async fn test_audit_gate_suspends_and_resumes_publish() {
    let harness = Harness::new();
    harness.audit.bind(AUDIT_TYPE_PUBLISH);
    let job = harness.service.create_job(request("orders")).await.expect("job should be created");

    let outcome = harness.service.operate(&job.id, Operation::Publish).await.expect("submitted");

    let OperationOutcome::AwaitingAudit { apply_id } = outcome else {
        panic!("expected audit submission, got {outcome:?}");
    };
    let waiting = harness.repository.job(&job.id);
    assert_eq!(waiting.status, PushStatus::Waiting);
    assert_eq!(waiting.audit_state, AuditState::Auditing);
    assert_eq!(waiting.pending_operation, Some(Operation::Publish));
    assert!(harness.engine.calls().is_empty());

    let submitted = harness.audit.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].audit_type, AUDIT_TYPE_PUBLISH);
    assert_eq!(submitted[0].process_id, "proc-push-publish");

    let err = harness.service.operate(&job.id, Operation::Publish).await.expect_err("gated");
    assert!(matches!(err, DataPushError::InvalidOperation(_)));

    harness
        .service
        .handle_audit_message(&AuditMessage::Result { apply_id, pass: true, comment: None })
        .await
        .expect("verdict handled");

    let live = harness.repository.job(&job.id);
    assert_eq!(live.status, PushStatus::Going);
    assert_eq!(live.audit_state, AuditState::Pass);
    assert_eq!(live.pending_operation, None);
    assert!(harness.engine.calls().contains(&EngineCall::Run(job.id.clone())));
}

#[tokio::test]
async fn test_failed_execution_after_pass_keeps_operation_pending() {
    let harness = Harness::new();
    harness.audit.bind(AUDIT_TYPE_PUBLISH);
    let job = harness.service.create_job(request("orders")).await.expect("job should be created");
    let OperationOutcome::AwaitingAudit { apply_id } =
        harness.service.operate(&job.id, Operation::Publish).await.expect("submitted")
    else {
        panic!("expected audit submission");
    };
    harness.engine.fail_next(DataPushError::Network("engine unreachable".into()));

    let err = harness
        .service
        .handle_audit_message(&AuditMessage::Result { apply_id, pass: true, comment: None })
        .await
        .expect_err("execution fails");

    assert!(matches!(err, DataPushError::Network(_)), "{err:?}");
    let stored = harness.repository.job(&job.id);
    assert_eq!(stored.status, PushStatus::Waiting);
    assert_eq!(stored.audit_state, AuditState::Pass);
    assert_eq!(stored.pending_operation, Some(Operation::Publish));
    assert!(stored.error_message.is_some());
}

#[tokio::test]
async fn test_rejected_audit_leaves_status() {
    let harness = Harness::new();
    harness.audit.bind(AUDIT_TYPE_PUBLISH);
    let job = harness.service.create_job(request("orders")).await.expect("job should be created");
    let OperationOutcome::AwaitingAudit { apply_id } =
        harness.service.operate(&job.id, Operation::Publish).await.expect("submitted")
    else {
        panic!("expected audit submission");
    };

    harness
        .service
        .handle_audit_message(&AuditMessage::Result {
            apply_id: apply_id.clone(),
            pass: false,
            comment: Some("target not approved".into()),
        })
        .await
        .expect("verdict handled");

    let stored = harness.repository.job(&job.id);
    assert_eq!(stored.status, PushStatus::Waiting);
    assert_eq!(stored.audit_state, AuditState::Reject);
    assert!(harness.engine.calls().is_empty());

    // A second verdict for the same apply is stale.
    harness
        .service
        .handle_audit_message(&AuditMessage::Result { apply_id, pass: true, comment: None })
        .await
        .expect("stale verdict dropped");
    assert_eq!(harness.repository.job(&job.id).status, PushStatus::Waiting);
}

#[tokio::test]
async fn test_revoke_withdraws_pending_apply() {
    let harness = Harness::new();
    harness.audit.bind(AUDIT_TYPE_STOP);
    let job = published(&harness, once("2024-06-02 08:00:00")).await;

    harness.service.operate(&job.id, Operation::Stop).await.expect("submitted");
    let apply_id = harness.repository.job(&job.id).apply_id.expect("apply id stored");

    harness.service.revoke_audit(&job.id).await.expect("revoked");

    assert_eq!(harness.audit.revoked(), vec![apply_id.clone()]);
    let stored = harness.repository.job(&job.id);
    assert_eq!(stored.audit_state, AuditState::Revocation);
    assert_eq!(stored.apply_id.as_deref(), Some(apply_id.as_str()));
    assert_eq!(stored.status, PushStatus::Starting);

    let err = harness.service.revoke_audit(&job.id).await.expect_err("nothing to revoke");
    assert!(matches!(err, DataPushError::InvalidOperation(_)));
}

#[tokio::test]
async fn test_definition_deleted_reverts_auditing_jobs() {
    let harness = Harness::new();
    harness.audit.bind(AUDIT_TYPE_PUBLISH);
    let job = harness.service.create_job(request("orders")).await.expect("job should be created");
    harness.service.operate(&job.id, Operation::Publish).await.expect("submitted");

    harness
        .service
        .handle_audit_message(&AuditMessage::DefinitionDeleted {
            audit_type: AUDIT_TYPE_PUBLISH.to_string(),
        })
        .await
        .expect("handled");

    let stored = harness.repository.job(&job.id);
    assert_eq!(stored.audit_state, AuditState::Unaudited);
    assert_eq!(stored.pending_operation, None);
    assert_eq!(stored.apply_id, None);
}

#[tokio::test]
async fn test_malformed_apply_id_is_dropped() {
    let harness = Harness::new();

    harness
        .service
        .handle_audit_message(&AuditMessage::Result {
            apply_id: "not-a-uuid".into(),
            pass: true,
            comment: None,
        })
        .await
        .expect("malformed message is not an error");

    assert!(harness.engine.calls().is_empty());
}
