//! Lifecycle flows over SQLite and the HTTP clients, including the audit
//! gate driven through the audit message worker.

#![allow(dead_code)]

#[path = "support.rs"]
mod support;

use std::time::Duration;

use datapush_core::{OperationOutcome, PushJobRepository};
use datapush_domain::{AuditState, DataPushError, Operation, PushStatus};
use datapush_infra::{AuditMessageWorker, AuditWorkerConfig};
use serde_json::json;
use support::{at, ok, rejected, request, Stack};
use wiremock::matchers::{body_partial_json, method, path, path_regex, query_param};
use wiremock::{Mock, ResponseTemplate};

async fn mount_unbound_audit(stack: &Stack) {
    Mock::given(method("GET"))
        .and(path("/audit/processes/bound"))
        .respond_with(ok(json!(null)))
        .mount(&stack.server)
        .await;
}

async fn mount_engine_accepts(stack: &Stack) {
    Mock::given(method("POST"))
        .and(path("/engine/models"))
        .respond_with(ok(json!(null)))
        .mount(&stack.server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/engine/models/[^/]+/run$"))
        .respond_with(ok(json!(null)))
        .mount(&stack.server)
        .await;
}

async fn wait_for_status(stack: &Stack, job_id: &str, expected: PushStatus) -> bool {
    for _ in 0..100 {
        let job = stack.repository.get(job_id).await.expect("get").expect("job exists");
        if job.status == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread")]
async fn test_create_job_falls_back_to_static_mapping_when_service_is_down() {
    let stack = Stack::start().await;
    Mock::given(method("POST"))
        .and(path("/mapping/type-mappings"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&stack.server)
        .await;

    let created = stack.service.create_job(request("orders")).await.expect("create");
    let loaded = stack.service.get_job(&created.id).await.expect("get");

    assert_eq!(loaded.status, PushStatus::Draft);
    assert_eq!(loaded.tenant_id, support::TENANT);
    let types: Vec<&str> = loaded.fields.iter().map(|f| f.target_type.as_str()).collect();
    assert_eq!(types, ["BIGINT", "DECIMAL", "DATETIME"]);
    assert!(loaded.sql.create_sql.as_deref().is_some_and(|sql| sql.contains("orders_copy")));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unbound_publish_registers_model_and_runs() {
    let stack = Stack::start().await;
    mount_unbound_audit(&stack).await;
    Mock::given(method("POST"))
        .and(path("/engine/models"))
        .and(body_partial_json(json!({ "sourceDatasourceId": "ds-src" })))
        .respond_with(ok(json!(null)))
        .expect(1)
        .mount(&stack.server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/engine/models/[^/]+/run$"))
        .respond_with(ok(json!(null)))
        .expect(1)
        .mount(&stack.server)
        .await;

    let job = stack.service.create_job(request("orders")).await.expect("create");
    let outcome = stack.service.operate(&job.id, Operation::Publish).await.expect("publish");

    assert_eq!(outcome, OperationOutcome::Applied(PushStatus::Going));
    let loaded = stack.service.get_job(&job.id).await.expect("get");
    assert_eq!(loaded.status, PushStatus::Going);
    assert_eq!(loaded.published_at, Some(at("2024-06-01 12:00:00")));
    assert!(loaded.error_message.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_engine_rejection_keeps_status_and_records_error() {
    let stack = Stack::start().await;
    mount_unbound_audit(&stack).await;
    Mock::given(method("POST"))
        .and(path("/engine/models"))
        .respond_with(rejected(200, 80004, "datasource unreachable"))
        .mount(&stack.server)
        .await;

    let job = stack.service.create_job(request("orders")).await.expect("create");
    let err = stack.service.operate(&job.id, Operation::Publish).await.expect_err("rejected");

    assert!(matches!(err, DataPushError::SyncEngine { code: Some(80004), .. }), "{err:?}");
    let loaded = stack.service.get_job(&job.id).await.expect("get");
    assert_eq!(loaded.status, PushStatus::Draft);
    assert!(loaded.error_message.is_some());
    assert!(loaded.published_at.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_audited_publish_completes_through_worker() {
    let stack = Stack::start().await;
    Mock::given(method("GET"))
        .and(path("/audit/processes/bound"))
        .and(query_param("auditType", "push-publish"))
        .respond_with(ok(json!({ "processId": "proc-1", "auditType": "push-publish" })))
        .mount(&stack.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/audit/applies"))
        .and(body_partial_json(json!({ "processId": "proc-1", "auditType": "push-publish" })))
        .respond_with(ok(json!(null)))
        .expect(1)
        .mount(&stack.server)
        .await;
    mount_engine_accepts(&stack).await;

    let job = stack.service.create_job(request("orders")).await.expect("create");
    let apply_id = match stack.service.operate(&job.id, Operation::Publish).await.expect("publish") {
        OperationOutcome::AwaitingAudit { apply_id } => apply_id,
        other => panic!("expected audit gate, got {other:?}"),
    };

    let waiting = stack.service.get_job(&job.id).await.expect("get");
    assert_eq!(waiting.status, PushStatus::Waiting);
    assert_eq!(waiting.audit_state, AuditState::Auditing);
    assert_eq!(waiting.apply_id.as_deref(), Some(apply_id.as_str()));

    let mut worker = AuditMessageWorker::new(stack.service.lifecycle(), AuditWorkerConfig::default());
    let sender = worker.start().expect("worker starts");

    sender.deliver("not json").await.expect("queued");
    sender
        .deliver(json!({ "kind": "result", "applyId": apply_id, "pass": true }).to_string())
        .await
        .expect("queued");

    assert!(wait_for_status(&stack, &job.id, PushStatus::Going).await, "job never went live");
    worker.stop().await.expect("worker stops");

    let live = stack.service.get_job(&job.id).await.expect("get");
    assert_eq!(live.audit_state, AuditState::Pass);
    assert!(live.pending_operation.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_audit_leaves_job_waiting() {
    let stack = Stack::start().await;
    Mock::given(method("GET"))
        .and(path("/audit/processes/bound"))
        .respond_with(ok(json!({ "processId": "proc-1", "auditType": "push-publish" })))
        .mount(&stack.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/audit/applies"))
        .respond_with(ok(json!(null)))
        .mount(&stack.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/engine/models"))
        .respond_with(ok(json!(null)))
        .expect(0)
        .mount(&stack.server)
        .await;

    let job = stack.service.create_job(request("orders")).await.expect("create");
    let OperationOutcome::AwaitingAudit { apply_id } =
        stack.service.operate(&job.id, Operation::Publish).await.expect("publish")
    else {
        panic!("expected audit gate");
    };

    let message = datapush_domain::AuditMessage::Result {
        apply_id,
        pass: false,
        comment: Some("missing owner".into()),
    };
    stack.service.handle_audit_message(&message).await.expect("verdict handled");

    let loaded = stack.service.get_job(&job.id).await.expect("get");
    assert_eq!(loaded.status, PushStatus::Waiting);
    assert_eq!(loaded.audit_state, AuditState::Reject);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_delete_is_logical_and_hides_job() {
    let stack = Stack::start().await;

    let job = stack.service.create_job(request("orders")).await.expect("create");
    stack.service.delete_job(&job.id).await.expect("delete");

    let err = stack.service.get_job(&job.id).await.expect_err("deleted");
    assert!(matches!(err, DataPushError::NotFound(_)), "{err:?}");

    let conn = stack.db.manager.get_connection().expect("connection");
    let deleted: i64 = conn
        .query_row("SELECT deleted FROM push_job WHERE id = ?1", [&job.id], |row| row.get(0))
        .expect("row kept");
    assert_eq!(deleted, 1);
}
