//! Integration tests for AppContext lifecycle
//!
//! The context is built against a temporary database with every downstream
//! service pointed at a WireMock server.

use datapush_app::AppContext;
use datapush_domain::{
    Config, DatabaseConfig, Dialect, PushField, PushJobRequest, PushStatus, ScheduleBody,
    ScheduleType, ServicesConfig, SourceTable, TargetLocation, TargetTable, TransmitMode,
};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(dir: &TempDir, base: &str) -> Config {
    Config {
        database: DatabaseConfig {
            path: dir.path().join("datapush.db").to_string_lossy().to_string(),
            pool_size: 2,
        },
        services: ServicesConfig {
            sync_engine_url: format!("{base}/engine"),
            type_mapping_url: format!("{base}/mapping"),
            audit_url: format!("{base}/audit"),
            masking_url: format!("{base}/masking"),
            callback_url: format!("{base}/callback"),
            timeout_secs: 5,
            api_token: Some("ctx-token".into()),
        },
        tenant_id: "tenant-ctx".into(),
        ..Config::default()
    }
}

fn request() -> PushJobRequest {
    let field = |name: &str, ty: &str| PushField {
        source_name: name.into(),
        source_type: ty.into(),
        target_name: name.into(),
        target_business_name: String::new(),
        target_type: String::new(),
        length: None,
        precision: None,
        nullable: true,
        masking_rule_id: None,
    };
    PushJobRequest {
        name: "ctx-orders".into(),
        shadow: true,
        source: SourceTable {
            catalog_id: "cat".into(),
            table_id: "tbl".into(),
            table_name: "ods.orders".into(),
            datasource_id: "ds-src".into(),
            department_id: "dept".into(),
            dialect: Dialect::new("mysql"),
        },
        target: TargetTable {
            location: TargetLocation::Sandbox("sbx-1".into()),
            table_name: "orders_copy".into(),
            table_exists: false,
            dialect: Dialect::new("postgres"),
        },
        transmit_mode: TransmitMode::Full,
        increment_field: None,
        high_water_mark: None,
        update_existing: false,
        primary_keys: Vec::new(),
        filter_condition: None,
        masking_enabled: false,
        schedule: ScheduleBody { schedule_type: Some(ScheduleType::Once), ..ScheduleBody::default() },
        fields: vec![field("id", "BIGINT"), field("note", "VARCHAR(64)")],
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_context_starts_serves_and_shuts_down() {
    let dir = TempDir::new().expect("temp dir");
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mapping/type-mappings"))
        .and(header("authorization", "Bearer ctx-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "data": [
                { "index": 0, "targetType": "INT8" },
                { "index": 1, "targetType": "VARCHAR" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = AppContext::new_with_config(test_config(&dir, &server.uri()))
        .await
        .expect("context should start");
    ctx.health_check().await.expect("healthy after start");

    let job = ctx.push_service.create_job(request()).await.expect("create");
    assert_eq!(job.status, PushStatus::Shadow);
    assert_eq!(job.tenant_id, "tenant-ctx");
    assert_eq!(job.fields[0].target_type, "INT8");

    ctx.audit_sender()
        .deliver(json!({ "kind": "definition_deleted", "auditType": "push-stop" }).to_string())
        .await
        .expect("audit worker accepts payloads");

    ctx.shutdown().await.expect("clean shutdown");
    assert!(ctx.health_check().await.is_err(), "workers are stopped");
    assert!(ctx.shutdown().await.is_err(), "second shutdown reports not running");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_context_fails_on_unusable_database_path() {
    let dir = TempDir::new().expect("temp dir");
    let mut config = test_config(&dir, "http://127.0.0.1:9");
    config.database.path = dir.path().join("missing").join("nested").join("db.sqlite")
        .to_string_lossy()
        .to_string();

    assert!(AppContext::new_with_config(config).await.is_err());
}
