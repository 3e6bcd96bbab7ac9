//! Shared helpers for `datapush-infra` integration tests: a throwaway SQLite
//! database and a wiremock server standing in for every downstream service.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDateTime;
use datapush_core::{Clock, PushJobService, PushPorts, ReconcileSettings, StatusReconciler};
use datapush_domain::constants::DATETIME_FORMAT;
use datapush_domain::{
    Dialect, OneShotCompletion, PushField, PushJobRequest, ScheduleBody, ScheduleType,
    SourceTable, TargetLocation, TargetTable, TransmitMode,
};
use datapush_infra::{
    AuditClient, CallbackClient, DbManager, HttpClient, MaskingRuleClient, SqlitePushJobRepository,
    SyncEngineClient, TypeMappingClient,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::{MockServer, ResponseTemplate};

pub const TENANT: &str = "tenant-it";

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a migrated database in a fresh temp dir.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("datapush.db");

        let manager = DbManager::new(&db_path, 4).expect("db manager should be created");
        manager.run_migrations().expect("migrations should apply");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }

    pub fn repository(&self) -> Arc<SqlitePushJobRepository> {
        Arc::new(SqlitePushJobRepository::new(Arc::clone(&self.manager)))
    }

    /// Execute a batch of SQL statements against the database.
    pub fn execute_batch(&self, sql: &str) {
        let conn = self
            .manager
            .get_connection()
            .expect("connection should be available for execute_batch");
        conn.execute_batch(sql).expect("SQL batch execution should succeed");
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Clock pinned to a settable instant.
pub struct FixedClock(Mutex<NaiveDateTime>);

impl FixedClock {
    pub fn at(raw: &str) -> Self {
        Self(Mutex::new(at(raw)))
    }

    pub fn set(&self, raw: &str) {
        *self.0.lock().expect("clock lock") = at(raw);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.0.lock().expect("clock lock")
    }
}

pub fn at(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT).expect("fixture timestamp")
}

/// Everything a test needs: SQLite-backed service and reconciler whose
/// downstream clients all point at one wiremock server.
///
/// Paths on the server are prefixed per service: `/engine`, `/mapping`,
/// `/audit`, `/masking` and `/callback`.
pub struct Stack {
    pub db: TestDatabase,
    pub server: MockServer,
    pub clock: Arc<FixedClock>,
    pub repository: Arc<SqlitePushJobRepository>,
    pub service: PushJobService,
    pub reconciler: Arc<StatusReconciler>,
}

impl Stack {
    pub async fn start() -> Self {
        Self::with_policy(OneShotCompletion::AnyTerminal).await
    }

    pub async fn with_policy(policy: OneShotCompletion) -> Self {
        let db = TestDatabase::new();
        let server = MockServer::start().await;
        let clock = Arc::new(FixedClock::at("2024-06-01 12:00:00"));
        let repository = db.repository();
        let base = server.uri();

        let http = HttpClient::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("http client should build");
        let engine = Arc::new(SyncEngineClient::new(http.clone(), format!("{base}/engine")));

        let service = PushJobService::new(
            PushPorts {
                repository: repository.clone(),
                engine: engine.clone(),
                type_mapping: Arc::new(TypeMappingClient::new(http.clone(), format!("{base}/mapping"))),
                masking: Arc::new(MaskingRuleClient::new(http.clone(), format!("{base}/masking"))),
                audit: Arc::new(AuditClient::new(http.clone(), format!("{base}/audit"))),
                clock: clock.clone(),
            },
            TENANT,
        );

        let reconciler = Arc::new(StatusReconciler::new(
            repository.clone(),
            engine,
            Arc::new(CallbackClient::new(http, format!("{base}/callback"))),
            clock.clone(),
            ReconcileSettings {
                history_page_size: 10,
                one_shot_completion: policy,
                call_timeout: Duration::from_secs(5),
            },
        ));

        Self { db, server, clock, repository, service, reconciler }
    }
}

/// `{code: 0, msg: "ok", data}` response.
pub fn ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "msg": "ok", "data": data }))
}

/// Enveloped rejection carrying a service error code.
pub fn rejected(status: u16, code: i64, msg: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({ "code": code, "msg": msg, "data": null }))
}

pub fn field(source: &str, source_type: &str, target: &str) -> PushField {
    PushField {
        source_name: source.to_string(),
        source_type: source_type.to_string(),
        target_name: target.to_string(),
        target_business_name: String::new(),
        target_type: String::new(),
        length: None,
        precision: None,
        nullable: true,
        masking_rule_id: None,
    }
}

/// Immediate full-sync postgres to mysql request over `ods.orders`.
pub fn request(name: &str) -> PushJobRequest {
    PushJobRequest {
        name: name.to_string(),
        shadow: false,
        source: SourceTable {
            catalog_id: "cat-1".into(),
            table_id: "tbl-1".into(),
            table_name: "ods.orders".into(),
            datasource_id: "ds-src".into(),
            department_id: "dept-1".into(),
            dialect: Dialect::new("postgres"),
        },
        target: TargetTable {
            location: TargetLocation::Datasource("ds-tgt".into()),
            table_name: "orders_copy".into(),
            table_exists: false,
            dialect: Dialect::new("mysql"),
        },
        transmit_mode: TransmitMode::Full,
        increment_field: None,
        high_water_mark: None,
        update_existing: false,
        primary_keys: Vec::new(),
        filter_condition: None,
        masking_enabled: false,
        schedule: ScheduleBody { schedule_type: Some(ScheduleType::Once), ..ScheduleBody::default() },
        fields: vec![
            field("id", "INT8", "id"),
            field("amount", "NUMERIC", "amount"),
            field("updated_at", "TIMESTAMP", "updated_at"),
        ],
    }
}

/// One execution log entry in the engine's wire shape.
pub fn log_entry(start: &str, end: &str, rows: i64, status: &str) -> Value {
    json!({ "startTime": start, "endTime": end, "rowCount": rows, "status": status })
}

pub fn history(entries: Vec<Value>) -> Value {
    json!({ "total": entries.len(), "entries": entries })
}
