//! In-memory port implementations

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use datapush_core::schedule::{is_due, parse_datetime};
use datapush_core::{
    AuditService, Clock, CompletionCallbackSink, MaskingRuleService, PushJobRepository,
    SyncEngine, TypeMappingService,
};
use datapush_domain::{
    AuditApply, AuditProcess, AuditState, CompletionEvent, DataPushError, DesensitizationRule,
    Dialect, ExecutionHistory, HistoryPage, Operation, ProcessingModel, PushJob, PushStatus,
    ResolvedColumnType, Result as DomainResult, Schedule, SourceColumnType, WorkflowSpec,
};

/// Job store keyed by id. Every status write is also logged so tests can
/// count persistence calls.
#[derive(Default)]
pub struct InMemoryPushJobRepository {
    jobs: Mutex<HashMap<String, PushJob>>,
    deleted: Mutex<Vec<String>>,
    status_writes: Mutex<Vec<(String, PushStatus)>>,
}

impl InMemoryPushJobRepository {
    pub fn insert(&self, job: PushJob) {
        self.jobs.lock().unwrap().insert(job.id.clone(), job);
    }

    pub fn job(&self, id: &str) -> PushJob {
        self.jobs.lock().unwrap().get(id).cloned().expect("job exists")
    }

    pub fn status_writes(&self) -> Vec<(String, PushStatus)> {
        self.status_writes.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    fn with_job<F>(&self, id: &str, f: F) -> DomainResult<()>
    where
        F: FnOnce(&mut PushJob),
    {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(id).ok_or_else(|| DataPushError::NotFound(id.to_string()))?;
        f(job);
        Ok(())
    }
}

#[async_trait]
impl PushJobRepository for InMemoryPushJobRepository {
    async fn create(&self, job: &PushJob) -> DomainResult<()> {
        self.insert(job.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> DomainResult<Option<PushJob>> {
        Ok(self.jobs.lock().unwrap().get(id).cloned())
    }

    async fn update(&self, job: &PushJob) -> DomainResult<()> {
        self.with_job(&job.id, |stored| *stored = job.clone())
    }

    async fn update_status(&self, id: &str, status: PushStatus) -> DomainResult<()> {
        self.status_writes.lock().unwrap().push((id.to_string(), status));
        self.with_job(id, |job| job.status = status)
    }

    async fn mark_published(
        &self,
        id: &str,
        status: PushStatus,
        published_at: NaiveDateTime,
    ) -> DomainResult<()> {
        self.status_writes.lock().unwrap().push((id.to_string(), status));
        self.with_job(id, |job| {
            job.status = status;
            job.published_at = Some(published_at);
        })
    }

    async fn update_schedule(&self, id: &str, schedule: &Schedule) -> DomainResult<()> {
        self.with_job(id, |job| job.schedule = schedule.clone())
    }

    async fn save_draft_schedule(&self, id: &str, draft: Option<&str>) -> DomainResult<()> {
        self.with_job(id, |job| job.draft_schedule = draft.map(str::to_string))
    }

    async fn update_audit(
        &self,
        id: &str,
        state: AuditState,
        apply_id: Option<&str>,
        pending: Option<Operation>,
    ) -> DomainResult<()> {
        self.with_job(id, |job| {
            job.audit_state = state;
            job.apply_id = apply_id.map(str::to_string);
            job.pending_operation = pending;
        })
    }

    async fn update_error(&self, id: &str, error: Option<&str>) -> DomainResult<()> {
        self.with_job(id, |job| job.error_message = error.map(str::to_string))
    }

    async fn find_by_apply_id(&self, apply_id: &str) -> DomainResult<Option<PushJob>> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .find(|job| job.apply_id.as_deref() == Some(apply_id))
            .cloned())
    }

    async fn list_unfinished(&self, now: NaiveDateTime) -> DomainResult<Vec<PushJob>> {
        let mut jobs: Vec<PushJob> = self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|job| matches!(job.status, PushStatus::Starting | PushStatus::Going))
            .filter(|job| job.audit_state.is_reconcilable())
            .filter(|job| is_due(&job.schedule, job.published_at, now))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(jobs)
    }

    async fn list_auditing(&self, pending: Operation) -> DomainResult<Vec<PushJob>> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|job| {
                job.audit_state == AuditState::Auditing && job.pending_operation == Some(pending)
            })
            .cloned()
            .collect())
    }

    async fn delete(&self, id: &str) -> DomainResult<()> {
        self.jobs.lock().unwrap().remove(id);
        self.deleted.lock().unwrap().push(id.to_string());
        Ok(())
    }
}

/// One recorded sync engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    CreateModel(String),
    Run(String),
    CreateWorkflow(String),
    UpdateWorkflow(String),
    Online(String, bool),
    DeleteWorkflow(String),
    History(String),
}

/// Records calls; can be told to fail the next mutating call.
#[derive(Default)]
pub struct MockSyncEngine {
    calls: Mutex<Vec<EngineCall>>,
    histories: Mutex<HashMap<String, ExecutionHistory>>,
    next_failure: Mutex<Option<DataPushError>>,
    models: Mutex<Vec<ProcessingModel>>,
}

impl MockSyncEngine {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn models(&self) -> Vec<ProcessingModel> {
        self.models.lock().unwrap().clone()
    }

    pub fn set_history(&self, job_id: &str, history: ExecutionHistory) {
        self.histories.lock().unwrap().insert(job_id.to_string(), history);
    }

    pub fn fail_next(&self, error: DataPushError) {
        *self.next_failure.lock().unwrap() = Some(error);
    }

    fn record(&self, call: EngineCall) -> DomainResult<()> {
        if let Some(error) = self.next_failure.lock().unwrap().take() {
            return Err(error);
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

#[async_trait]
impl SyncEngine for MockSyncEngine {
    async fn create_processing_model(&self, model: &ProcessingModel) -> DomainResult<()> {
        self.record(EngineCall::CreateModel(model.job_id.clone()))?;
        self.models.lock().unwrap().push(model.clone());
        Ok(())
    }

    async fn run(&self, job_id: &str) -> DomainResult<()> {
        self.record(EngineCall::Run(job_id.to_string()))
    }

    async fn create_workflow(&self, spec: &WorkflowSpec) -> DomainResult<()> {
        self.record(EngineCall::CreateWorkflow(spec.job_id.clone()))
    }

    async fn update_workflow(&self, spec: &WorkflowSpec) -> DomainResult<()> {
        self.record(EngineCall::UpdateWorkflow(spec.job_id.clone()))
    }

    async fn update_workflow_online(&self, job_id: &str, enabled: bool) -> DomainResult<()> {
        self.record(EngineCall::Online(job_id.to_string(), enabled))
    }

    async fn delete_workflow(&self, job_id: &str) -> DomainResult<()> {
        self.record(EngineCall::DeleteWorkflow(job_id.to_string()))
    }

    async fn query_execution_history(
        &self,
        job_id: &str,
        _page: HistoryPage,
    ) -> DomainResult<ExecutionHistory> {
        self.record(EngineCall::History(job_id.to_string()))?;
        Ok(self.histories.lock().unwrap().get(job_id).cloned().unwrap_or_default())
    }
}

/// Type-mapping service returning canned answers.
#[derive(Default)]
pub struct MockTypeMappingService {
    vector: Option<Vec<ResolvedColumnType>>,
    dictionary: Option<HashMap<String, String>>,
}

impl MockTypeMappingService {
    /// Both calls fail, forcing the built-in table.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn with_vector(vector: Vec<ResolvedColumnType>) -> Self {
        Self { vector: Some(vector), dictionary: None }
    }

    pub fn with_dictionary(dictionary: HashMap<String, String>) -> Self {
        Self { vector: Some(Vec::new()), dictionary: Some(dictionary) }
    }
}

#[async_trait]
impl TypeMappingService for MockTypeMappingService {
    async fn map_types(
        &self,
        _source: &Dialect,
        _target: &Dialect,
        _columns: &[SourceColumnType],
    ) -> DomainResult<Vec<ResolvedColumnType>> {
        self.vector
            .clone()
            .ok_or_else(|| DataPushError::Network("type mapping service unreachable".into()))
    }

    async fn connector_dictionary(
        &self,
        _source: &Dialect,
        _target: &Dialect,
    ) -> DomainResult<HashMap<String, String>> {
        self.dictionary
            .clone()
            .ok_or_else(|| DataPushError::Network("connector config unreachable".into()))
    }
}

/// Audit service with configurable bound processes.
#[derive(Default)]
pub struct MockAuditService {
    bound: Mutex<HashMap<String, AuditProcess>>,
    submitted: Mutex<Vec<AuditApply>>,
    revoked: Mutex<Vec<String>>,
}

impl MockAuditService {
    pub fn bind(&self, audit_type: &str) {
        self.bound.lock().unwrap().insert(
            audit_type.to_string(),
            AuditProcess { process_id: format!("proc-{audit_type}"), audit_type: audit_type.into() },
        );
    }

    pub fn submitted(&self) -> Vec<AuditApply> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn revoked(&self) -> Vec<String> {
        self.revoked.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditService for MockAuditService {
    async fn bound_process(&self, audit_type: &str) -> DomainResult<Option<AuditProcess>> {
        Ok(self.bound.lock().unwrap().get(audit_type).cloned())
    }

    async fn submit_apply(&self, apply: &AuditApply) -> DomainResult<()> {
        self.submitted.lock().unwrap().push(apply.clone());
        Ok(())
    }

    async fn revoke_apply(&self, apply_id: &str) -> DomainResult<()> {
        self.revoked.lock().unwrap().push(apply_id.to_string());
        Ok(())
    }
}

/// Masking rule service backed by a fixed list.
#[derive(Default)]
pub struct MockMaskingRuleService {
    rules: Mutex<Vec<DesensitizationRule>>,
}

impl MockMaskingRuleService {
    pub fn add(&self, rule: DesensitizationRule) {
        self.rules.lock().unwrap().push(rule);
    }
}

#[async_trait]
impl MaskingRuleService for MockMaskingRuleService {
    async fn fetch_rules(&self, ids: &[String]) -> DomainResult<Vec<DesensitizationRule>> {
        Ok(self.rules.lock().unwrap().iter().filter(|r| ids.contains(&r.id)).cloned().collect())
    }
}

/// Callback sink that records events, optionally failing each delivery.
#[derive(Default)]
pub struct RecordingCallbackSink {
    events: Mutex<Vec<CompletionEvent>>,
    fail: Mutex<bool>,
    delay: Mutex<Option<Duration>>,
}

impl RecordingCallbackSink {
    pub fn events(&self) -> Vec<CompletionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn fail_deliveries(&self) {
        *self.fail.lock().unwrap() = true;
    }

    /// Hold every delivery for `delay` before recording it.
    pub fn slow_deliveries(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl CompletionCallbackSink for RecordingCallbackSink {
    async fn notify_completed(&self, event: &CompletionEvent) -> DomainResult<()> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.events.lock().unwrap().push(event.clone());
        if *self.fail.lock().unwrap() {
            return Err(DataPushError::Downstream("callback consumer down".into()));
        }
        Ok(())
    }
}

/// Clock frozen at a settable instant.
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn at(raw: &str) -> Self {
        Self { now: Mutex::new(parse_datetime(raw, "clock").unwrap()) }
    }

    pub fn set(&self, raw: &str) {
        *self.now.lock().unwrap() = parse_datetime(raw, "clock").unwrap();
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap()
    }
}
