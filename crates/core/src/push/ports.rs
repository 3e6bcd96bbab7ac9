//! Port interfaces for push job persistence and external collaborators

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use datapush_domain::{
    AuditApply, AuditProcess, AuditState, CompletionEvent, DesensitizationRule, Dialect,
    ExecutionHistory, HistoryPage, Operation, ProcessingModel, PushJob, PushStatus,
    ResolvedColumnType, Result, Schedule, SourceColumnType, WorkflowSpec,
};

/// Persistence contract for push jobs and their field rows.
///
/// Each method is atomic on its own; no cross-call transaction is assumed.
#[async_trait]
pub trait PushJobRepository: Send + Sync {
    /// Insert a job together with its fields
    async fn create(&self, job: &PushJob) -> Result<()>;

    /// Get a job with its fields; logically deleted jobs are not returned
    async fn get(&self, id: &str) -> Result<Option<PushJob>>;

    /// Replace the job row and its fields wholesale
    async fn update(&self, job: &PushJob) -> Result<()>;

    /// Update only the status column
    async fn update_status(&self, id: &str, status: PushStatus) -> Result<()>;

    /// Record a successful materialization: status plus publication time
    async fn mark_published(
        &self,
        id: &str,
        status: PushStatus,
        published_at: NaiveDateTime,
    ) -> Result<()>;

    /// Update only the five schedule columns
    async fn update_schedule(&self, id: &str, schedule: &Schedule) -> Result<()>;

    /// Store or clear the encoded draft schedule
    async fn save_draft_schedule(&self, id: &str, draft: Option<&str>) -> Result<()>;

    /// Update the audit state together with the apply id and pending operation
    async fn update_audit(
        &self,
        id: &str,
        state: AuditState,
        apply_id: Option<&str>,
        pending: Option<Operation>,
    ) -> Result<()>;

    /// Set or clear the operator-visible error field
    async fn update_error(&self, id: &str, error: Option<&str>) -> Result<()>;

    /// Find the job an audit apply was submitted for
    async fn find_by_apply_id(&self, apply_id: &str) -> Result<Option<PushJob>>;

    /// Jobs in `Starting`/`Going` with an acceptable audit state whose
    /// schedule is due at `now`
    async fn list_unfinished(&self, now: NaiveDateTime) -> Result<Vec<PushJob>>;

    /// Jobs awaiting audit for the given pending operation
    async fn list_auditing(&self, pending: Operation) -> Result<Vec<PushJob>>;

    /// Logically delete a job and its fields
    async fn delete(&self, id: &str) -> Result<()>;
}

/// External sync-execution engine
#[async_trait]
pub trait SyncEngine: Send + Sync {
    /// Register the generated statement bundle for a job
    async fn create_processing_model(&self, model: &ProcessingModel) -> Result<()>;

    /// Trigger an immediate run
    async fn run(&self, job_id: &str) -> Result<()>;

    /// Register a scheduled workflow (created online)
    async fn create_workflow(&self, spec: &WorkflowSpec) -> Result<()>;

    /// Replace the schedule of an existing workflow
    async fn update_workflow(&self, spec: &WorkflowSpec) -> Result<()>;

    /// Enable or disable an existing workflow
    async fn update_workflow_online(&self, job_id: &str, enabled: bool) -> Result<()>;

    async fn delete_workflow(&self, job_id: &str) -> Result<()>;

    async fn query_execution_history(
        &self,
        job_id: &str,
        page: HistoryPage,
    ) -> Result<ExecutionHistory>;
}

/// External type-mapping / catalog service
#[async_trait]
pub trait TypeMappingService: Send + Sync {
    /// Map a vector of source column types; results are matched by index
    async fn map_types(
        &self,
        source: &Dialect,
        target: &Dialect,
        columns: &[SourceColumnType],
    ) -> Result<Vec<ResolvedColumnType>>;

    /// Flat source-type to target-type dictionary from connector configuration
    async fn connector_dictionary(
        &self,
        source: &Dialect,
        target: &Dialect,
    ) -> Result<HashMap<String, String>>;
}

/// External audit/workflow service
#[async_trait]
pub trait AuditService: Send + Sync {
    /// Approval process bound to an audit type, if any
    async fn bound_process(&self, audit_type: &str) -> Result<Option<AuditProcess>>;

    async fn submit_apply(&self, apply: &AuditApply) -> Result<()>;

    async fn revoke_apply(&self, apply_id: &str) -> Result<()>;
}

/// External masking-rule service
#[async_trait]
pub trait MaskingRuleService: Send + Sync {
    /// Batch-fetch rule definitions; unknown ids are simply absent
    async fn fetch_rules(&self, ids: &[String]) -> Result<Vec<DesensitizationRule>>;
}

/// External consumer of "task completed" events
#[async_trait]
pub trait CompletionCallbackSink: Send + Sync {
    async fn notify_completed(&self, event: &CompletionEvent) -> Result<()>;
}

/// Source of the current local time
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock in local time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}
