//! Push job service - request-level orchestration

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use datapush_domain::{
    split_primary_keys, AuditMessage, AuditState, DataPushError, DesensitizationRule,
    ExecutionHistory, HistoryPage, Operation, PushJob, PushJobRequest, PushStatus, Result,
    SynthesizedSql,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::ports::{
    AuditService, Clock, MaskingRuleService, PushJobRepository, SyncEngine, TypeMappingService,
};
use crate::lifecycle::{OperationOutcome, PushLifecycleStateMachine};
use crate::schedule::{parse_high_water_mark, schedule_from_body};
use crate::sql::{SqlSynthesisEngine, TypeMappingResolver};

/// Ports the push job service is wired with.
#[derive(Clone)]
pub struct PushPorts {
    pub repository: Arc<dyn PushJobRepository>,
    pub engine: Arc<dyn SyncEngine>,
    pub type_mapping: Arc<dyn TypeMappingService>,
    pub masking: Arc<dyn MaskingRuleService>,
    pub audit: Arc<dyn AuditService>,
    pub clock: Arc<dyn Clock>,
}

/// Push job service
pub struct PushJobService {
    repository: Arc<dyn PushJobRepository>,
    engine: Arc<dyn SyncEngine>,
    masking: Arc<dyn MaskingRuleService>,
    clock: Arc<dyn Clock>,
    synthesis: SqlSynthesisEngine,
    lifecycle: Arc<PushLifecycleStateMachine>,
    tenant_id: String,
}

impl PushJobService {
    /// Create a new push job service for one tenant
    pub fn new(ports: PushPorts, tenant_id: impl Into<String>) -> Self {
        let lifecycle = Arc::new(PushLifecycleStateMachine::new(
            Arc::clone(&ports.repository),
            Arc::clone(&ports.engine),
            Arc::clone(&ports.audit),
            Arc::clone(&ports.clock),
        ));
        Self {
            synthesis: SqlSynthesisEngine::new(TypeMappingResolver::new(ports.type_mapping)),
            repository: ports.repository,
            engine: ports.engine,
            masking: ports.masking,
            clock: ports.clock,
            lifecycle,
            tenant_id: tenant_id.into(),
        }
    }

    /// Lifecycle state machine shared with the audit message worker
    pub fn lifecycle(&self) -> Arc<PushLifecycleStateMachine> {
        Arc::clone(&self.lifecycle)
    }

    /// Validate, synthesize and persist a new job as `Draft` (or `Shadow`)
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_job(&self, request: PushJobRequest) -> Result<PushJob> {
        let now = self.clock.now();
        let status = if request.shadow { PushStatus::Shadow } else { PushStatus::Draft };
        let job = self.build_job(Uuid::now_v7().to_string(), request, status, now, now)?;
        let job = self.synthesize(job).await?;

        self.repository.create(&job).await?;
        info!(job_id = %job.id, status = %job.status, "push job created");
        Ok(job)
    }

    /// Update a job.
    ///
    /// Jobs not yet materialized are re-synthesized and their fields
    /// replaced. Live jobs only take a schedule edit, stored as a draft until
    /// a `Change` or `Restart` applies it.
    #[instrument(skip(self, request))]
    pub async fn update_job(&self, job_id: &str, request: PushJobRequest) -> Result<PushJob> {
        let job = self.get_job(job_id).await?;
        if job.audit_state == AuditState::Auditing {
            return Err(DataPushError::InvalidOperation(format!(
                "job {job_id} is awaiting audit and cannot be edited"
            )));
        }

        match job.status {
            PushStatus::Shadow | PushStatus::Draft | PushStatus::Waiting => {
                let status = if job.status == PushStatus::Shadow && !request.shadow {
                    PushStatus::Draft
                } else {
                    job.status
                };
                let rebuilt =
                    self.build_job(job.id.clone(), request, status, job.created_at, self.clock.now())?;
                let rebuilt = PushJob {
                    audit_state: job.audit_state,
                    apply_id: job.apply_id,
                    error_message: job.error_message,
                    ..rebuilt
                };
                let rebuilt = self.synthesize(rebuilt).await?;
                self.repository.update(&rebuilt).await?;
                info!(status = %rebuilt.status, "push job updated");
                Ok(rebuilt)
            }
            PushStatus::Starting | PushStatus::Going | PushStatus::Stopped => {
                schedule_from_body(&request.schedule)?;
                let draft = request.schedule.encode()?;
                self.repository.save_draft_schedule(&job.id, Some(&draft)).await?;
                info!("schedule edit stored as draft");
                Ok(PushJob { draft_schedule: Some(draft), ..job })
            }
            PushStatus::End => Err(DataPushError::InvalidOperation(format!(
                "job {job_id} has ended and cannot be edited"
            ))),
        }
    }

    pub async fn get_job(&self, job_id: &str) -> Result<PushJob> {
        self.repository
            .get(job_id)
            .await?
            .ok_or_else(|| DataPushError::NotFound(format!("push job {job_id}")))
    }

    /// Remove the external workflow of a live job, then delete job and fields
    #[instrument(skip(self))]
    pub async fn delete_job(&self, job_id: &str) -> Result<()> {
        let job = self.get_job(job_id).await?;
        if job.status.is_live() && !job.schedule.is_immediate() {
            self.engine.delete_workflow(&job.id).await?;
        }
        self.repository.delete(&job.id).await?;
        info!("push job deleted");
        Ok(())
    }

    /// Request a lifecycle operation
    pub async fn operate(&self, job_id: &str, operation: Operation) -> Result<OperationOutcome> {
        self.lifecycle.operate(job_id, operation).await
    }

    /// Withdraw a pending audit apply
    pub async fn revoke_audit(&self, job_id: &str) -> Result<()> {
        self.lifecycle.revoke(job_id).await
    }

    /// Handle a message from the audit service
    pub async fn handle_audit_message(&self, message: &AuditMessage) -> Result<()> {
        self.lifecycle.handle_audit_message(message).await
    }

    /// Execution history of a job as reported by the sync engine
    pub async fn execution_history(&self, job_id: &str, page: HistoryPage) -> Result<ExecutionHistory> {
        let job = self.get_job(job_id).await?;
        self.engine.query_execution_history(&job.id, page).await
    }

    fn build_job(
        &self,
        id: String,
        request: PushJobRequest,
        status: PushStatus,
        created_at: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<PushJob> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(DataPushError::Validation("job name is required".to_string()));
        }
        let schedule = schedule_from_body(&request.schedule)?;
        let high_water_mark = parse_high_water_mark(request.high_water_mark.as_deref())?;

        Ok(PushJob {
            id,
            tenant_id: self.tenant_id.clone(),
            name: name.to_string(),
            source: request.source,
            target: request.target,
            transmit_mode: request.transmit_mode,
            increment_field: non_blank(request.increment_field),
            high_water_mark,
            update_existing: request.update_existing,
            primary_keys: request.primary_keys.iter().flat_map(|k| split_primary_keys(k)).collect(),
            filter_condition: non_blank(request.filter_condition),
            masking_enabled: request.masking_enabled,
            sql: SynthesizedSql::default(),
            status,
            audit_state: AuditState::Unaudited,
            pending_operation: None,
            apply_id: None,
            schedule,
            draft_schedule: None,
            error_message: None,
            published_at: None,
            created_at,
            updated_at: now,
            fields: request.fields,
        })
    }

    async fn synthesize(&self, job: PushJob) -> Result<PushJob> {
        let rules = self.masking_rules(&job).await?;
        let synthesis = self.synthesis.synthesize(&job, &rules).await?;
        Ok(PushJob { sql: synthesis.sql, fields: synthesis.fields, ..job })
    }

    async fn masking_rules(&self, job: &PushJob) -> Result<HashMap<String, DesensitizationRule>> {
        if !job.masking_enabled {
            return Ok(HashMap::new());
        }
        let mut ids: Vec<String> = job
            .fields
            .iter()
            .filter_map(|f| f.masking_rule_id.as_deref())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        ids.sort();
        ids.dedup();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rules = self.masking.fetch_rules(&ids).await?;
        Ok(rules.into_iter().map(|rule| (rule.id.clone(), rule)).collect())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
