//! Push lifecycle state machine
//!
//! `transition_for` is the dispatch table: every (status, operation) pair is
//! listed explicitly, so adding a status or operation fails to compile until
//! the table covers it.

use std::sync::Arc;

use chrono::NaiveDateTime;
use datapush_domain::{
    AuditApply, AuditProcess, AuditState, DataPushError, Operation, ProcessingModel, PushJob,
    PushStatus, Result, Schedule, ScheduleBody,
};
use serde_json::json;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::errors::error_note;
use crate::push::ports::{AuditService, Clock, PushJobRepository, SyncEngine};
use crate::schedule::{initial_status, schedule_from_body, workflow_spec};

/// Action a legal (status, operation) pair performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Register the processing model, run or schedule it, compute status.
    Materialize,
    /// Apply the pending schedule edit to a running job, re-run if immediate.
    ApplySchedule,
    /// Disable the external schedule and stop.
    Stop,
    /// Apply the pending schedule edit to a stopped job without resuming it.
    ApplyScheduleOnly,
    /// Apply the pending schedule edit and resume.
    Restart,
}

/// Dispatch table of the lifecycle.
pub fn transition_for(status: PushStatus, operation: Operation) -> Result<Transition> {
    use Operation::{Change, Publish, Restart, Stop};
    use PushStatus::{Draft, End, Going, Shadow, Starting, Stopped, Waiting};

    match (status, operation) {
        (Shadow | Draft | Waiting, Publish) => Ok(Transition::Materialize),
        (Starting | Going, Change) => Ok(Transition::ApplySchedule),
        (Starting | Going, Stop) => Ok(Transition::Stop),
        (Stopped, Change) => Ok(Transition::ApplyScheduleOnly),
        (Stopped, Restart) => Ok(Transition::Restart),
        (End, Publish | Change | Stop | Restart) => Err(DataPushError::InvalidOperation(format!(
            "job has ended; {operation} is not allowed"
        ))),
        (Shadow | Draft | Waiting, Change | Stop | Restart)
        | (Starting | Going, Publish | Restart)
        | (Stopped, Publish | Stop) => Err(DataPushError::InvalidOperation(format!(
            "{operation} is not allowed in status {status}"
        ))),
    }
}

/// Result of requesting an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    /// The transition ran; the job now has this status.
    Applied(PushStatus),
    /// The operation waits for an audit verdict.
    AwaitingAudit { apply_id: String },
}

/// Executes lifecycle operations behind the audit gate.
pub struct PushLifecycleStateMachine {
    pub(crate) repository: Arc<dyn PushJobRepository>,
    engine: Arc<dyn SyncEngine>,
    pub(crate) audit: Arc<dyn AuditService>,
    clock: Arc<dyn Clock>,
}

impl PushLifecycleStateMachine {
    /// Build a state machine over the given ports.
    pub fn new(
        repository: Arc<dyn PushJobRepository>,
        engine: Arc<dyn SyncEngine>,
        audit: Arc<dyn AuditService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { repository, engine, audit, clock }
    }

    pub(crate) async fn load(&self, job_id: &str) -> Result<PushJob> {
        self.repository
            .get(job_id)
            .await?
            .ok_or_else(|| DataPushError::NotFound(format!("push job {job_id}")))
    }

    /// Request an operation on a job.
    ///
    /// When an audit process is bound to the operation's audit type, an apply
    /// is submitted and the transition is suspended until the verdict
    /// arrives.
    #[instrument(skip(self))]
    pub async fn operate(&self, job_id: &str, operation: Operation) -> Result<OperationOutcome> {
        let job = self.load(job_id).await?;
        if job.audit_state == AuditState::Auditing {
            return Err(DataPushError::InvalidOperation(format!(
                "job {job_id} is awaiting audit"
            )));
        }
        transition_for(job.status, operation)?;

        let process = match self.audit.bound_process(operation.audit_type()).await {
            Ok(process) => process,
            Err(err) => {
                self.record_failure(&job.id, &err).await;
                return Err(err);
            }
        };

        match process {
            Some(process) => self.submit_audit(&job, operation, &process).await,
            None => self.execute(&job, operation).await.map(OperationOutcome::Applied),
        }
    }

    async fn submit_audit(
        &self,
        job: &PushJob,
        operation: Operation,
        process: &AuditProcess,
    ) -> Result<OperationOutcome> {
        // Change and Restart are approved against the edit they will apply.
        let draft = pending_schedule(job)?;
        let schedule = ScheduleBody::from(draft.as_ref().unwrap_or(&job.schedule));
        let current_schedule = draft.as_ref().map(|_| ScheduleBody::from(&job.schedule));

        let apply = AuditApply {
            apply_id: Uuid::now_v7().to_string(),
            tenant_id: job.tenant_id.clone(),
            job_id: job.id.clone(),
            audit_type: operation.audit_type().to_string(),
            process_id: process.process_id.clone(),
            metadata: json!({
                "name": job.name,
                "operation": operation.as_str(),
                "status": job.status.as_str(),
                "transmitMode": job.transmit_mode.as_str(),
                "sourceTable": job.source.table_name,
                "targetTable": job.target.table_name,
                "schedule": schedule,
                "currentSchedule": current_schedule,
            }),
        };

        if let Err(err) = self.audit.submit_apply(&apply).await {
            self.record_failure(&job.id, &err).await;
            return Err(err);
        }
        self.repository
            .update_audit(&job.id, AuditState::Auditing, Some(&apply.apply_id), Some(operation))
            .await?;
        if operation == Operation::Publish
            && matches!(job.status, PushStatus::Shadow | PushStatus::Draft)
        {
            self.repository.update_status(&job.id, PushStatus::Waiting).await?;
        }

        info!(apply_id = %apply.apply_id, "operation submitted for audit");
        Ok(OperationOutcome::AwaitingAudit { apply_id: apply.apply_id })
    }

    /// Run the dispatch table for a job, bypassing the audit gate.
    ///
    /// Downstream failures leave the status unchanged and are recorded on
    /// the job's error field; success clears it.
    #[instrument(skip(self, job, operation), fields(job_id = %job.id, status = %job.status, operation = %operation))]
    pub async fn execute(&self, job: &PushJob, operation: Operation) -> Result<PushStatus> {
        let transition = transition_for(job.status, operation)?;

        let outcome = match transition {
            Transition::Materialize => self.materialize(job).await,
            Transition::ApplySchedule => self.apply_schedule(job).await,
            Transition::Stop => self.stop(job).await,
            Transition::ApplyScheduleOnly => self.apply_schedule_only(job).await,
            Transition::Restart => self.restart(job).await,
        };

        match outcome {
            Ok(status) => {
                if job.error_message.is_some() {
                    self.repository.update_error(&job.id, None).await?;
                }
                info!(new_status = %status, ?transition, "transition applied");
                Ok(status)
            }
            Err(err) => {
                self.record_failure(&job.id, &err).await;
                Err(err)
            }
        }
    }

    pub(crate) async fn record_failure(&self, job_id: &str, err: &DataPushError) {
        let note = error_note(err);
        warn!(job_id = %job_id, error = %note, "lifecycle operation failed");
        if let Err(persist_err) = self.repository.update_error(job_id, Some(&note)).await {
            error!(job_id = %job_id, error = %persist_err, "failed to record job error");
        }
    }

    async fn materialize(&self, job: &PushJob) -> Result<PushStatus> {
        let schedule = match pending_schedule(job)? {
            Some(schedule) => {
                self.persist_schedule(&job.id, &schedule).await?;
                schedule
            }
            None => job.schedule.clone(),
        };

        let model = ProcessingModel {
            job_id: job.id.clone(),
            source_datasource_id: job.source.datasource_id.clone(),
            target: job.target.location.clone(),
            sql: job.sql.clone(),
        };
        self.engine.create_processing_model(&model).await?;
        // Read before the run is triggered: the engine stamps the run after
        // this instant, and completion is judged against it.
        let published_at = self.clock.now();
        if schedule.is_immediate() {
            self.engine.run(&job.id).await?;
        } else {
            self.engine.create_workflow(&workflow_spec(&job.id, &schedule)).await?;
        }

        let status = initial_status(&schedule, published_at);
        self.repository.mark_published(&job.id, status, published_at).await?;
        Ok(status)
    }

    async fn apply_schedule(&self, job: &PushJob) -> Result<PushStatus> {
        let schedule = pending_schedule(job)?.unwrap_or_else(|| job.schedule.clone());
        self.push_schedule(&job.id, &job.schedule, &schedule).await?;
        let rerun_at = self.rerun_if_immediate(&job.id, &schedule).await?;
        self.persist_schedule(&job.id, &schedule).await?;

        let now = rerun_at.unwrap_or_else(|| self.clock.now());
        let status = initial_status(&schedule, now);
        match rerun_at {
            Some(published_at) => {
                self.repository.mark_published(&job.id, status, published_at).await?;
            }
            None if status != job.status => {
                self.repository.update_status(&job.id, status).await?;
            }
            None => {}
        }
        Ok(status)
    }

    /// Trigger a fresh run for an immediate schedule and return the instant
    /// read just before it, the new completion anchor.
    async fn rerun_if_immediate(
        &self,
        job_id: &str,
        schedule: &Schedule,
    ) -> Result<Option<NaiveDateTime>> {
        if !schedule.is_immediate() {
            return Ok(None);
        }
        let published_at = self.clock.now();
        self.engine.run(job_id).await?;
        Ok(Some(published_at))
    }

    async fn stop(&self, job: &PushJob) -> Result<PushStatus> {
        if !job.schedule.is_immediate() {
            self.engine.update_workflow_online(&job.id, false).await?;
        }
        self.repository.update_status(&job.id, PushStatus::Stopped).await?;
        Ok(PushStatus::Stopped)
    }

    async fn apply_schedule_only(&self, job: &PushJob) -> Result<PushStatus> {
        let schedule = pending_schedule(job)?.unwrap_or_else(|| job.schedule.clone());
        self.push_schedule(&job.id, &job.schedule, &schedule).await?;
        if job.schedule.is_immediate() && !schedule.is_immediate() {
            // Fresh workflows are created online.
            self.engine.update_workflow_online(&job.id, false).await?;
        }
        self.persist_schedule(&job.id, &schedule).await?;
        Ok(PushStatus::Stopped)
    }

    async fn restart(&self, job: &PushJob) -> Result<PushStatus> {
        let schedule = pending_schedule(job)?.unwrap_or_else(|| job.schedule.clone());
        self.push_schedule(&job.id, &job.schedule, &schedule).await?;
        let rerun_at = self.rerun_if_immediate(&job.id, &schedule).await?;
        if rerun_at.is_none() {
            self.engine.update_workflow_online(&job.id, true).await?;
        }
        self.persist_schedule(&job.id, &schedule).await?;
        match rerun_at {
            Some(published_at) => {
                self.repository.mark_published(&job.id, PushStatus::Going, published_at).await?;
            }
            None => self.repository.update_status(&job.id, PushStatus::Going).await?,
        }
        Ok(PushStatus::Going)
    }

    /// Bring the external workflow in line with a new schedule. Immediate
    /// one-shot jobs have no workflow.
    async fn push_schedule(&self, job_id: &str, old: &Schedule, new: &Schedule) -> Result<()> {
        match (old.is_immediate(), new.is_immediate()) {
            (true, true) => Ok(()),
            (true, false) => self.engine.create_workflow(&workflow_spec(job_id, new)).await,
            (false, true) => self.engine.delete_workflow(job_id).await,
            (false, false) => self.engine.update_workflow(&workflow_spec(job_id, new)).await,
        }
    }

    /// Write the live schedule columns and drop the draft.
    pub(crate) async fn persist_schedule(&self, job_id: &str, schedule: &Schedule) -> Result<()> {
        self.repository.update_schedule(job_id, schedule).await?;
        self.repository.save_draft_schedule(job_id, None).await
    }
}

/// Decoded draft schedule of a job, if one is waiting.
pub(crate) fn pending_schedule(job: &PushJob) -> Result<Option<Schedule>> {
    match job.draft_schedule.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => {
            let body = ScheduleBody::decode(raw)?;
            schedule_from_body(&body).map(Some)
        }
        _ => Ok(None),
    }
}
