//! Audit verdicts and revocation

use datapush_domain::{AuditMessage, AuditState, DataPushError, Operation, PushJob, Result};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::state_machine::{pending_schedule, PushLifecycleStateMachine};

impl PushLifecycleStateMachine {
    /// Handle one asynchronous message from the audit service.
    ///
    /// Messages with a malformed apply id or an unknown job are logged and
    /// dropped; errors are returned only for failures worth surfacing.
    pub async fn handle_audit_message(&self, message: &AuditMessage) -> Result<()> {
        match message {
            AuditMessage::Result { apply_id, pass, comment } => {
                if !valid_apply_id(apply_id) {
                    return Ok(());
                }
                self.on_audit_result(apply_id, *pass, comment.as_deref()).await
            }
            AuditMessage::Process { apply_id, node } => {
                if valid_apply_id(apply_id) {
                    info!(apply_id = %apply_id, node = %node, "audit in progress");
                }
                Ok(())
            }
            AuditMessage::DefinitionDeleted { audit_type } => {
                self.on_definition_deleted(audit_type).await
            }
        }
    }

    #[instrument(skip(self, comment))]
    async fn on_audit_result(&self, apply_id: &str, pass: bool, comment: Option<&str>) -> Result<()> {
        let Some(job) = self.repository.find_by_apply_id(apply_id).await? else {
            warn!("audit result for unknown apply; dropping");
            return Ok(());
        };
        if job.audit_state != AuditState::Auditing {
            warn!(job_id = %job.id, audit_state = %job.audit_state, "stale audit result; dropping");
            return Ok(());
        }

        let verdict = if pass { AuditState::Pass } else { AuditState::Reject };
        // A passed operation stays pending until it has run, so an
        // interrupted or failed execution is still visible on the job.
        let pending = if pass { job.pending_operation } else { None };
        self.repository.update_audit(&job.id, verdict, Some(apply_id), pending).await?;
        info!(job_id = %job.id, %verdict, comment = comment.unwrap_or_default(), "audit verdict received");

        let Some(operation) = job.pending_operation else {
            warn!(job_id = %job.id, "audit verdict without a pending operation");
            return Ok(());
        };
        if !pass {
            return Ok(());
        }

        let job = PushJob { audit_state: verdict, ..job };
        let result = match self.apply_draft_before_publish(job.clone()).await {
            Ok(ready) => self.execute(&ready, operation).await.map(|_| ()),
            Err(err) => {
                self.record_failure(&job.id, &err).await;
                Err(err)
            }
        };
        if result.is_ok() {
            self.repository.update_audit(&job.id, verdict, Some(apply_id), None).await?;
        }
        result
    }

    /// Jobs not yet materialized take their draft schedule into the live
    /// columns before the dispatch table runs. Live jobs apply it as part of
    /// the transition.
    async fn apply_draft_before_publish(&self, job: PushJob) -> Result<PushJob> {
        if !job.status.is_editable() {
            return Ok(job);
        }
        match pending_schedule(&job)? {
            Some(schedule) => {
                self.persist_schedule(&job.id, &schedule).await?;
                Ok(PushJob { schedule, draft_schedule: None, ..job })
            }
            None => Ok(job),
        }
    }

    async fn on_definition_deleted(&self, audit_type: &str) -> Result<()> {
        let Some(operation) = Operation::ALL.into_iter().find(|op| op.audit_type() == audit_type)
        else {
            warn!(audit_type = %audit_type, "definition deleted for unrelated audit type");
            return Ok(());
        };

        let jobs = self.repository.list_auditing(operation).await?;
        for job in &jobs {
            self.repository.update_audit(&job.id, AuditState::Unaudited, None, None).await?;
        }
        info!(audit_type = %audit_type, reverted = jobs.len(), "audit definition deleted");
        Ok(())
    }

    /// Withdraw a pending audit apply. Only jobs awaiting audit can revoke;
    /// the status is left untouched.
    #[instrument(skip(self))]
    pub async fn revoke(&self, job_id: &str) -> Result<()> {
        let job = self.load(job_id).await?;
        if job.audit_state != AuditState::Auditing {
            return Err(DataPushError::InvalidOperation(format!(
                "job {job_id} is not awaiting audit"
            )));
        }
        if let Some(apply_id) = job.apply_id.as_deref() {
            self.audit.revoke_apply(apply_id).await?;
        }
        self.repository
            .update_audit(&job.id, AuditState::Revocation, job.apply_id.as_deref(), None)
            .await?;
        info!("audit apply revoked");
        Ok(())
    }
}

fn valid_apply_id(apply_id: &str) -> bool {
    if Uuid::parse_str(apply_id).is_ok() {
        true
    } else {
        warn!(apply_id = %apply_id, "malformed apply id; dropping audit message");
        false
    }
}
