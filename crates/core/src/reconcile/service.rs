//! Per-job reconciliation against execution history

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use datapush_domain::{
    parse_log_time, CompletionEvent, ExecutionHistory, HistoryPage, OneShotCompletion, PushJob,
    DataPushError, PushStatus, Result, TableStatistics,
};
use tracing::{debug, error, info, instrument};

use super::inference::infer_status;
use crate::push::ports::{Clock, CompletionCallbackSink, PushJobRepository, SyncEngine};

/// What one reconciliation did to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Inferred status equals the stored one; nothing was written.
    Unchanged(PushStatus),
    /// The status column moved between non-terminal statuses.
    Updated { from: PushStatus, to: PushStatus },
    /// The job reached `End`; the callback result is reported, not raised.
    Completed { callback_sent: bool },
}

/// Tuning of the per-job reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSettings {
    /// Execution log entries fetched per job
    pub history_page_size: u32,
    /// When a finished one-shot run ends its job
    pub one_shot_completion: OneShotCompletion,
    /// Deadline for each downstream call (history query, completion
    /// callback). Local writes are never cut short.
    pub call_timeout: Duration,
}

/// Infers job status from execution history and persists changes.
pub struct StatusReconciler {
    repository: Arc<dyn PushJobRepository>,
    engine: Arc<dyn SyncEngine>,
    callback: Arc<dyn CompletionCallbackSink>,
    clock: Arc<dyn Clock>,
    settings: ReconcileSettings,
}

impl StatusReconciler {
    /// Reconciler over the given ports.
    pub fn new(
        repository: Arc<dyn PushJobRepository>,
        engine: Arc<dyn SyncEngine>,
        callback: Arc<dyn CompletionCallbackSink>,
        clock: Arc<dyn Clock>,
        settings: ReconcileSettings,
    ) -> Self {
        Self { repository, engine, callback, clock, settings }
    }

    /// Jobs whose status may have moved: live, acceptable audit state, due.
    pub async fn due_jobs(&self) -> Result<Vec<PushJob>> {
        self.repository.list_unfinished(self.clock.now()).await
    }

    /// Re-read a queued job and reconcile it.
    ///
    /// Returns `None` when the job was deleted or has left `Starting`/`Going`
    /// since it was queued, so a stale queue entry never repeats a transition.
    pub async fn reconcile_by_id(&self, job_id: &str) -> Result<Option<ReconcileOutcome>> {
        let Some(job) = self.repository.get(job_id).await? else {
            debug!(job_id, "queued job no longer exists");
            return Ok(None);
        };
        if !matches!(job.status, PushStatus::Starting | PushStatus::Going)
            || !job.audit_state.is_reconcilable()
        {
            debug!(job_id, status = %job.status, "queued job no longer reconcilable");
            return Ok(None);
        }
        self.reconcile_job(&job).await.map(Some)
    }

    /// Reconcile one job. The status column is written only when the inferred
    /// status differs; the completion callback fires only after `End` was
    /// persisted.
    #[instrument(skip(self, job), fields(job_id = %job.id, status = %job.status))]
    pub async fn reconcile_job(&self, job: &PushJob) -> Result<ReconcileOutcome> {
        let page = HistoryPage::first(self.settings.history_page_size);
        let history = self
            .bounded("execution history query", self.engine.query_execution_history(&job.id, page))
            .await?;
        let now = self.clock.now();
        let inferred = infer_status(job, &history, now, self.settings.one_shot_completion);

        if inferred == job.status {
            debug!("status unchanged");
            return Ok(ReconcileOutcome::Unchanged(inferred));
        }

        self.repository.update_status(&job.id, inferred).await?;
        info!(from = %job.status, to = %inferred, "status reconciled");

        if inferred != PushStatus::End {
            return Ok(ReconcileOutcome::Updated { from: job.status, to: inferred });
        }

        let event = completion_event(job, &history, now);
        let callback_sent = match self
            .bounded("completion callback", self.callback.notify_completed(&event))
            .await
        {
            Ok(()) => true,
            Err(err) => {
                error!(error = %err, "completion callback failed");
                false
            }
        };
        Ok(ReconcileOutcome::Completed { callback_sent })
    }

    async fn bounded<T>(&self, what: &str, call: impl Future<Output = Result<T>>) -> Result<T> {
        let limit = self.settings.call_timeout;
        tokio::time::timeout(limit, call).await.map_err(|_| {
            DataPushError::Network(format!("{what} timed out after {}s", limit.as_secs()))
        })?
    }
}

fn completion_event(job: &PushJob, history: &ExecutionHistory, now: NaiveDateTime) -> CompletionEvent {
    let latest = history.latest();
    let rows = latest.map_or(0, |entry| entry.row_count);
    let total_rows = history.total_rows();
    let finished_at = latest.and_then(|entry| parse_log_time(&entry.end_time)).unwrap_or(now);

    CompletionEvent {
        tenant_id: job.tenant_id.clone(),
        job_id: job.id.clone(),
        job_name: job.name.clone(),
        source: TableStatistics {
            datasource_id: job.source.datasource_id.clone(),
            table_id: job.source.table_id.clone(),
            table_name: job.source.table_name.clone(),
            rows,
            total_rows,
        },
        target: TableStatistics {
            datasource_id: job.target.location.id().to_string(),
            table_id: job.target.table_name.clone(),
            table_name: job.target.table_name.clone(),
            rows,
            total_rows,
        },
        finished_at,
    }
}
