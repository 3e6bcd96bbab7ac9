//! Background worker that keeps push job status in line with execution
//! history.
//!
//! A producer task polls for due `Starting`/`Going` jobs every
//! `poll_interval` and pushes their ids into a bounded queue; when the queue
//! is full the producer waits. A single consumer re-reads each queued job and
//! reconciles it through [`StatusReconciler`]. Ids stay in an in-flight set
//! from enqueue until the consumer is done with them, so a slow pass never
//! queues the same job twice. [`PushStatusReconciler::reconcile_once`] claims
//! through the same set, so it never works a job the consumer holds.
//!
//! Only the scan is bounded here; downstream calls made while reconciling a
//! job carry their own deadline, so persisted progress is never cut off.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use datapush_core::StatusReconciler;
//! use datapush_domain::ReconcilerConfig;
//! use datapush_infra::scheduling::{PushStatusReconciler, SchedulerResult};
//!
//! # async fn example(core: Arc<StatusReconciler>) -> SchedulerResult<()> {
//! let mut worker =
//!     PushStatusReconciler::new(core, (&ReconcilerConfig::default()).into());
//!
//! worker.start()?;
//! // ... application runs ...
//! worker.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use datapush_core::{ReconcileOutcome, StatusReconciler};
use datapush_domain::{DataPushError, PushJob, ReconcilerConfig, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::error::{SchedulerError, SchedulerResult};

/// Configuration for the status reconciler worker.
#[derive(Debug, Clone)]
pub struct PushStatusReconcilerConfig {
    /// Interval between scans for due jobs
    pub poll_interval: Duration,
    /// Capacity of the job queue between producer and consumer
    pub queue_capacity: usize,
    /// Timeout for the due-job scan
    pub query_timeout: Duration,
    /// Join timeout when stopping
    pub join_timeout: Duration,
}

impl Default for PushStatusReconcilerConfig {
    fn default() -> Self {
        (&ReconcilerConfig::default()).into()
    }
}

impl From<&ReconcilerConfig> for PushStatusReconcilerConfig {
    fn from(config: &ReconcilerConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            queue_capacity: config.queue_capacity.max(1),
            query_timeout: Duration::from_secs(config.query_timeout_secs),
            join_timeout: Duration::from_secs(config.join_timeout_secs),
        }
    }
}

/// Tally of one synchronous reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Jobs returned by the due-job scan
    pub scanned: usize,
    /// Jobs whose status was written, completions included
    pub changed: usize,
    /// Jobs that reached `End`
    pub completed: usize,
    /// Jobs whose reconciliation returned an error
    pub failed: usize,
    /// Jobs held by the running worker or no longer reconcilable on re-read
    pub skipped: usize,
}

impl ReconcileReport {
    fn record(&mut self, outcome: &ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Unchanged(_) => {}
            ReconcileOutcome::Updated { .. } => self.changed += 1,
            ReconcileOutcome::Completed { .. } => {
                self.changed += 1;
                self.completed += 1;
            }
        }
    }
}

type InFlight = Arc<Mutex<HashSet<String>>>;

/// Status reconciler worker with explicit lifecycle management.
pub struct PushStatusReconciler {
    reconciler: Arc<StatusReconciler>,
    config: PushStatusReconcilerConfig,
    in_flight: InFlight,
    cancellation: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl PushStatusReconciler {
    /// Worker over `reconciler`; nothing runs until [`Self::start`].
    pub fn new(reconciler: Arc<StatusReconciler>, config: PushStatusReconcilerConfig) -> Self {
        Self {
            reconciler,
            config,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            cancellation: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// Spawn the producer and consumer tasks.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            queue_capacity = self.config.queue_capacity,
            "Starting push status reconciler"
        );

        self.cancellation = CancellationToken::new();
        let (tx, rx) = mpsc::channel(self.config.queue_capacity);

        let producer = tokio::spawn(Self::producer_loop(
            Arc::clone(&self.reconciler),
            tx,
            Arc::clone(&self.in_flight),
            self.config.clone(),
            self.cancellation.clone(),
        ));
        let consumer = tokio::spawn(Self::consumer_loop(
            Arc::clone(&self.reconciler),
            rx,
            Arc::clone(&self.in_flight),
            self.cancellation.clone(),
        ));

        self.tasks = vec![producer, consumer];
        info!("Push status reconciler started");
        Ok(())
    }

    /// Cancel both tasks and wait for them to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("Stopping push status reconciler");
        self.cancellation.cancel();

        let join_timeout = self.config.join_timeout;
        for handle in self.tasks.drain(..) {
            match tokio::time::timeout(join_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(error = %e, "Reconciler task panicked");
                    return Err(SchedulerError::TaskJoinFailed(e.to_string()));
                }
                Err(_) => {
                    warn!("Reconciler task did not complete within timeout");
                    return Err(SchedulerError::Timeout { seconds: join_timeout.as_secs() });
                }
            }
        }

        self.cancellation = CancellationToken::new();
        info!("Push status reconciler stopped");
        Ok(())
    }

    /// Returns true when the background tasks are active.
    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Scan and reconcile every due job once, bypassing the queue.
    ///
    /// Safe while the worker runs: a job the consumer holds is skipped, and
    /// every other job is re-read before it is reconciled. Per-job failures
    /// are counted, not raised; only the scan itself can fail.
    #[instrument(skip(self))]
    pub async fn reconcile_once(&self) -> Result<ReconcileReport> {
        let jobs = scan_due(&self.reconciler, self.config.query_timeout).await?;
        let mut report = ReconcileReport { scanned: jobs.len(), ..ReconcileReport::default() };

        for job in &jobs {
            if !claim(&self.in_flight, &job.id) {
                debug!(job_id = %job.id, "Job held by the running worker");
                report.skipped += 1;
                continue;
            }
            let result = self.reconciler.reconcile_by_id(&job.id).await;
            release(&self.in_flight, &job.id);

            match result {
                Ok(Some(outcome)) => report.record(&outcome),
                Ok(None) => report.skipped += 1,
                Err(err) => {
                    warn!(job_id = %job.id, error = %err, "Reconciliation failed");
                    report.failed += 1;
                }
            }
        }

        debug!(?report, "Reconciliation pass completed");
        Ok(report)
    }

    async fn producer_loop(
        reconciler: Arc<StatusReconciler>,
        tx: mpsc::Sender<String>,
        in_flight: InFlight,
        config: PushStatusReconcilerConfig,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!("Reconciler producer cancelled");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let jobs = match scan_due(&reconciler, config.query_timeout).await {
                Ok(jobs) => jobs,
                Err(err) => {
                    error!(error = %err, "Scan for due jobs failed");
                    continue;
                }
            };

            let mut queued = 0_usize;
            for job in jobs {
                if !claim(&in_flight, &job.id) {
                    continue;
                }
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        release(&in_flight, &job.id);
                        debug!("Reconciler producer cancelled while enqueueing");
                        return;
                    }
                    sent = tx.send(job.id.clone()) => {
                        if sent.is_err() {
                            release(&in_flight, &job.id);
                            debug!("Reconciler queue closed");
                            return;
                        }
                        queued += 1;
                    }
                }
            }
            if queued > 0 {
                debug!(queued, "Queued jobs for reconciliation");
            }
        }
    }

    async fn consumer_loop(
        reconciler: Arc<StatusReconciler>,
        mut rx: mpsc::Receiver<String>,
        in_flight: InFlight,
        cancel: CancellationToken,
    ) {
        loop {
            let job_id = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!("Reconciler consumer cancelled");
                    break;
                }
                next = rx.recv() => match next {
                    Some(job_id) => job_id,
                    None => break,
                },
            };

            let result = reconciler.reconcile_by_id(&job_id).await;
            release(&in_flight, &job_id);

            match result {
                Ok(Some(ReconcileOutcome::Completed { callback_sent })) => {
                    info!(job_id = %job_id, callback_sent, "Job completed");
                }
                Ok(outcome) => debug!(job_id = %job_id, ?outcome, "Job reconciled"),
                Err(err) => warn!(job_id = %job_id, error = %err, "Reconciliation failed"),
            }
        }

        // Unprocessed ids must not stay claimed past this run.
        rx.close();
        while let Ok(job_id) = rx.try_recv() {
            release(&in_flight, &job_id);
        }
    }
}

async fn scan_due(
    reconciler: &StatusReconciler,
    query_timeout: Duration,
) -> Result<Vec<PushJob>> {
    tokio::time::timeout(query_timeout, reconciler.due_jobs()).await.map_err(|_| {
        DataPushError::from(SchedulerError::Timeout { seconds: query_timeout.as_secs() })
    })?
}

/// Add `job_id` to the in-flight set; false when it is already there.
fn claim(in_flight: &InFlight, job_id: &str) -> bool {
    in_flight.lock().unwrap_or_else(PoisonError::into_inner).insert(job_id.to_string())
}

fn release(in_flight: &InFlight, job_id: &str) {
    in_flight.lock().unwrap_or_else(PoisonError::into_inner).remove(job_id);
}

impl Drop for PushStatusReconciler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("PushStatusReconciler dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use datapush_domain::PushStatus;

    use super::*;

    #[test]
    fn config_converts_seconds_and_clamps_capacity() {
        let config = PushStatusReconcilerConfig::from(&ReconcilerConfig {
            poll_interval_secs: 15,
            queue_capacity: 0,
            history_page_size: 10,
            query_timeout_secs: 3,
            join_timeout_secs: 2,
            one_shot_completion: Default::default(),
        });

        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.queue_capacity, 1);
        assert_eq!(config.query_timeout, Duration::from_secs(3));
    }

    #[test]
    fn in_flight_claim_is_exclusive_until_released() {
        let in_flight: InFlight = Arc::new(Mutex::new(HashSet::new()));

        assert!(claim(&in_flight, "a"));
        assert!(!claim(&in_flight, "a"));
        release(&in_flight, "a");
        assert!(claim(&in_flight, "a"));
    }

    #[test]
    fn report_counts_completions_as_changes() {
        let mut report = ReconcileReport::default();
        report.record(&ReconcileOutcome::Completed { callback_sent: false });
        report.record(&ReconcileOutcome::Unchanged(PushStatus::Going));

        assert_eq!(report.changed, 1);
        assert_eq!(report.completed, 1);
    }
}
