//! Consumer of asynchronous audit service messages.
//!
//! Raw payloads arrive through a bounded channel (whatever transport carries
//! them holds an [`AuditMessageSender`]). Each payload is decoded into an
//! [`AuditMessage`] and handed to the lifecycle state machine one at a time.
//! Malformed payloads are logged and dropped. A handler that panics is
//! logged and the worker keeps draining the queue.
//!
//! Handlers run to completion. Their downstream calls are bounded by the
//! HTTP client timeouts, so a slow engine never leaves a verdict half applied.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use datapush_core::PushLifecycleStateMachine;
use datapush_domain::{AuditMessage, DataPushError, Result};
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::scheduling::{SchedulerError, SchedulerResult};

/// Configuration for the audit message worker.
#[derive(Debug, Clone)]
pub struct AuditWorkerConfig {
    /// Capacity of the inbound payload queue
    pub queue_capacity: usize,
    /// Join timeout when stopping
    pub join_timeout: Duration,
}

impl Default for AuditWorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Producer handle for raw audit payloads.
#[derive(Debug, Clone)]
pub struct AuditMessageSender {
    tx: mpsc::Sender<String>,
}

impl AuditMessageSender {
    /// Queue a raw JSON payload, waiting while the queue is full.
    pub async fn deliver(&self, payload: impl Into<String>) -> Result<()> {
        self.tx
            .send(payload.into())
            .await
            .map_err(|_| DataPushError::Internal("audit message worker is not running".into()))
    }
}

/// Audit message worker with explicit lifecycle management.
pub struct AuditMessageWorker {
    lifecycle: Arc<PushLifecycleStateMachine>,
    config: AuditWorkerConfig,
    cancellation: CancellationToken,
    sender: Option<AuditMessageSender>,
    task_handle: Option<JoinHandle<()>>,
}

impl AuditMessageWorker {
    pub fn new(lifecycle: Arc<PushLifecycleStateMachine>, config: AuditWorkerConfig) -> Self {
        Self {
            lifecycle,
            config,
            cancellation: CancellationToken::new(),
            sender: None,
            task_handle: None,
        }
    }

    /// Start draining and return the handle producers deliver through.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> SchedulerResult<AuditMessageSender> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();
        let (tx, rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let sender = AuditMessageSender { tx };

        let handle = tokio::spawn(Self::process_loop(
            Arc::clone(&self.lifecycle),
            rx,
            self.cancellation.clone(),
        ));

        self.sender = Some(sender.clone());
        self.task_handle = Some(handle);
        info!(queue_capacity = self.config.queue_capacity, "Audit message worker started");
        Ok(sender)
    }

    /// Stop the worker. Payloads still queued are discarded.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();
        self.sender = None;

        if let Some(handle) = self.task_handle.take() {
            let join_timeout = self.config.join_timeout;
            match tokio::time::timeout(join_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(error = %e, "Audit worker task panicked");
                    return Err(SchedulerError::TaskJoinFailed(e.to_string()));
                }
                Err(_) => {
                    warn!("Audit worker task did not complete within timeout");
                    return Err(SchedulerError::Timeout { seconds: join_timeout.as_secs() });
                }
            }
        }

        self.cancellation = CancellationToken::new();
        info!("Audit message worker stopped");
        Ok(())
    }

    /// Returns true when the worker is draining its queue.
    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    /// Sender of the running worker.
    pub fn sender(&self) -> Option<AuditMessageSender> {
        self.sender.clone()
    }

    async fn process_loop(
        lifecycle: Arc<PushLifecycleStateMachine>,
        mut rx: mpsc::Receiver<String>,
        cancel: CancellationToken,
    ) {
        loop {
            let payload = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!("Audit worker process loop cancelled");
                    break;
                }
                next = rx.recv() => match next {
                    Some(payload) => payload,
                    None => break,
                },
            };

            let Some(message) = decode(&payload) else {
                continue;
            };
            dispatch(&lifecycle, &message).await;
        }
    }
}

fn decode(payload: &str) -> Option<AuditMessage> {
    match serde_json::from_str::<AuditMessage>(payload) {
        Ok(message) => Some(message),
        Err(err) => {
            warn!(error = %err, payload_len = payload.len(), "Dropping malformed audit message");
            None
        }
    }
}

async fn dispatch(lifecycle: &PushLifecycleStateMachine, message: &AuditMessage) {
    let handled = AssertUnwindSafe(lifecycle.handle_audit_message(message)).catch_unwind();

    match handled.await {
        Ok(Ok(())) => debug!(?message, "Audit message handled"),
        Ok(Err(err)) => error!(?message, error = %err, "Audit message handling failed"),
        Err(_) => error!(?message, "Audit message handler panicked"),
    }
}

impl Drop for AuditMessageWorker {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("AuditMessageWorker dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_accepts_known_kinds() {
        let message = decode(r#"{"kind":"process","applyId":"a-1","node":"manager"}"#);
        assert_eq!(
            message,
            Some(AuditMessage::Process { apply_id: "a-1".into(), node: "manager".into() })
        );
    }

    #[test]
    fn decode_drops_garbage_and_unknown_kinds() {
        assert_eq!(decode("not json"), None);
        assert_eq!(decode(r#"{"kind":"escalated","applyId":"a-1"}"#), None);
    }

    #[tokio::test]
    async fn sender_fails_once_receiver_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = AuditMessageSender { tx };

        let err = sender.deliver("{}").await.expect_err("closed queue");
        assert!(matches!(err, DataPushError::Internal(_)));
    }
}
