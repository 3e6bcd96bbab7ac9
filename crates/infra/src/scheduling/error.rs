//! Background worker error types

use datapush_domain::DataPushError;
use thiserror::Error;

use crate::errors::InfraError;

/// Worker lifecycle errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Worker is already running
    #[error("Scheduler already running")]
    AlreadyRunning,

    /// Worker is not running
    #[error("Scheduler not running")]
    NotRunning,

    /// Operation timed out
    #[error("Operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Task join failed
    #[error("Task join failed: {0}")]
    TaskJoinFailed(String),
}

impl From<SchedulerError> for InfraError {
    fn from(err: SchedulerError) -> Self {
        let domain_err = match err {
            SchedulerError::AlreadyRunning | SchedulerError::NotRunning => {
                DataPushError::InvalidOperation(err.to_string())
            }
            SchedulerError::Timeout { .. } | SchedulerError::TaskJoinFailed(_) => {
                DataPushError::Internal(err.to_string())
            }
        };
        InfraError(domain_err)
    }
}

impl From<SchedulerError> for DataPushError {
    fn from(err: SchedulerError) -> Self {
        InfraError::from(err).into()
    }
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
