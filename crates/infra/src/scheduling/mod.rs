//! Background workers
//!
//! Workers own a `CancellationToken` and their `JoinHandle`s, start and stop
//! explicitly, and cancel themselves when dropped while running.

pub mod error;
pub mod push_status_reconciler;

pub use error::{SchedulerError, SchedulerResult};
pub use push_status_reconciler::{
    PushStatusReconciler, PushStatusReconcilerConfig, ReconcileReport,
};
