//! Background status reconciliation logic
//!
//! The polling loop and work queue live in the infra worker; this module
//! holds what happens to each dequeued job.

pub mod inference;
pub mod service;

pub use inference::{infer_status, is_success_status};
pub use service::{ReconcileOutcome, ReconcileSettings, StatusReconciler};
