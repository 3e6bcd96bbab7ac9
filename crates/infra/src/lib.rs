//! # DataPush Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - SQLite persistence for push jobs (r2d2 pool, `spawn_blocking` access)
//! - HTTP clients for the sync engine, type mapping, audit, masking-rule and
//!   completion callback services
//! - Configuration loading from environment and files
//! - Background workers: status reconciler and audit message consumer
//!
//! ## Architecture
//! - Implements traits defined in `datapush-core`
//! - Contains all "impure" code (I/O, timers, tasks)

pub mod clients;
pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod messaging;
pub mod scheduling;

// Re-export commonly used items
pub use clients::{
    AuditClient, CallbackClient, ClientError, ClientErrorCategory, MaskingRuleClient,
    SyncEngineClient, TypeMappingClient,
};
pub use database::{DbManager, SqlitePushJobRepository};
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
pub use messaging::{AuditMessageSender, AuditMessageWorker, AuditWorkerConfig};
pub use scheduling::{
    PushStatusReconciler, PushStatusReconcilerConfig, ReconcileReport, SchedulerError,
    SchedulerResult,
};
