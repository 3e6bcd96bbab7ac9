//! # DataPush Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - SQL synthesis: type mapping, masking expressions, DDL/DML generation
//! - Schedule validation and timing rules
//! - The push lifecycle state machine and its audit gate
//! - Status inference used by the background reconciler
//! - Port interfaces (traits) for persistence and external services
//!
//! ## Architecture Principles
//! - Only depends on `datapush-domain`
//! - No database, HTTP, or runtime code
//! - All external dependencies via traits

pub mod lifecycle;
pub mod push;
pub mod reconcile;
pub mod schedule;
pub mod sql;

// Re-export specific items to avoid ambiguity
pub use lifecycle::{
    classify_engine_error, transition_for, OperationOutcome, PushLifecycleStateMachine,
    Transition,
};
pub use push::ports::{
    AuditService, Clock, CompletionCallbackSink, MaskingRuleService, PushJobRepository,
    SyncEngine, SystemClock, TypeMappingService,
};
pub use push::{PushJobService, PushPorts};
pub use reconcile::{infer_status, ReconcileOutcome, ReconcileSettings, StatusReconciler};
pub use sql::{check_primary_key, MaskingRuleApplier, SqlSynthesisEngine, TypeMappingResolver};
