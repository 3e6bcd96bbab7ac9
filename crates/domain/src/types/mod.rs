//! Domain types for push jobs and their external collaborators

pub mod audit;
pub mod callback;
pub mod dialect;
pub mod engine;
pub mod execution;
pub mod job;
pub mod mapping;
pub mod masking;
pub mod schedule;

pub use audit::{AuditApply, AuditMessage, AuditProcess};
pub use callback::{CompletionEvent, TableStatistics};
pub use dialect::{bare_type_name, is_numeric_type, type_accepts_length, Dialect};
pub use engine::{EngineFault, ProcessingModel, WorkflowSpec};
pub use execution::{parse_log_time, ExecutionHistory, ExecutionLogEntry, HistoryPage};
pub use job::{
    split_primary_keys, AuditState, Operation, PushField, PushJob, PushJobRequest, PushStatus,
    SourceTable, SynthesizedSql, TargetLocation, TargetTable, TransmitMode,
};
pub use mapping::{ResolvedColumnType, SourceColumnType};
pub use masking::{DesensitizationRule, MaskingMethod};
pub use schedule::{Schedule, ScheduleBody, ScheduleType};
