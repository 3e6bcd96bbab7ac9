//! Payloads exchanged with the sync-execution engine

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::job::{SynthesizedSql, TargetLocation};

/// Processing model registered for a job: the generated statement bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingModel {
    pub job_id: String,
    pub source_datasource_id: String,
    pub target: TargetLocation,
    pub sql: SynthesizedSql,
}

/// Workflow registration for a scheduled job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSpec {
    pub job_id: String,
    pub crontab: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub once_at: Option<NaiveDateTime>,
}

/// Operator-facing cause derived from a sync engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineFault {
    /// Schedule end precedes start, or the window is already over.
    TimeOrdering,
    /// Another workflow occupies the schedule.
    SchedulingConflict,
    /// The processing model no longer exists in the engine.
    ModelDeleted,
    Generic,
}

impl EngineFault {
    /// Human-readable cause stored on the job's error field.
    pub const fn describe(self) -> &'static str {
        match self {
            Self::TimeOrdering => "schedule time ordering error",
            Self::SchedulingConflict => "scheduling conflict",
            Self::ModelDeleted => "model deleted",
            Self::Generic => "sync engine error",
        }
    }
}

impl std::fmt::Display for EngineFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.describe())
    }
}
