//! Completion event sent to the callback consumer

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Row statistics for one side of a push job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStatistics {
    pub datasource_id: String,
    pub table_id: String,
    pub table_name: String,
    /// Rows moved by the latest run.
    pub rows: i64,
    /// Rows moved across the fetched history page.
    pub total_rows: i64,
}

/// "Task completed" event emitted once when a job reaches `End`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEvent {
    pub tenant_id: String,
    pub job_id: String,
    pub job_name: String,
    pub source: TableStatistics,
    pub target: TableStatistics,
    pub finished_at: NaiveDateTime,
}
