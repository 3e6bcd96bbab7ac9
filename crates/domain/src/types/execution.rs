//! Execution history reported by the sync engine

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::constants::DATETIME_FORMAT;

/// One run of a push job as recorded by the sync engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLogEntry {
    #[serde(default)]
    pub start_time: String,
    /// Empty while the run is still in progress.
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub row_count: i64,
    #[serde(default)]
    pub status: String,
}

impl ExecutionLogEntry {
    pub fn started_at(&self) -> Option<NaiveDateTime> {
        parse_log_time(&self.start_time)
    }

    pub fn is_finished(&self) -> bool {
        !self.end_time.trim().is_empty()
    }
}

/// Parse an engine timestamp in either `YYYY-MM-DD HH:MM:SS` or RFC 3339.
pub fn parse_log_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_local()))
}

/// Paging request for execution history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub page: u32,
    pub size: u32,
}

impl HistoryPage {
    pub fn first(size: u32) -> Self {
        Self { page: 1, size }
    }
}

/// A page of execution history.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionHistory {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub entries: Vec<ExecutionLogEntry>,
}

impl ExecutionHistory {
    /// Entry with the greatest start time. Entries whose start time cannot be
    /// parsed are ignored.
    pub fn latest(&self) -> Option<&ExecutionLogEntry> {
        self.entries
            .iter()
            .filter_map(|entry| entry.started_at().map(|at| (at, entry)))
            .max_by_key(|(at, _)| *at)
            .map(|(_, entry)| entry)
    }

    pub fn total_rows(&self) -> i64 {
        self.entries.iter().map(|e| e.row_count).sum()
    }
}
