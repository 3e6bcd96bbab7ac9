//! Schedule descriptor and its draft snapshot

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::constants::{DATETIME_FORMAT, DATE_FORMAT};
use crate::errors::{DataPushError, Result};

/// How a push job is triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScheduleType {
    /// Run a single time, immediately or at a fixed instant.
    Once,
    /// Run on a crontab between a start and an end date.
    Period,
}

crate::impl_domain_code_conversions!(ScheduleType {
    Once => (1, "once"),
    Period => (2, "period"),
});

/// Live schedule of a push job. These are the five persisted schedule
/// columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub schedule_type: ScheduleType,
    /// One-shot instant; `None` on a `Once` schedule means "run on publish".
    pub once_at: Option<NaiveDateTime>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub crontab: Option<String>,
}

impl Schedule {
    /// Run-on-publish schedule.
    pub fn immediate() -> Self {
        Self {
            schedule_type: ScheduleType::Once,
            once_at: None,
            start_date: None,
            end_date: None,
            crontab: None,
        }
    }

    pub fn once_at(at: NaiveDateTime) -> Self {
        Self { once_at: Some(at), ..Self::immediate() }
    }

    pub fn period(start: NaiveDate, end: NaiveDate, crontab: impl Into<String>) -> Self {
        Self {
            schedule_type: ScheduleType::Period,
            once_at: None,
            start_date: Some(start),
            end_date: Some(end),
            crontab: Some(crontab.into()),
        }
    }

    pub fn is_immediate(&self) -> bool {
        self.schedule_type == ScheduleType::Once && self.once_at.is_none()
    }
}

/// Draft snapshot of a schedule edit awaiting application.
///
/// Persisted as an opaque string (see [`ScheduleBody::encode`]); values are
/// kept in their wire format so a snapshot can be stored before it is
/// validated.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleBody {
    pub schedule_type: Option<ScheduleType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub once_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crontab: Option<String>,
}

impl ScheduleBody {
    /// Serialise into the opaque draft column value.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| DataPushError::Internal(format!("failed to encode schedule body: {e}")))
    }

    /// Decode a draft column value.
    pub fn decode(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| DataPushError::Validation(format!("malformed schedule body: {e}")))
    }
}

impl From<&Schedule> for ScheduleBody {
    fn from(schedule: &Schedule) -> Self {
        Self {
            schedule_type: Some(schedule.schedule_type),
            once_time: schedule.once_at.map(|at| at.format(DATETIME_FORMAT).to_string()),
            start_date: schedule.start_date.map(|d| d.format(DATE_FORMAT).to_string()),
            end_date: schedule.end_date.map(|d| d.format(DATE_FORMAT).to_string()),
            crontab: schedule.crontab.clone(),
        }
    }
}
