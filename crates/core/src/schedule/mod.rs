//! Schedule validation and timing rules
//!
//! Everything here is a pure function of the schedule, the publication time
//! and "now"; callers supply the clock.

pub mod cron;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use datapush_domain::constants::{DATETIME_FORMAT, DATE_FORMAT, IMMEDIATE_RUN_CLOCK_SKEW_SECS};
use datapush_domain::{
    DataPushError, PushStatus, Result, Schedule, ScheduleBody, ScheduleType, WorkflowSpec,
};

pub use cron::{validate_crontab, CronParseError, CrontabExpression};

/// Parse a `YYYY-MM-DD HH:MM:SS` value.
pub fn parse_datetime(raw: &str, what: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), DATETIME_FORMAT).map_err(|_| {
        DataPushError::Validation(format!("invalid {what} '{raw}', expected YYYY-MM-DD HH:MM:SS"))
    })
}

/// Parse a `YYYY-MM-DD` value.
pub fn parse_date(raw: &str, what: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| {
        DataPushError::Validation(format!("invalid {what} '{raw}', expected YYYY-MM-DD"))
    })
}

/// Optional high-water mark; blank means "from the beginning".
pub fn parse_high_water_mark(raw: Option<&str>) -> Result<Option<NaiveDateTime>> {
    match raw.map(str::trim) {
        Some(value) if !value.is_empty() => parse_datetime(value, "high-water mark").map(Some),
        _ => Ok(None),
    }
}

/// Validate a wire-format schedule and turn it into a live one.
pub fn schedule_from_body(body: &ScheduleBody) -> Result<Schedule> {
    let schedule_type = body
        .schedule_type
        .ok_or_else(|| DataPushError::Validation("schedule type is required".to_string()))?;

    match schedule_type {
        ScheduleType::Once => match non_blank(body.once_time.as_deref()) {
            Some(raw) => Ok(Schedule::once_at(parse_datetime(raw, "one-shot time")?)),
            None => Ok(Schedule::immediate()),
        },
        ScheduleType::Period => {
            let start = non_blank(body.start_date.as_deref())
                .ok_or_else(|| DataPushError::Validation("start date is required".to_string()))?;
            let end = non_blank(body.end_date.as_deref())
                .ok_or_else(|| DataPushError::Validation("end date is required".to_string()))?;
            let crontab = non_blank(body.crontab.as_deref())
                .ok_or_else(|| DataPushError::Validation("crontab is required".to_string()))?;

            let start = parse_date(start, "start date")?;
            let end = parse_date(end, "end date")?;
            if start > end {
                return Err(DataPushError::Validation(format!(
                    "start date {start} is after end date {end}"
                )));
            }
            validate_crontab(crontab).map_err(|e| {
                DataPushError::Validation(format!("malformed crontab '{crontab}': {e}"))
            })?;
            Ok(Schedule::period(start, end, crontab))
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Status a job takes right after materialization.
///
/// Immediate one-shot jobs run at once; a future one-shot time or a period
/// that has not begun leaves the job `Starting`.
pub fn initial_status(schedule: &Schedule, now: NaiveDateTime) -> PushStatus {
    match start_instant(schedule, Some(now)) {
        Some(start) if start > now => PushStatus::Starting,
        _ => PushStatus::Going,
    }
}

/// Instant the first run is due.
///
/// An immediate one-shot schedule starts at publication.
pub fn start_instant(schedule: &Schedule, published_at: Option<NaiveDateTime>) -> Option<NaiveDateTime> {
    match schedule.schedule_type {
        ScheduleType::Once => schedule.once_at.or(published_at),
        ScheduleType::Period => schedule.start_date.map(midnight),
    }
}

/// Instant from which a run counts as the job's last one.
///
/// The bound is inclusive: a run started exactly at this instant closes the
/// job. For a timed one-shot schedule it is the one-shot time; for periods
/// it is the beginning of the end date, so the final day's run closes the
/// job. An immediate one-shot job is anchored at its publication, less
/// [`IMMEDIATE_RUN_CLOCK_SKEW_SECS`], since the engine may stamp the run in
/// an earlier second than the one recorded.
pub fn end_instant(schedule: &Schedule, published_at: Option<NaiveDateTime>) -> Option<NaiveDateTime> {
    match schedule.schedule_type {
        ScheduleType::Once if schedule.is_immediate() => published_at
            .map(|at| at - Duration::seconds(IMMEDIATE_RUN_CLOCK_SKEW_SECS)),
        ScheduleType::Once => start_instant(schedule, published_at),
        ScheduleType::Period => schedule.end_date.map(midnight),
    }
}

/// Whether the schedule time or start date has arrived.
pub fn is_due(schedule: &Schedule, published_at: Option<NaiveDateTime>, now: NaiveDateTime) -> bool {
    start_instant(schedule, published_at).map_or(true, |start| start <= now)
}

/// Workflow registration for a scheduled job.
pub fn workflow_spec(job_id: &str, schedule: &Schedule) -> WorkflowSpec {
    WorkflowSpec {
        job_id: job_id.to_string(),
        crontab: schedule.crontab.clone(),
        start_date: schedule.start_date,
        end_date: schedule.end_date,
        once_at: schedule.once_at,
    }
}
