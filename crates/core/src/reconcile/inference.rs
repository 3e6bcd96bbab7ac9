//! Status inference from execution history

use chrono::NaiveDateTime;
use datapush_domain::{
    ExecutionHistory, ExecutionLogEntry, OneShotCompletion, PushJob, PushStatus, ScheduleType,
};

use crate::schedule::{end_instant, start_instant};

const SUCCESS_STATUSES: [&str; 4] = ["success", "succeeded", "finished", "completed"];

/// Whether an execution log status reports success.
pub fn is_success_status(status: &str) -> bool {
    let status = status.trim();
    SUCCESS_STATUSES.iter().any(|s| s.eq_ignore_ascii_case(status))
}

/// Status the job should have given what the sync engine has executed.
///
/// Only `Starting` and `Going` jobs move; a job promoted to `Going` in this
/// call is checked for completion in the same call.
pub fn infer_status(
    job: &PushJob,
    history: &ExecutionHistory,
    now: NaiveDateTime,
    policy: OneShotCompletion,
) -> PushStatus {
    let latest = history.latest();
    let mut status = job.status;

    if status == PushStatus::Starting && has_started(job, latest, now) {
        status = PushStatus::Going;
    }
    if status == PushStatus::Going && has_completed(job, latest, policy) {
        status = PushStatus::End;
    }
    status
}

fn has_started(job: &PushJob, latest: Option<&ExecutionLogEntry>, now: NaiveDateTime) -> bool {
    let Some(start) = start_instant(&job.schedule, job.published_at) else {
        return true;
    };
    start <= now || latest.and_then(ExecutionLogEntry::started_at).is_some_and(|at| at >= start)
}

fn has_completed(job: &PushJob, latest: Option<&ExecutionLogEntry>, policy: OneShotCompletion) -> bool {
    let Some(entry) = latest else {
        return false;
    };
    if !entry.is_finished() {
        return false;
    }
    let Some(started) = entry.started_at() else {
        return false;
    };
    let after_end = end_instant(&job.schedule, job.published_at).map_or(true, |end| started >= end);
    if !after_end {
        return false;
    }

    match (job.schedule.schedule_type, policy) {
        (ScheduleType::Once, OneShotCompletion::SuccessOnly) => is_success_status(&entry.status),
        _ => true,
    }
}
