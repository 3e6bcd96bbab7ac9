//! Translation of downstream failures into operator-facing notes
//!
//! The sync engine reports some failures only as free text with embedded
//! numeric codes. All pattern matching on that payload lives here.

use datapush_domain::constants::MAX_ERROR_MESSAGE_LEN;
use datapush_domain::{DataPushError, EngineFault};

const CODE_TIME_ORDERING: u32 = 80003;
const CODE_SCHEDULING_CONFLICT: u32 = 80004;
const CODE_MODEL_DELETED: u32 = 80005;

/// Classify a sync engine failure: structured code first, payload second.
pub fn classify_engine_error(code: Option<u32>, message: &str) -> EngineFault {
    match code {
        Some(CODE_TIME_ORDERING) => return EngineFault::TimeOrdering,
        Some(CODE_SCHEDULING_CONFLICT) => return EngineFault::SchedulingConflict,
        Some(CODE_MODEL_DELETED) => return EngineFault::ModelDeleted,
        _ => {}
    }

    let text = message.to_lowercase();
    if text.contains("80003") || text.contains("end time") || text.contains("start time") {
        EngineFault::TimeOrdering
    } else if text.contains("80004") || text.contains("conflict") {
        EngineFault::SchedulingConflict
    } else if text.contains("80005") || text.contains("not exist") || text.contains("deleted") {
        EngineFault::ModelDeleted
    } else {
        EngineFault::Generic
    }
}

/// Human-readable cause stored on a job's error field.
pub fn error_note(err: &DataPushError) -> String {
    let note = match err {
        DataPushError::SyncEngine { code, message } => {
            format!("{}: {message}", classify_engine_error(*code, message))
        }
        other => other.to_string(),
    };
    if note.chars().count() > MAX_ERROR_MESSAGE_LEN {
        note.chars().take(MAX_ERROR_MESSAGE_LEN).collect()
    } else {
        note
    }
}
