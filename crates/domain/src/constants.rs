//! Domain constants
//!
//! Centralized location for formats and defaults shared across crates.

/// Timestamp format for one-shot times, high-water marks and execution logs.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Date format for period start/end dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Allowance for the sync engine stamping an immediate run slightly before
/// the recorded publication instant (clock skew, whole-second storage).
pub const IMMEDIATE_RUN_CLOCK_SKEW_SECS: i64 = 5;

/// Lower bound used when an incremental job has no stored high-water mark.
pub const EPOCH_HIGH_WATER_MARK: &str = "1970-01-01 00:00:00";

// Audit types, one per gated operation
pub const AUDIT_TYPE_PUBLISH: &str = "push-publish";
pub const AUDIT_TYPE_CHANGE: &str = "push-change";
pub const AUDIT_TYPE_STOP: &str = "push-stop";
pub const AUDIT_TYPE_RESTART: &str = "push-restart";

// Reconciler defaults
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_HISTORY_PAGE_SIZE: u32 = 10;

/// Maximum length of the free-text error stored on a job.
pub const MAX_ERROR_MESSAGE_LEN: usize = 512;
