//! Push job aggregate and its enums

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::dialect::Dialect;
use super::schedule::{Schedule, ScheduleBody};
use crate::constants::{
    AUDIT_TYPE_CHANGE, AUDIT_TYPE_PUBLISH, AUDIT_TYPE_RESTART, AUDIT_TYPE_STOP,
};

/// Whether a job copies every row per run or only rows past the watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransmitMode {
    Full,
    Incremental,
}

crate::impl_domain_code_conversions!(TransmitMode {
    Full => (0, "full"),
    Incremental => (1, "incremental"),
});

/// Lifecycle status of a push job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushStatus {
    /// Created implicitly; not yet shown as a draft.
    Shadow,
    Draft,
    /// Publication submitted and awaiting audit.
    Waiting,
    /// Materialized, first run not yet due.
    Starting,
    Going,
    Stopped,
    /// Terminal.
    End,
}

crate::impl_domain_code_conversions!(PushStatus {
    Shadow => (0, "shadow"),
    Draft => (1, "draft"),
    Waiting => (2, "waiting"),
    Starting => (3, "starting"),
    Going => (4, "going"),
    Stopped => (5, "stopped"),
    End => (6, "end"),
});

impl PushStatus {
    pub const ALL: [Self; 7] = [
        Self::Shadow,
        Self::Draft,
        Self::Waiting,
        Self::Starting,
        Self::Going,
        Self::Stopped,
        Self::End,
    ];

    pub fn is_terminal(self) -> bool {
        self == Self::End
    }

    /// Materialized in the sync engine (a workflow or model exists).
    pub fn is_live(self) -> bool {
        matches!(self, Self::Starting | Self::Going | Self::Stopped)
    }

    /// Not yet materialized; SQL and fields may still be replaced.
    pub fn is_editable(self) -> bool {
        matches!(self, Self::Shadow | Self::Draft | Self::Waiting)
    }
}

/// Audit workflow state of a push job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditState {
    Unaudited,
    Auditing,
    Pass,
    Reject,
    Revocation,
}

crate::impl_domain_code_conversions!(AuditState {
    Unaudited => (0, "unaudited"),
    Auditing => (1, "auditing"),
    Pass => (2, "pass"),
    Reject => (3, "reject"),
    Revocation => (4, "revocation"),
});

impl AuditState {
    /// States the status reconciler picks jobs up in.
    pub fn is_reconcilable(self) -> bool {
        matches!(self, Self::Pass | Self::Unaudited)
    }
}

/// Lifecycle operation requested on a push job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Publish,
    Change,
    Stop,
    Restart,
}

crate::impl_domain_code_conversions!(Operation {
    Publish => (1, "publish"),
    Change => (2, "change"),
    Stop => (3, "stop"),
    Restart => (4, "restart"),
});

impl Operation {
    pub const ALL: [Self; 4] = [Self::Publish, Self::Change, Self::Stop, Self::Restart];

    /// Audit type an approval process is bound to for this operation.
    pub fn audit_type(self) -> &'static str {
        match self {
            Self::Publish => AUDIT_TYPE_PUBLISH,
            Self::Change => AUDIT_TYPE_CHANGE,
            Self::Stop => AUDIT_TYPE_STOP,
            Self::Restart => AUDIT_TYPE_RESTART,
        }
    }
}

/// Where the data comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceTable {
    pub catalog_id: String,
    pub table_id: String,
    pub table_name: String,
    pub datasource_id: String,
    pub department_id: String,
    pub dialect: Dialect,
}

/// Target database the table lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum TargetLocation {
    Datasource(String),
    Sandbox(String),
}

impl TargetLocation {
    pub fn id(&self) -> &str {
        match self {
            Self::Datasource(id) | Self::Sandbox(id) => id,
        }
    }
}

/// Where the data goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetTable {
    pub location: TargetLocation,
    pub table_name: String,
    /// The table already exists; no `CREATE TABLE` is generated.
    pub table_exists: bool,
    pub dialect: Dialect,
}

/// One selected target column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushField {
    pub source_name: String,
    pub source_type: String,
    pub target_name: String,
    #[serde(default)]
    pub target_business_name: String,
    /// Target-dialect type. Filled in by SQL synthesis.
    #[serde(default)]
    pub target_type: String,
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub masking_rule_id: Option<String>,
}

fn default_nullable() -> bool {
    true
}

/// Generated statements of a push job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizedSql {
    pub create_sql: Option<String>,
    pub insert_sql: String,
    pub update_sql: Option<String>,
}

/// Push job aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushJob {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub source: SourceTable,
    pub target: TargetTable,
    pub transmit_mode: TransmitMode,
    pub increment_field: Option<String>,
    pub high_water_mark: Option<NaiveDateTime>,
    /// Incremental jobs also update rows already present in the target.
    pub update_existing: bool,
    /// Target column names forming the primary key.
    pub primary_keys: Vec<String>,
    pub filter_condition: Option<String>,
    pub masking_enabled: bool,
    pub sql: SynthesizedSql,
    pub status: PushStatus,
    pub audit_state: AuditState,
    /// Operation suspended behind the audit gate.
    pub pending_operation: Option<Operation>,
    pub apply_id: Option<String>,
    pub schedule: Schedule,
    /// Encoded [`ScheduleBody`] awaiting application.
    pub draft_schedule: Option<String>,
    pub error_message: Option<String>,
    pub published_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub fields: Vec<PushField>,
}

impl PushJob {
    /// Primary keys in their persisted comma-joined form.
    pub fn primary_keys_joined(&self) -> String {
        self.primary_keys.join(",")
    }

    /// Field whose source column is the increment field.
    pub fn increment_source_field(&self) -> Option<&PushField> {
        let name = self.increment_field.as_deref()?;
        self.fields.iter().find(|f| f.source_name.eq_ignore_ascii_case(name))
    }
}

/// Split a comma-joined primary key list, dropping blanks.
pub fn split_primary_keys(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

/// Create or update request for a push job.
///
/// Times and dates stay in wire format here and are validated when the
/// request is turned into a [`PushJob`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushJobRequest {
    pub name: String,
    #[serde(default)]
    pub shadow: bool,
    pub source: SourceTable,
    pub target: TargetTable,
    pub transmit_mode: TransmitMode,
    #[serde(default)]
    pub increment_field: Option<String>,
    #[serde(default)]
    pub high_water_mark: Option<String>,
    #[serde(default)]
    pub update_existing: bool,
    #[serde(default)]
    pub primary_keys: Vec<String>,
    #[serde(default)]
    pub filter_condition: Option<String>,
    #[serde(default)]
    pub masking_enabled: bool,
    pub schedule: ScheduleBody,
    pub fields: Vec<PushField>,
}
