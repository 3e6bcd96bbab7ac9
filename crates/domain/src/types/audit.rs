//! Audit workflow messages

use serde::{Deserialize, Serialize};

/// Approval process bound to an audit type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditProcess {
    pub process_id: String,
    pub audit_type: String,
}

/// Audit-apply message submitted when a gated operation is requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditApply {
    pub apply_id: String,
    pub tenant_id: String,
    pub job_id: String,
    pub audit_type: String,
    pub process_id: String,
    /// Serialized job metadata shown to reviewers.
    pub metadata: serde_json::Value,
}

/// Asynchronous message delivered by the audit service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditMessage {
    /// Final verdict on an apply.
    Result {
        #[serde(rename = "applyId")]
        apply_id: String,
        pass: bool,
        #[serde(default)]
        comment: Option<String>,
    },
    /// Intermediate progress on an apply.
    Process {
        #[serde(rename = "applyId")]
        apply_id: String,
        #[serde(default)]
        node: String,
    },
    /// The approval definition for an audit type was removed.
    DefinitionDeleted {
        #[serde(rename = "auditType")]
        audit_type: String,
    },
}
