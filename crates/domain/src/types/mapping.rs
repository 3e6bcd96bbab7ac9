//! Type-mapping service payloads

use serde::{Deserialize, Serialize};

/// One entry of the vector sent to the type-mapping service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceColumnType {
    pub index: usize,
    pub source_type: String,
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default)]
    pub scale: Option<u32>,
}

/// One entry of the vector returned by the type-mapping service. The service
/// does not echo field names, so entries are matched by `index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedColumnType {
    pub index: usize,
    pub target_type: String,
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default)]
    pub scale: Option<u32>,
}
