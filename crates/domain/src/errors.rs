//! Error types used throughout the push engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for DataPush
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum DataPushError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Request rejected before any SQL was generated or state changed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A selected field's type has no mapping across the dialect pair.
    #[error("No type mapping: {0}")]
    TypeMapping(String),

    /// The (status, operation) pair is not legal.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Error reported by the sync-execution engine.
    #[error("Sync engine error{}: {message}", code.map(|c| format!(" ({c})")).unwrap_or_default())]
    SyncEngine { code: Option<u32>, message: String },

    /// Error reported by any other external collaborator.
    #[error("Downstream error: {0}")]
    Downstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DataPushError {
    /// Stable label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Database(_) => "database",
            Self::Config(_) => "config",
            Self::Network(_) => "network",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::TypeMapping(_) => "type_mapping",
            Self::InvalidOperation(_) => "invalid_operation",
            Self::SyncEngine { .. } => "sync_engine",
            Self::Downstream(_) => "downstream",
            Self::Internal(_) => "internal",
        }
    }
}

/// Result type alias for DataPush operations
pub type Result<T> = std::result::Result<T, DataPushError>;
