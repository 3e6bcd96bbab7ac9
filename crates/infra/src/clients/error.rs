//! Client-side error classification for the downstream services
//!
//! Transport failures are already domain errors when they leave
//! [`HttpClient::send`](crate::http::HttpClient::send); this type covers what
//! a service *answered*: a bad status, a non-zero envelope code, or a body
//! that cannot be read.

use datapush_domain::DataPushError;
use thiserror::Error;

/// Categories of downstream answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorCategory {
    /// 5xx - the service may recover on its own
    Server,
    /// 404 - the addressed resource does not exist
    NotFound,
    /// Other 4xx - the request itself is wrong
    Client,
    /// 2xx with a non-zero envelope code
    Rejected,
    /// Unreadable or unexpected body
    Decode,
}

/// Error answered by a downstream service
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{service} returned HTTP {status}: {body}")]
    Status { service: &'static str, status: u16, body: String },

    #[error("{service} rejected the request (code {code}): {message}")]
    Rejected { service: &'static str, code: i64, message: String },

    #[error("{service} sent an unreadable response: {message}")]
    Decode { service: &'static str, message: String },
}

impl ClientError {
    /// Get the error category for this error
    pub fn category(&self) -> ClientErrorCategory {
        match self {
            Self::Status { status: 404, .. } => ClientErrorCategory::NotFound,
            Self::Status { status, .. } if *status >= 500 => ClientErrorCategory::Server,
            Self::Status { .. } => ClientErrorCategory::Client,
            Self::Rejected { .. } => ClientErrorCategory::Rejected,
            Self::Decode { .. } => ClientErrorCategory::Decode,
        }
    }

    /// Whether the same request could succeed later
    pub fn is_transient(&self) -> bool {
        self.category() == ClientErrorCategory::Server
    }

    /// Sync engine failures keep their numeric code for fault classification.
    pub fn into_engine_error(self) -> DataPushError {
        match self {
            Self::Rejected { code, message, .. } => {
                DataPushError::SyncEngine { code: u32::try_from(code).ok(), message }
            }
            other => DataPushError::SyncEngine { code: None, message: other.to_string() },
        }
    }
}

impl From<ClientError> for DataPushError {
    fn from(err: ClientError) -> Self {
        match err.category() {
            ClientErrorCategory::NotFound => DataPushError::NotFound(err.to_string()),
            _ if err.is_transient() => DataPushError::Network(err.to_string()),
            _ => DataPushError::Downstream(err.to_string()),
        }
    }
}
