//! Conversions from external infrastructure errors into domain errors.

use datapush_domain::DataPushError;
use r2d2::Error as PoolError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use tokio::task::JoinError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub DataPushError);

impl From<InfraError> for DataPushError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<DataPushError> for InfraError {
    fn from(value: DataPushError) -> Self {
        InfraError(value)
    }
}

impl std::fmt::Display for InfraError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

trait IntoDataPushError {
    fn into_datapush(self) -> DataPushError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → DataPushError */
/* -------------------------------------------------------------------------- */

impl IntoDataPushError for SqlError {
    fn into_datapush(self) -> DataPushError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        DataPushError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        DataPushError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 1555 | 2067) => {
                        DataPushError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        DataPushError::Database("foreign key constraint violation".into())
                    }
                    _ => DataPushError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => DataPushError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                DataPushError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                DataPushError::Database(format!("invalid column type: {ty}"))
            }
            RE::InvalidPath(path) => DataPushError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => DataPushError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_datapush())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → DataPushError */
/* -------------------------------------------------------------------------- */

impl From<PoolError> for InfraError {
    fn from(value: PoolError) -> Self {
        InfraError(DataPushError::Database(format!("connection pool error: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* tokio::task::JoinError → DataPushError */
/* -------------------------------------------------------------------------- */

impl From<JoinError> for InfraError {
    fn from(value: JoinError) -> Self {
        let message = if value.is_cancelled() {
            "blocking task cancelled".to_string()
        } else {
            format!("blocking task failed: {value}")
        };
        InfraError(DataPushError::Internal(message))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → DataPushError */
/* -------------------------------------------------------------------------- */

impl IntoDataPushError for HttpError {
    fn into_datapush(self) -> DataPushError {
        if self.is_timeout() {
            return DataPushError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return DataPushError::Network("HTTP connection failure".into());
        }

        if self.is_decode() {
            return DataPushError::Downstream(format!("malformed response body: {self}"));
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                404 => DataPushError::NotFound(message),
                400..=499 => DataPushError::Downstream(message),
                _ => DataPushError::Network(message),
            };
        }

        DataPushError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_datapush())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
