//! Store error type shared by the adapters, repositories and coordinator.

use thiserror::Error;

/// Database errors.
///
/// A missing key on update or delete is not an error: those operations
/// are idempotent and return `Ok`.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(surrealdb::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Write conflict: {0}")]
    Conflict(String),
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
    #[error("Invalid field name: {0:?}")]
    InvalidField(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DbError {
    /// Check if the caller may reasonably retry the same call later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DbError::Connection(_) | DbError::Unavailable(_) | DbError::Conflict(_)
        )
    }
}

impl From<surrealdb::Error> for DbError {
    fn from(err: surrealdb::Error) -> Self {
        let message = err.to_string();
        let lowered = message.to_ascii_lowercase();

        if lowered.contains("already exists") {
            return DbError::DuplicateKey(message);
        }
        if lowered.contains("conflict") || lowered.contains("can be retried") {
            return DbError::Conflict(message);
        }

        match err {
            surrealdb::Error::Db(_) => DbError::Query(message),
            other => DbError::Connection(other),
        }
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}
