//! Worker runtime errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Database error: {0}")]
    Database(#[from] db::DbError),

    #[error("Failed to spawn actor: {0}")]
    Spawn(String),

    #[error("Actor messaging failed: {0}")]
    Messaging(String),

    #[error("Invalid worker configuration: {0}")]
    InvalidConfig(String),
}

impl From<ractor::SpawnErr> for WorkerError {
    fn from(err: ractor::SpawnErr) -> Self {
        WorkerError::Spawn(err.to_string())
    }
}
