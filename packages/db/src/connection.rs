//! Database connection configuration and setup.

use surrealdb::Surreal;
use surrealdb::engine::any::{Any, connect as connect_any};

use crate::DbError;

/// Database connection wrapper.
pub type Database = Surreal<Any>;

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Connection mode: "mem://", "file://path" or "rocksdb://path"
    pub endpoint: String,
    /// Namespace to use
    pub namespace: String,
    /// Database name to use
    pub database: String,
    /// How often the adapter re-runs an atomic update that lost a write conflict.
    pub conflict_retries: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            endpoint: "mem://".to_string(),
            namespace: "frontier".to_string(),
            database: "main".to_string(),
            conflict_retries: 16,
        }
    }
}

impl DbConfig {
    /// Create a config for in-memory testing.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Create a config for file-based persistence.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            endpoint: format!("file://{}", path.into()),
            ..Default::default()
        }
    }

    /// Create a config for RocksDB persistence (requires rocksdb feature).
    pub fn rocksdb(path: impl Into<String>) -> Self {
        Self {
            endpoint: format!("rocksdb://{}", path.into()),
            ..Default::default()
        }
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the database name.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the write-conflict retry bound.
    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }

    /// Build a config from environment variables.
    ///
    /// - `FRONTIER_DB_ENDPOINT` (default: `mem://`)
    /// - `FRONTIER_DB_NAMESPACE` (default: `frontier`)
    /// - `FRONTIER_DB_DATABASE` (default: `main`)
    /// - `FRONTIER_DB_CONFLICT_RETRIES` (default: 16)
    pub fn from_env() -> Result<Self, DbError> {
        let mut config = Self::default();

        if let Some(endpoint) = env_value("FRONTIER_DB_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Some(namespace) = env_value("FRONTIER_DB_NAMESPACE") {
            config.namespace = namespace;
        }
        if let Some(database) = env_value("FRONTIER_DB_DATABASE") {
            config.database = database;
        }
        if let Some(retries) = env_value("FRONTIER_DB_CONFLICT_RETRIES") {
            config.conflict_retries = retries.parse().map_err(|_| {
                DbError::InvalidConfig(format!(
                    "invalid FRONTIER_DB_CONFLICT_RETRIES={retries} (expected an integer)"
                ))
            })?;
        }

        Ok(config)
    }
}

pub(crate) fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Open a database connection.
///
/// The handle is meant to be created once per process and shared by
/// cloning; it is never stored globally.
pub async fn connect(config: &DbConfig) -> Result<Database, DbError> {
    tracing::info!("Connecting to database: {}", config.endpoint);

    let db = connect_any(&config.endpoint).await?;
    db.use_ns(&config.namespace).use_db(&config.database).await?;

    tracing::info!(
        "Connected to database: {}/{}",
        config.namespace,
        config.database
    );

    Ok(db)
}
