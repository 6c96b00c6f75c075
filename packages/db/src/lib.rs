//! Document store integration for the crawl frontier.
//!
//! This crate provides the store contract, its SurrealDB and in-process
//! adapters, the entry/result repositories and the queue coordinator
//! that composes them into the claim/release/complete protocol.
//!
//! # Features
//!
//! - `memory` (default): Use in-memory storage for testing
//! - `rocksdb`: Use RocksDB for persistent file-based storage

mod connection;
mod error;
mod schema;
pub mod coordinator;
pub mod repositories;
pub mod store;

pub use connection::{Database, DbConfig, connect};
pub use coordinator::{CoordinatorConfig, QueueCoordinator};
pub use error::DbError;
pub use schema::init_schema;
pub use store::{DocumentStore, Filter, MemoryStore, ReturnImage, SurrealStore, Update};

/// Connect to SurrealDB and prepare a coordinator over it.
///
/// This should be called once at process startup; the returned
/// coordinator is cloned into every worker.
pub async fn init(
    db_config: &DbConfig,
    config: &CoordinatorConfig,
) -> Result<QueueCoordinator<SurrealStore>, DbError> {
    let store = SurrealStore::connect(db_config).await?;
    init_schema(&store, config).await?;
    QueueCoordinator::new(store, config)
}
