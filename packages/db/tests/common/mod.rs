#![allow(dead_code)]

use db::{CoordinatorConfig, DbConfig, DbError, MemoryStore, QueueCoordinator, SurrealStore};

pub async fn surreal_store() -> Result<SurrealStore, DbError> {
    // Every mem:// connection opens its own datastore.
    SurrealStore::connect(&DbConfig::memory()).await
}

pub fn memory_store() -> MemoryStore {
    MemoryStore::new()
}

pub async fn surreal_coordinator() -> Result<QueueCoordinator<SurrealStore>, DbError> {
    let config = CoordinatorConfig::default();
    let store = surreal_store().await?;
    db::init_schema(&store, &config).await?;
    QueueCoordinator::new(store, &config)
}

pub async fn memory_coordinator() -> Result<QueueCoordinator<MemoryStore>, DbError> {
    let config = CoordinatorConfig::default();
    let store = memory_store();
    db::init_schema(&store, &config).await?;
    QueueCoordinator::new(store, &config)
}
