#![allow(dead_code)]

use std::collections::VecDeque;
use std::error::Error;
use std::sync::{Arc, Mutex};

use db::store::Document;
use db::{
    CoordinatorConfig, DbConfig, DbError, DocumentStore, Filter, MemoryStore, QueueCoordinator,
    ReturnImage, SurrealStore, Update,
};

pub async fn coordinator<S: DocumentStore>(
    store: S,
) -> Result<QueueCoordinator<S>, Box<dyn Error>> {
    let config = CoordinatorConfig::default();
    db::init_schema(&store, &config).await?;
    Ok(QueueCoordinator::new(store, &config)?)
}

pub async fn memory_frontier() -> Result<QueueCoordinator<MemoryStore>, Box<dyn Error>> {
    coordinator(MemoryStore::new()).await
}

pub async fn surreal_frontier() -> Result<QueueCoordinator<SurrealStore>, Box<dyn Error>> {
    coordinator(SurrealStore::connect(&DbConfig::memory()).await?).await
}

type Failures = Arc<Mutex<VecDeque<DbError>>>;

/// In-memory store that fails the next queued `update_many` or `delete`
/// calls with the given errors.
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    update_failures: Failures,
    delete_failures: Failures,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_update(&self, error: DbError) {
        push(&self.update_failures, error);
    }

    pub fn fail_next_delete(&self, error: DbError) {
        push(&self.delete_failures, error);
    }
}

fn push(failures: &Failures, error: DbError) {
    if let Ok(mut queue) = failures.lock() {
        queue.push_back(error);
    }
}

fn take(failures: &Failures) -> Result<(), DbError> {
    let next = failures.lock().ok().and_then(|mut queue| queue.pop_front());
    match next {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

impl DocumentStore for FlakyStore {
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>, DbError> {
        self.inner.find_one(collection, filter).await
    }

    async fn insert(&self, collection: &str, doc: Document) -> Result<(), DbError> {
        self.inner.insert(collection, doc).await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<u64, DbError> {
        take(&self.update_failures)?;
        self.inner.update_many(collection, filter, update).await
    }

    async fn find_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        image: ReturnImage,
    ) -> Result<Option<Document>, DbError> {
        self.inner
            .find_and_update(collection, filter, update, image)
            .await
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> Result<u64, DbError> {
        take(&self.delete_failures)?;
        self.inner.delete(collection, filter).await
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, DbError> {
        self.inner.count(collection, filter).await
    }

    async fn create_index(
        &self,
        collection: &str,
        field: &str,
        background: bool,
    ) -> Result<(), DbError> {
        self.inner.create_index(collection, field, background).await
    }
}
