//! Result repository for the output collection.

use frontier_core::{ResultRecord, ResultStats};

use crate::DbError;
use crate::store::{DocumentStore, Filter, Update, from_document, to_document};

/// Repository for processed records. Sole writer of `uploaded`.
#[derive(Clone)]
pub struct ResultRepository<S> {
    store: S,
    collection: String,
}

impl<S: DocumentStore> ResultRepository<S> {
    pub fn new(store: S, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn by_key(key: &str) -> Filter {
        Filter::new().where_eq(ResultRecord::KEY, key)
    }

    /// Check if a record exists for the key.
    pub async fn is_processed(&self, key: &str) -> Result<bool, DbError> {
        let found = self
            .store
            .find_one(&self.collection, &Self::by_key(key))
            .await?;
        Ok(found.is_some())
    }

    /// Get a record by key.
    pub async fn get(&self, key: &str) -> Result<Option<ResultRecord>, DbError> {
        self.store
            .find_one(&self.collection, &Self::by_key(key))
            .await?
            .map(from_document)
            .transpose()
    }

    /// Append a record. Duplicate inserts are not guarded.
    pub async fn insert(&self, record: &ResultRecord) -> Result<(), DbError> {
        self.store
            .insert(&self.collection, to_document(record)?)
            .await?;

        tracing::debug!("Recorded result for {}", record.key);
        Ok(())
    }

    /// Mark the secondary step done. Missing keys are a no-op.
    pub async fn mark_uploaded(&self, key: &str) -> Result<(), DbError> {
        self.store
            .update_many(
                &self.collection,
                &Self::by_key(key),
                &Update::new().set(ResultRecord::UPLOADED, true),
            )
            .await?;
        Ok(())
    }

    /// Request a background lookup index on `field`.
    pub async fn ensure_lookup_index(&self, field: &str) -> Result<(), DbError> {
        self.store.create_index(&self.collection, field, true).await
    }

    pub async fn stats(&self) -> Result<ResultStats, DbError> {
        let processed = self.store.count(&self.collection, &Filter::new()).await?;
        let uploaded = self
            .store
            .count(
                &self.collection,
                &Filter::new().where_eq(ResultRecord::UPLOADED, true),
            )
            .await?;

        Ok(ResultStats {
            processed,
            uploaded,
        })
    }
}
