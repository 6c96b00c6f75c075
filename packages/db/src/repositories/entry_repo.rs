//! Entry repository for the queue collection.

use frontier_core::{QueueEntry, QueueStats};

use crate::DbError;
use crate::store::{DocumentStore, Filter, ReturnImage, Update, from_document, to_document};

/// Repository for queue entry operations, keyed by business key.
#[derive(Clone)]
pub struct EntryRepository<S> {
    store: S,
    collection: String,
}

impl<S: DocumentStore> EntryRepository<S> {
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
        Filter::new().where_eq(QueueEntry::KEY, key)
    }

    fn claimable() -> Filter {
        Filter::new()
            .where_eq(QueueEntry::BUSY, false)
            .where_eq(QueueEntry::REJECTED, false)
    }

    /// Check if an entry exists, whatever its flags.
    pub async fn exists(&self, key: &str) -> Result<bool, DbError> {
        let found = self
            .store
            .find_one(&self.collection, &Self::by_key(key))
            .await?;
        Ok(found.is_some())
    }

    /// Get an entry by key.
    pub async fn get(&self, key: &str) -> Result<Option<QueueEntry>, DbError> {
        self.store
            .find_one(&self.collection, &Self::by_key(key))
            .await?
            .map(from_document)
            .transpose()
    }

    /// Append a new entry. It is stored available for claiming, whatever
    /// flags the caller set.
    pub async fn insert(&self, entry: &QueueEntry) -> Result<(), DbError> {
        let fresh = QueueEntry {
            busy: false,
            rejected: false,
            ..entry.clone()
        };

        self.store
            .insert(&self.collection, to_document(&fresh)?)
            .await?;

        tracing::debug!("Inserted queue entry {}", fresh.key);
        Ok(())
    }

    /// Atomically claim one available entry, returning its pre-claim image.
    ///
    /// Which entry is picked is up to the store. The at-most-one-claim
    /// guarantee rests entirely on the store's atomic find-and-update.
    pub async fn claim_one(&self) -> Result<Option<QueueEntry>, DbError> {
        let claimed = self
            .store
            .find_and_update(
                &self.collection,
                &Self::claimable(),
                &Update::new().set(QueueEntry::BUSY, true),
                ReturnImage::Before,
            )
            .await?;

        let Some(doc) = claimed else {
            return Ok(None);
        };

        let entry: QueueEntry = from_document(doc)?;
        tracing::debug!("Claimed queue entry {}", entry.key);
        Ok(Some(entry))
    }

    /// Set the busy flag of an entry. Missing keys are a no-op.
    pub async fn release(&self, key: &str, busy: bool) -> Result<(), DbError> {
        let matched = self
            .store
            .update_many(
                &self.collection,
                &Self::by_key(key),
                &Update::new().set(QueueEntry::BUSY, busy),
            )
            .await?;

        if matched == 0 {
            tracing::debug!("Release of {} matched no entry", key);
        }
        Ok(())
    }

    /// Mark an entry rejected. Returns whether an entry matched.
    pub async fn reject(&self, key: &str) -> Result<bool, DbError> {
        let matched = self
            .store
            .update_many(
                &self.collection,
                &Self::by_key(key),
                &Update::new().set(QueueEntry::REJECTED, true),
            )
            .await?;

        Ok(matched > 0)
    }

    /// Delete an entry. Missing keys are a no-op.
    pub async fn remove(&self, key: &str) -> Result<(), DbError> {
        let removed = self
            .store
            .delete(&self.collection, &Self::by_key(key))
            .await?;

        tracing::debug!("Removed {} queue row(s) for {}", removed, key);
        Ok(())
    }

    /// Request a background lookup index on `field`.
    pub async fn ensure_lookup_index(&self, field: &str) -> Result<(), DbError> {
        self.store.create_index(&self.collection, field, true).await
    }

    /// Count entries by state.
    pub async fn stats(&self) -> Result<QueueStats, DbError> {
        let pending = self
            .store
            .count(&self.collection, &Self::claimable())
            .await?;
        let busy = self
            .store
            .count(
                &self.collection,
                &Filter::new()
                    .where_eq(QueueEntry::BUSY, true)
                    .where_eq(QueueEntry::REJECTED, false),
            )
            .await?;
        let rejected = self
            .store
            .count(
                &self.collection,
                &Filter::new().where_eq(QueueEntry::REJECTED, true),
            )
            .await?;

        Ok(QueueStats {
            pending,
            busy,
            rejected,
        })
    }

    /// Release every claimed, non-rejected entry.
    ///
    /// Operator recovery for claims left behind by crashed workers. Only
    /// safe while no worker is running: live claims are released too.
    pub async fn reset_claims(&self) -> Result<u64, DbError> {
        let released = self
            .store
            .update_many(
                &self.collection,
                &Filter::new()
                    .where_eq(QueueEntry::BUSY, true)
                    .where_eq(QueueEntry::REJECTED, false),
                &Update::new().set(QueueEntry::BUSY, false),
            )
            .await?;

        tracing::info!("Reset {} stale claim(s) in {}", released, self.collection);
        Ok(released)
    }
}
