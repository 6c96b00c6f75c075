//! Queue coordinator: the claim/release/complete protocol.
//!
//! Per business key the lifecycle is
//!
//! ```text
//! Absent -> Queued -> Claimed -> Completed          (row removed)
//!                             -> Released -> Queued
//!                             -> Rejected           (row kept, never claimed again)
//! ```
//!
//! The coordinator holds no locks and caches nothing: every decision is a
//! fresh store read, and mutual exclusion between workers comes only from
//! the store's atomic find-and-update. Store errors are returned unchanged
//! and never retried here; retry policy belongs to the caller.

use frontier_core::{EnqueueOutcome, FrontierStats, QueueEntry, ResultRecord};

use crate::DbError;
use crate::connection::env_value;
use crate::repositories::{EntryRepository, ResultRepository};
use crate::schema::{QUEUE_INDEX_FIELDS, RESULT_INDEX_FIELDS};
use crate::store::{DocumentStore, validate_name};

/// Collection names used by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Collection holding queue entries.
    pub queue_collection: String,
    /// Collection holding processed records.
    pub result_collection: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            queue_collection: "queue_entry".to_string(),
            result_collection: "crawl_result".to_string(),
        }
    }
}

impl CoordinatorConfig {
    /// Set the queue collection name.
    pub fn with_queue_collection(mut self, name: impl Into<String>) -> Self {
        self.queue_collection = name.into();
        self
    }

    /// Set the result collection name.
    pub fn with_result_collection(mut self, name: impl Into<String>) -> Self {
        self.result_collection = name.into();
        self
    }

    /// Build a config from environment variables.
    ///
    /// - `FRONTIER_QUEUE_COLLECTION` (default: `queue_entry`)
    /// - `FRONTIER_RESULT_COLLECTION` (default: `crawl_result`)
    pub fn from_env() -> Result<Self, DbError> {
        let mut config = Self::default();
        if let Some(name) = env_value("FRONTIER_QUEUE_COLLECTION") {
            config.queue_collection = name;
        }
        if let Some(name) = env_value("FRONTIER_RESULT_COLLECTION") {
            config.result_collection = name;
        }
        config.validate()?;
        Ok(config)
    }

    /// Check both names are plain identifiers and distinct.
    pub fn validate(&self) -> Result<(), DbError> {
        validate_name(&self.queue_collection)?;
        validate_name(&self.result_collection)?;
        if self.queue_collection == self.result_collection {
            return Err(DbError::InvalidConfig(format!(
                "queue and result collections must differ (both {})",
                self.queue_collection
            )));
        }
        Ok(())
    }
}

/// Public contract of the crawl frontier.
#[derive(Clone)]
pub struct QueueCoordinator<S> {
    entries: EntryRepository<S>,
    results: ResultRepository<S>,
}

impl<S: DocumentStore> QueueCoordinator<S> {
    /// Build a coordinator over one store handle.
    pub fn new(store: S, config: &CoordinatorConfig) -> Result<Self, DbError> {
        config.validate()?;
        Ok(Self::from_repositories(
            EntryRepository::new(store.clone(), config.queue_collection.clone()),
            ResultRepository::new(store, config.result_collection.clone()),
        ))
    }

    pub fn from_repositories(entries: EntryRepository<S>, results: ResultRepository<S>) -> Self {
        Self { entries, results }
    }

    pub fn entries(&self) -> &EntryRepository<S> {
        &self.entries
    }

    pub fn results(&self) -> &ResultRepository<S> {
        &self.results
    }

    /// Submit a key with an empty routing key.
    pub async fn enqueue(&self, key: &str) -> Result<EnqueueOutcome, DbError> {
        self.enqueue_entry(QueueEntry::new(key)).await
    }

    /// Submit a key with an opaque routing key.
    pub async fn enqueue_routed(
        &self,
        key: &str,
        routing_key: &str,
    ) -> Result<EnqueueOutcome, DbError> {
        self.enqueue_entry(QueueEntry::new(key).with_routing_key(routing_key))
            .await
    }

    /// Processed check, then queued check, then insert.
    ///
    /// Best effort: two producers racing on the same key can both pass the
    /// checks and both insert. Terminal operations act on every row for a
    /// key, so such duplicates are harmless.
    async fn enqueue_entry(&self, entry: QueueEntry) -> Result<EnqueueOutcome, DbError> {
        if self.results.is_processed(&entry.key).await? {
            tracing::debug!("Refused {}: already processed", entry.key);
            return Ok(EnqueueOutcome::AlreadyProcessed);
        }

        if self.entries.exists(&entry.key).await? {
            tracing::debug!("Refused {}: already queued", entry.key);
            return Ok(EnqueueOutcome::AlreadyQueued);
        }

        self.entries.insert(&entry).await?;
        Ok(EnqueueOutcome::Enqueued)
    }

    /// Claim the next available entry. The caller owns it until it calls
    /// `complete`, `reject` or `release`.
    ///
    /// A call abandoned by the caller may still have committed its claim.
    pub async fn claim_next(&self) -> Result<Option<QueueEntry>, DbError> {
        self.entries.claim_one().await
    }

    /// Remove a finished entry.
    ///
    /// Callers should write the result record first so a crash in between
    /// never loses the processed marker; see `complete_with`.
    pub async fn complete(&self, key: &str) -> Result<(), DbError> {
        self.entries.remove(key).await
    }

    /// Record the result, then remove the entry.
    ///
    /// Two writes in that order, not a transaction. A crash between them
    /// leaves a queue row whose re-enqueue is still refused. Safe to call
    /// again after a failure: an existing record for the key is kept and
    /// only the removal is repeated.
    pub async fn complete_with(&self, record: &ResultRecord) -> Result<(), DbError> {
        if self.results.is_processed(&record.key).await? {
            tracing::debug!("Result for {} already recorded", record.key);
        } else {
            self.results.insert(record).await?;
        }
        self.entries.remove(&record.key).await
    }

    /// Mark a claimed entry as failing acceptance criteria.
    ///
    /// The row is kept for audit, is never claimed again and keeps refusing
    /// re-enqueue. Returns whether an entry matched.
    pub async fn reject(&self, key: &str) -> Result<bool, DbError> {
        self.entries.reject(key).await
    }

    /// Give a claim back so another worker can take it.
    pub async fn release(&self, key: &str) -> Result<(), DbError> {
        self.entries.release(key, false).await
    }

    /// Record that the secondary step finished. Independent of queue state.
    pub async fn mark_secondary_complete(&self, key: &str) -> Result<(), DbError> {
        self.results.mark_uploaded(key).await
    }

    /// Request the background lookup indexes on both collections.
    pub async fn ensure_indexes(&self) -> Result<(), DbError> {
        for field in QUEUE_INDEX_FIELDS {
            self.entries.ensure_lookup_index(field).await?;
        }
        for field in RESULT_INDEX_FIELDS {
            self.results.ensure_lookup_index(field).await?;
        }
        Ok(())
    }

    pub async fn stats(&self) -> Result<FrontierStats, DbError> {
        let queue = self.entries.stats().await?;
        let results = self.results.stats().await?;
        Ok(FrontierStats::new(queue, results))
    }
}
