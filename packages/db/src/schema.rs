//! Collection indexes used by the queue protocol.

use frontier_core::{QueueEntry, ResultRecord};

use crate::{CoordinatorConfig, DbError, DocumentStore, QueueCoordinator};

/// Queue fields every claim, dedupe and terminal operation filters on.
pub const QUEUE_INDEX_FIELDS: &[&str] = &[QueueEntry::KEY, QueueEntry::BUSY, QueueEntry::REJECTED];

/// Result fields the enqueue dedupe check filters on.
pub const RESULT_INDEX_FIELDS: &[&str] = &[ResultRecord::KEY];

/// Initialize the collections used by the coordinator.
///
/// Requests background lookup indexes; the collections themselves are
/// created on first write.
pub async fn init_schema<S: DocumentStore>(
    store: &S,
    config: &CoordinatorConfig,
) -> Result<(), DbError> {
    tracing::info!(
        "Initializing frontier collections: {}, {}",
        config.queue_collection,
        config.result_collection
    );

    QueueCoordinator::new(store.clone(), config)?
        .ensure_indexes()
        .await?;

    tracing::info!("Frontier collections initialized");
    Ok(())
}
