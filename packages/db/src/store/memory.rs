//! In-process document store.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;

use super::{
    Document, DocumentStore, Filter, ReturnImage, Update, validate_document, validate_field,
    validate_name,
};
use crate::DbError;

/// Document store held entirely in process memory.
///
/// Every operation runs under one async mutex, which makes
/// `find_and_update` trivially atomic. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: HashMap<String, Vec<Document>>,
    indexes: BTreeSet<(String, String)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes requested so far, as `(collection, field)` pairs.
    pub async fn indexes(&self) -> Vec<(String, String)> {
        self.inner.lock().await.indexes.iter().cloned().collect()
    }

    /// Number of documents in a collection.
    pub async fn len(&self, collection: &str) -> usize {
        self.inner
            .lock()
            .await
            .collections
            .get(collection)
            .map_or(0, Vec::len)
    }
}

impl DocumentStore for MemoryStore {
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>, DbError> {
        validate_name(collection)?;
        filter.validate()?;

        let state = self.inner.lock().await;
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| filter.matches(doc)))
            .cloned())
    }

    async fn insert(&self, collection: &str, doc: Document) -> Result<(), DbError> {
        validate_name(collection)?;
        validate_document(&doc)?;

        let mut state = self.inner.lock().await;
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(doc);
        Ok(())
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<u64, DbError> {
        validate_name(collection)?;
        filter.validate()?;
        update.validate()?;

        let mut state = self.inner.lock().await;
        let Some(docs) = state.collections.get_mut(collection) else {
            return Ok(0);
        };

        let mut matched = 0;
        for doc in docs.iter_mut().filter(|doc| filter.matches(doc)) {
            update.apply(doc);
            matched += 1;
        }
        Ok(matched)
    }

    async fn find_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        image: ReturnImage,
    ) -> Result<Option<Document>, DbError> {
        validate_name(collection)?;
        filter.validate()?;
        update.validate()?;

        let mut state = self.inner.lock().await;
        let Some(doc) = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|doc| filter.matches(doc)))
        else {
            return Ok(None);
        };

        let before = doc.clone();
        update.apply(doc);

        Ok(Some(match image {
            ReturnImage::Before => before,
            ReturnImage::After => doc.clone(),
        }))
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> Result<u64, DbError> {
        validate_name(collection)?;
        filter.validate()?;

        let mut state = self.inner.lock().await;
        let Some(docs) = state.collections.get_mut(collection) else {
            return Ok(0);
        };

        let before = docs.len();
        docs.retain(|doc| !filter.matches(doc));
        Ok((before - docs.len()) as u64)
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, DbError> {
        validate_name(collection)?;
        filter.validate()?;

        let state = self.inner.lock().await;
        Ok(state.collections.get(collection).map_or(0, |docs| {
            docs.iter().filter(|doc| filter.matches(doc)).count() as u64
        }))
    }

    async fn create_index(
        &self,
        collection: &str,
        field: &str,
        _background: bool,
    ) -> Result<(), DbError> {
        validate_name(collection)?;
        validate_field(field)?;

        let mut state = self.inner.lock().await;
        state
            .indexes
            .insert((collection.to_string(), field.to_string()));
        Ok(())
    }
}
