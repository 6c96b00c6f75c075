//! Document store contract and its adapters.
//!
//! The coordinator only needs a handful of primitives from the store.
//! The one with real correctness weight is [`DocumentStore::find_and_update`]:
//! matching the filter, applying the update and returning the image must
//! happen as one indivisible step per document. Two concurrent callers
//! must never both receive the same pre-update document. Every adapter
//! is run through the contract tests in `tests/store_contract.rs`.

mod memory;
mod surreal;

use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::DbError;

pub use memory::MemoryStore;
pub use surreal::SurrealStore;

/// A stored document, without any storage-assigned id.
pub type Document = Map<String, Value>;

/// Field name reserved for storage-assigned ids. Documents, filters and
/// updates may not use it.
pub const RESERVED_FIELD: &str = "id";

/// Conjunction of field equality conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    /// A filter that matches every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`.
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Check if a document satisfies every condition.
    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(field, value)| doc.get(field) == Some(value))
    }

    pub(crate) fn validate(&self) -> Result<(), DbError> {
        self.conditions
            .iter()
            .try_for_each(|(field, _)| validate_field(field))
    }
}

/// Field assignments applied by an update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    assignments: Vec<(String, Value)>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `value` to `field`.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignments.push((field.into(), value.into()));
        self
    }

    pub fn assignments(&self) -> &[(String, Value)] {
        &self.assignments
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Apply the assignments to a document in place.
    pub fn apply(&self, doc: &mut Document) {
        for (field, value) in &self.assignments {
            doc.insert(field.clone(), value.clone());
        }
    }

    pub(crate) fn validate(&self) -> Result<(), DbError> {
        if self.assignments.is_empty() {
            return Err(DbError::Query("update has no assignments".into()));
        }
        self.assignments
            .iter()
            .try_for_each(|(field, _)| validate_field(field))
    }
}

/// Which image of the matched document an atomic update returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReturnImage {
    /// The document as it was before the update.
    #[default]
    Before,
    /// The document after the update was applied.
    After,
}

/// Minimum capability set the coordinator needs from a document store.
///
/// Updates and deletes that match nothing succeed and report zero.
pub trait DocumentStore: Clone + Send + Sync + 'static {
    /// Find any one document matching the filter.
    fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> impl Future<Output = Result<Option<Document>, DbError>> + Send;

    /// Append a document.
    fn insert(
        &self,
        collection: &str,
        doc: Document,
    ) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Apply an update to every matching document, returning how many matched.
    fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> impl Future<Output = Result<u64, DbError>> + Send;

    /// Atomically pick one matching document, update it and return the
    /// requested image. `None` when nothing matches.
    fn find_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        image: ReturnImage,
    ) -> impl Future<Output = Result<Option<Document>, DbError>> + Send;

    /// Delete every matching document, returning how many were removed.
    fn delete(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> impl Future<Output = Result<u64, DbError>> + Send;

    /// Count matching documents.
    fn count(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> impl Future<Output = Result<u64, DbError>> + Send;

    /// Request a secondary index on `field`. A background index must not
    /// block writers while it builds.
    fn create_index(
        &self,
        collection: &str,
        field: &str,
        background: bool,
    ) -> impl Future<Output = Result<(), DbError>> + Send;
}

/// Check that a collection or field name is a plain identifier.
///
/// Names are interpolated into queries, so only ASCII letters, digits and
/// underscores are accepted, starting with a letter or underscore.
pub fn validate_name(name: &str) -> Result<(), DbError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(DbError::InvalidField(name.to_string()))
    }
}

/// Check that a field name is a plain identifier and not reserved.
pub fn validate_field(name: &str) -> Result<(), DbError> {
    validate_name(name)?;
    if name == RESERVED_FIELD {
        return Err(DbError::InvalidField(format!(
            "{name} is reserved for storage ids"
        )));
    }
    Ok(())
}

/// Check a document does not carry the reserved id field.
///
/// Other field names are stored as given; only filters and updates are
/// restricted to plain identifiers.
pub fn validate_document(doc: &Document) -> Result<(), DbError> {
    if doc.contains_key(RESERVED_FIELD) {
        return Err(DbError::InvalidField(format!(
            "{RESERVED_FIELD} is reserved for storage ids"
        )));
    }
    Ok(())
}

/// Serialize a value into a document.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, DbError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(DbError::Serialization(format!(
            "expected an object, got {other}"
        ))),
    }
}

/// Deserialize a document into a typed value.
pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, DbError> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}
