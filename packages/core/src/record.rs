//! Result records for units that finished primary processing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A processed unit persisted to the result collection.
///
/// Its existence for a key means the key must never be enqueued again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Same business key as the originating queue entry.
    pub key: String,
    /// True once the secondary post-processing step has completed.
    #[serde(default)]
    pub uploaded: bool,
    /// Domain fields produced by processing.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ResultRecord {
    pub const KEY: &'static str = "key";
    pub const UPLOADED: &'static str = "uploaded";

    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            uploaded: false,
            fields: Map::new(),
        }
    }

    /// Attach a domain field to the record.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}
