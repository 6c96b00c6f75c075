//! SurrealDB document store adapter.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use super::{
    Document, DocumentStore, Filter, RESERVED_FIELD, ReturnImage, Update, validate_document,
    validate_field, validate_name,
};
use crate::{Database, DbConfig, DbError, connect};

/// Document store backed by a SurrealDB connection.
///
/// Collections map to tables. SurrealDB reserves the `id` field for its
/// record ids, so documents are read back with `id` stripped and business
/// keys live in ordinary fields.
///
/// Atomic updates are serialized through a claim lock shared by every
/// clone of the store. The embedded engines are single-process, so wrap a
/// connection once and clone the store rather than calling `new` twice on
/// the same connection.
#[derive(Clone)]
pub struct SurrealStore {
    db: Database,
    conflict_retries: u32,
    claim_lock: Arc<Mutex<()>>,
}

/// Bound parameters collected while building a query.
type Bindings = Vec<(String, Value)>;

impl SurrealStore {
    /// Wrap an existing connection.
    pub fn new(db: Database) -> Self {
        Self {
            db,
            conflict_retries: DbConfig::default().conflict_retries,
            claim_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Open a connection from configuration.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        let db = connect(config).await?;
        Ok(Self::new(db).with_conflict_retries(config.conflict_retries))
    }

    /// Set the write-conflict retry bound for atomic updates.
    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }

    /// Get the underlying connection.
    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn run(
        &self,
        sql: String,
        collection: &str,
        bindings: Bindings,
    ) -> Result<Vec<Document>, DbError> {
        let mut query = self.db.query(sql).bind(("tb", collection.to_string()));
        for binding in bindings {
            query = query.bind(binding);
        }

        let mut response = query.await?;
        let rows: surrealdb::Value = response.take(0)?;

        match rows.into_inner().into_json() {
            Value::Array(rows) => rows.into_iter().map(into_document).collect(),
            Value::Null => Ok(Vec::new()),
            row => Ok(vec![into_document(row)?]),
        }
    }

    async fn try_find_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        image: ReturnImage,
    ) -> Result<Option<Document>, DbError> {
        let (where_sql, mut bindings) = where_clause(filter);
        let (set_sql, set_bindings) = set_clause(update);
        bindings.extend(set_bindings);

        // The outer WHERE re-checks the filter against the record it is
        // about to write.
        let sql = format!(
            "UPDATE (SELECT VALUE id FROM type::table($tb) {where_sql} LIMIT 1) \
             SET {set_sql} {where_sql} RETURN {}",
            match image {
                ReturnImage::Before => "BEFORE",
                ReturnImage::After => "AFTER",
            }
        );

        let docs = self.run(sql, collection, bindings).await?;
        Ok(docs.into_iter().next())
    }
}

impl DocumentStore for SurrealStore {
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>, DbError> {
        validate_name(collection)?;
        filter.validate()?;

        let (where_sql, bindings) = where_clause(filter);
        let sql = format!("SELECT * FROM type::table($tb) {where_sql} LIMIT 1");

        let docs = self.run(sql, collection, bindings).await?;
        Ok(docs.into_iter().next())
    }

    async fn insert(&self, collection: &str, doc: Document) -> Result<(), DbError> {
        validate_name(collection)?;
        validate_document(&doc)?;

        self.db
            .query("CREATE type::table($tb) CONTENT $doc RETURN NONE")
            .bind(("tb", collection.to_string()))
            .bind(("doc", Value::Object(doc)))
            .await?
            .check()?;

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

        let (where_sql, mut bindings) = where_clause(filter);
        let (set_sql, set_bindings) = set_clause(update);
        bindings.extend(set_bindings);

        let sql = format!("UPDATE type::table($tb) SET {set_sql} {where_sql} RETURN AFTER");

        let docs = self.run(sql, collection, bindings).await?;
        Ok(docs.len() as u64)
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

        // Held across retries so concurrent claimers see each other's writes.
        let _claim = self.claim_lock.lock().await;

        let mut attempt = 0;
        loop {
            match self
                .try_find_and_update(collection, filter, update, image)
                .await
            {
                Err(DbError::Conflict(reason)) if attempt < self.conflict_retries => {
                    attempt += 1;
                    tracing::debug!(
                        "Atomic update on {} lost a write conflict (attempt {}): {}",
                        collection,
                        attempt,
                        reason
                    );
                    tokio::task::yield_now().await;
                }
                result => return result,
            }
        }
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> Result<u64, DbError> {
        validate_name(collection)?;
        filter.validate()?;

        let (where_sql, bindings) = where_clause(filter);
        let sql = format!("DELETE type::table($tb) {where_sql} RETURN BEFORE");

        let docs = self.run(sql, collection, bindings).await?;
        Ok(docs.len() as u64)
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, DbError> {
        validate_name(collection)?;
        filter.validate()?;

        // `count() .. GROUP ALL` takes an index shortcut that ignores part
        // of a multi-field WHERE, so count the matching ids instead.
        let (where_sql, bindings) = where_clause(filter);
        let sql = format!("RETURN count((SELECT VALUE id FROM type::table($tb) {where_sql}))");

        let mut query = self.db.query(sql).bind(("tb", collection.to_string()));
        for binding in bindings {
            query = query.bind(binding);
        }

        let mut response = query.await?;
        let count: surrealdb::Value = response.take(0)?;

        match count.into_inner().into_json() {
            Value::Number(n) => n.as_u64().ok_or_else(|| {
                DbError::Serialization(format!("expected a non-negative count, got {n}"))
            }),
            Value::Null => Ok(0),
            other => Err(DbError::Serialization(format!(
                "expected a count, got {other}"
            ))),
        }
    }

    async fn create_index(
        &self,
        collection: &str,
        field: &str,
        background: bool,
    ) -> Result<(), DbError> {
        validate_name(collection)?;
        validate_field(field)?;

        let sql = format!(
            "DEFINE TABLE IF NOT EXISTS `{collection}` SCHEMALESS;\n\
             DEFINE INDEX IF NOT EXISTS `{collection}_{field}` ON TABLE `{collection}` FIELDS `{field}`{};",
            if background { " CONCURRENTLY" } else { "" }
        );

        self.db.query(sql).await?.check()?;

        tracing::info!(
            "Requested index {}_{} ({})",
            collection,
            field,
            if background { "background" } else { "blocking" }
        );
        Ok(())
    }
}

/// Build a `WHERE` clause with `$f<n>` parameters. Empty filters match all.
fn where_clause(filter: &Filter) -> (String, Bindings) {
    if filter.is_empty() {
        return (String::new(), Vec::new());
    }

    let mut parts = Vec::new();
    let mut bindings = Vec::new();
    for (i, (field, value)) in filter.conditions().iter().enumerate() {
        parts.push(format!("`{field}` = $f{i}"));
        bindings.push((format!("f{i}"), value.clone()));
    }

    (format!("WHERE {}", parts.join(" AND ")), bindings)
}

/// Build the assignments of a `SET` clause with `$u<n>` parameters.
fn set_clause(update: &Update) -> (String, Bindings) {
    let mut parts = Vec::new();
    let mut bindings = Vec::new();
    for (i, (field, value)) in update.assignments().iter().enumerate() {
        parts.push(format!("`{field}` = $u{i}"));
        bindings.push((format!("u{i}"), value.clone()));
    }

    (parts.join(", "), bindings)
}

fn into_document(row: Value) -> Result<Document, DbError> {
    match row {
        Value::Object(mut map) => {
            map.remove(RESERVED_FIELD);
            Ok(map)
        }
        other => Err(DbError::Serialization(format!(
            "expected a document, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn where_clause_binds_each_condition() {
        let filter = Filter::new().where_eq("busy", false).where_eq("rejected", false);
        let (sql, bindings) = where_clause(&filter);

        assert_eq!(sql, "WHERE `busy` = $f0 AND `rejected` = $f1");
        assert_eq!(
            bindings,
            vec![("f0".to_string(), json!(false)), ("f1".to_string(), json!(false))]
        );

        let (sql, bindings) = where_clause(&Filter::new());
        assert!(sql.is_empty());
        assert!(bindings.is_empty());
    }

    #[test]
    fn set_clause_binds_each_assignment() {
        let (sql, bindings) = set_clause(&Update::new().set("busy", true).set("note", "x"));
        assert_eq!(sql, "`busy` = $u0, `note` = $u1");
        assert_eq!(bindings.len(), 2);
    }

    #[test]
    fn record_ids_are_stripped() -> Result<(), DbError> {
        let doc = into_document(json!({"id": "queue_entry:abc", "key": "a.com"}))?;
        assert!(!doc.contains_key("id"));
        assert_eq!(doc.get("key"), Some(&json!("a.com")));

        assert!(into_document(json!(3)).is_err());
        Ok(())
    }
}
