use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{DeleteResult, InsertResult, UpdateResult};

/// A stored JSON document. Every document carries a string `_id`.
pub type Document = Map<String, Value>;

pub const ID_FIELD: &str = "_id";

/// Collection
///
/// The flat set of collections the service reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Rooms,
    Coupons,
    Users,
    Agreements,
    Announcements,
    Payments,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::Rooms => "rooms",
            Collection::Coupons => "coupons",
            Collection::Users => "users",
            Collection::Agreements => "agreements",
            Collection::Announcements => "announcements",
            Collection::Payments => "payments",
        }
    }

    /// The field that must be unique across the collection, if any.
    /// Users are keyed by email.
    pub fn unique_key(self) -> Option<&'static str> {
        match self {
            Collection::Users => Some("email"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals the value exactly.
    Eq(Value),
    /// Field is a string containing the text, ignoring case.
    ContainsIgnoreCase(String),
}

/// Filter
///
/// A conjunction of per-field conditions. The empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Condition)>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: &str) -> Self {
        Self::all().eq(ID_FIELD, id)
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push((field.to_string(), Condition::Eq(value.into())));
        self
    }

    pub fn contains_ignore_case(mut self, field: &str, text: &str) -> Self {
        self.conditions.push((
            field.to_string(),
            Condition::ContainsIgnoreCase(text.to_string()),
        ));
        self
    }

    pub fn conditions(&self) -> &[(String, Condition)] {
        &self.conditions
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions.iter().all(|(field, condition)| {
            let Some(actual) = doc.get(field) else {
                return false;
            };
            match condition {
                Condition::Eq(expected) => actual == expected,
                Condition::ContainsIgnoreCase(text) => actual
                    .as_str()
                    .is_some_and(|s| s.to_lowercase().contains(&text.to_lowercase())),
            }
        })
    }
}

/// FindOptions
///
/// Offset/limit window for `find`. A `limit` of zero means "no limit".
/// Negative values are rejected by the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub skip: i64,
    pub limit: i64,
}

impl FindOptions {
    pub fn page(page: i64, size: i64) -> Self {
        Self {
            skip: page.saturating_mul(size),
            limit: size,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid find options: {0}")]
    InvalidOptions(String),

    #[error("malformed document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A document with the same unique key already exists in the collection.
    #[error("duplicate {field} in {collection}")]
    Duplicate {
        collection: &'static str,
        field: &'static str,
    },
}

impl StoreError {
    /// Maps a Postgres unique-index violation onto `Duplicate`, passing every other error through.
    fn from_insert(error: sqlx::Error, collection: Collection) -> Self {
        let violated = matches!(&error, sqlx::Error::Database(db) if db.is_unique_violation());
        match collection.unique_key() {
            Some(field) if violated => StoreError::Duplicate {
                collection: collection.name(),
                field,
            },
            _ => StoreError::Database(error),
        }
    }
}

/// DocumentStore
///
/// The persistence contract every handler and the statistics aggregator depend on.
/// Each operation touches a single collection; writes are single-document with no
/// cross-document atomicity.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns the matching documents in insertion order, windowed by `options`.
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        options: FindOptions,
    ) -> Result<Vec<Document>, StoreError>;

    /// Returns the first matching document, or `None`.
    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError>;

    /// Stores the document under a freshly generated `_id`. Any client-supplied `_id` is replaced.
    async fn insert_one(
        &self,
        collection: Collection,
        doc: Document,
    ) -> Result<InsertResult, StoreError>;

    /// Merges `set` into the first matching document (`$set` semantics).
    /// `_id` in `set` is ignored. `modified_count` is 0 when every value was already in place.
    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        set: Document,
    ) -> Result<UpdateResult, StoreError>;

    /// Removes the first matching document. A miss reports `deleted_count == 0`.
    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<DeleteResult, StoreError>;

    /// Exact number of documents matching `filter`.
    async fn count_documents(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<u64, StoreError>;

    /// Size of the whole collection, without a filter.
    async fn estimated_document_count(&self, collection: Collection) -> Result<u64, StoreError>;
}

/// StoreState
///
/// The single long-lived store handle shared by every request.
pub type StoreState = Arc<dyn DocumentStore>;

/// Rejects negative windows before they reach a backend.
fn check_options(options: FindOptions) -> Result<(), StoreError> {
    if options.skip < 0 || options.limit < 0 {
        return Err(StoreError::InvalidOptions(format!(
            "skip={} limit={}",
            options.skip, options.limit
        )));
    }
    Ok(())
}

/// Stamps a fresh UUID v4 `_id` onto the document, replacing any client-supplied one.
fn with_new_id(mut doc: Document) -> (String, Document) {
    let id = Uuid::new_v4().to_string();
    doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
    (id, doc)
}

// --- Postgres ---

// One table holds every collection. `seq` preserves insertion order, `body` is the
// whole document including `_id`, and `id` duplicates `_id` for the unique constraint.

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    seq BIGSERIAL PRIMARY KEY,
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    body JSONB NOT NULL,
    UNIQUE (collection, id)
);
CREATE INDEX IF NOT EXISTS documents_collection_idx ON documents (collection);
CREATE UNIQUE INDEX IF NOT EXISTS documents_users_email_idx
    ON documents ((body ->> 'email')) WHERE collection = 'users';
"#;

/// PostgresDocumentStore
///
/// Keeps every collection in one JSONB table, keyed by collection name and `_id`.
/// Insertion order (`seq`) is the natural order for `find`.
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the documents table if it is missing. Safe to call at every startup.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

/// Escapes LIKE metacharacters so a search term only ever matches literally.
fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Appends `AND ...` clauses for every filter condition.
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    for (field, condition) in filter.conditions() {
        match condition {
            Condition::Eq(value) => {
                builder.push(" AND body -> ");
                builder.push_bind(field.clone());
                builder.push(" = ");
                builder.push_bind(Json(value.clone()));
            }
            Condition::ContainsIgnoreCase(text) => {
                builder.push(" AND body ->> ");
                builder.push_bind(field.clone());
                builder.push(" ILIKE ");
                builder.push_bind(format!("%{}%", escape_like(text)));
            }
        }
    }
}

/// `SELECT <columns> FROM documents WHERE collection = $1`, ready for `push_filter`.
fn select_from(collection: Collection, columns: &str) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT {columns} FROM documents WHERE collection = "));
    builder.push_bind(collection.name());
    builder
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        options: FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        check_options(options)?;

        let mut builder = select_from(collection, "body");
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY seq OFFSET ");
        builder.push_bind(options.skip);
        builder.push(" LIMIT ");
        // LIMIT NULL returns every row.
        builder.push_bind((options.limit != 0).then_some(options.limit));

        let rows = builder
            .build_query_scalar::<Json<Document>>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|Json(doc)| doc).collect())
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        let mut builder = select_from(collection, "body");
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY seq LIMIT 1");

        let row = builder
            .build_query_scalar::<Json<Document>>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|Json(doc)| doc))
    }

    async fn insert_one(
        &self,
        collection: Collection,
        doc: Document,
    ) -> Result<InsertResult, StoreError> {
        let (id, doc) = with_new_id(doc);
        sqlx::query("INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)")
            .bind(collection.name())
            .bind(&id)
            .bind(Json(doc))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::from_insert(e, collection))?;
        Ok(InsertResult::new(id))
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        mut set: Document,
    ) -> Result<UpdateResult, StoreError> {
        set.remove(ID_FIELD);

        // `target` pins the first match and keeps its pre-update body, so RETURNING can
        // report whether the `||` merge changed anything. No row back means no match.
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("WITH target AS (SELECT seq, body FROM documents WHERE collection = ");
        builder.push_bind(collection.name());
        push_filter(&mut builder, filter);
        builder.push(
            " ORDER BY seq LIMIT 1) \
             UPDATE documents d SET body = d.body || ",
        );
        builder.push_bind(Json(set));
        builder.push(" FROM target WHERE d.seq = target.seq RETURNING (target.body <> d.body)");

        let modified = builder
            .build_query_scalar::<bool>()
            .fetch_optional(&self.pool)
            .await?;

        Ok(match modified {
            Some(changed) => UpdateResult::new(1, u64::from(changed)),
            None => UpdateResult::new(0, 0),
        })
    }

    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<DeleteResult, StoreError> {
        // Single-document delete: the subquery picks the first match by `seq`.
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "DELETE FROM documents WHERE seq = (SELECT seq FROM documents WHERE collection = ",
        );
        builder.push_bind(collection.name());
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY seq LIMIT 1)");

        let result = builder.build().execute(&self.pool).await?;
        Ok(DeleteResult::new(result.rows_affected()))
    }

    async fn count_documents(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<u64, StoreError> {
        let mut builder = select_from(collection, "COUNT(*)");
        push_filter(&mut builder, filter);

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn estimated_document_count(&self, collection: Collection) -> Result<u64, StoreError> {
        self.count_documents(collection, &Filter::all()).await
    }
}

// --- In-memory ---

/// MemoryDocumentStore
///
/// Process-local store used when no database is configured and throughout the tests.
/// `failing()` builds a store whose every operation errors, for exercising 5xx paths.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
    should_fail: bool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.should_fail {
            return Err(StoreError::Unavailable(
                "simulated storage outage".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        options: FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        self.check_available()?;
        check_options(options)?;

        let collections = self.collections.read().await;
        let matching = collections
            .get(&collection)
            .into_iter()
            .flatten()
            .filter(|doc| filter.matches(doc))
            .skip(options.skip as usize);

        let docs = if options.limit == 0 {
            matching.cloned().collect()
        } else {
            matching.take(options.limit as usize).cloned().collect()
        };
        Ok(docs)
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        self.check_available()?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|doc| filter.matches(doc)))
            .cloned())
    }

    async fn insert_one(
        &self,
        collection: Collection,
        doc: Document,
    ) -> Result<InsertResult, StoreError> {
        self.check_available()?;
        let (id, doc) = with_new_id(doc);

        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();
        if let Some(field) = collection.unique_key() {
            // Mirrors the partial unique index on the Postgres side: absent keys never clash.
            if let Some(key) = doc.get(field) {
                if docs.iter().any(|existing| existing.get(field) == Some(key)) {
                    return Err(StoreError::Duplicate {
                        collection: collection.name(),
                        field,
                    });
                }
            }
        }
        docs.push(doc);
        Ok(InsertResult::new(id))
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        mut set: Document,
    ) -> Result<UpdateResult, StoreError> {
        self.check_available()?;
        set.remove(ID_FIELD);

        let mut collections = self.collections.write().await;
        let Some(doc) = collections
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|doc| filter.matches(doc)))
        else {
            return Ok(UpdateResult::new(0, 0));
        };

        let mut changed = false;
        for (key, value) in set {
            if doc.get(&key) != Some(&value) {
                doc.insert(key, value);
                changed = true;
            }
        }
        Ok(UpdateResult::new(1, u64::from(changed)))
    }

    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<DeleteResult, StoreError> {
        self.check_available()?;
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(DeleteResult::new(0));
        };
        match docs.iter().position(|doc| filter.matches(doc)) {
            Some(index) => {
                docs.remove(index);
                Ok(DeleteResult::new(1))
            }
            None => Ok(DeleteResult::new(0)),
        }
    }

    async fn count_documents(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<u64, StoreError> {
        self.check_available()?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|docs| docs.iter().filter(|doc| filter.matches(doc)).count() as u64)
            .unwrap_or(0))
    }

    async fn estimated_document_count(&self, collection: Collection) -> Result<u64, StoreError> {
        self.check_available()?;
        let collections = self.collections.read().await;
        Ok(collections.get(&collection).map_or(0, |docs| docs.len() as u64))
    }
}
