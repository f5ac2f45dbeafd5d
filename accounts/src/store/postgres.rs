//! PostgreSQL implementation of `DocumentStore`.
//!
//! Each database maps to a Postgres schema and each collection to a table
//! holding one JSONB document per row:
//!
//! ```sql
//! CREATE TABLE "<database>"."<collection>" (
//!     id  BIGSERIAL PRIMARY KEY,  -- insertion order
//!     doc JSONB NOT NULL
//! );
//! CREATE UNIQUE INDEX "users_email_idx" ON "<database>"."users" ((doc ->> 'email'));
//! ```
//!
//! Filters are evaluated with JSONB containment (`doc @> $1`), which for
//! scalar values is plain field equality. String-valued conditions are also
//! compared through `doc ->> 'field'` so the expression indexes above apply.
//!
//! Collections come into existence on first insert or upsert. Until then a
//! collection reads as empty and deletes from it remove nothing.

use super::traits::DocumentStore;
use super::types::{
    DeleteResult, Document, Filter, InsertResult, StoreError, Update, UpdateOptions, UpdateResult,
    WriteConcern, WriteErrorCategory, validate_name,
};
use serde_json::Value;
use sqlx::PgPool;
use sqlx::types::Json;

/// SQLSTATE raised when a statement is cancelled by `statement_timeout`.
const QUERY_CANCELED: &str = "57014";
/// SQLSTATE raised for a table that does not exist.
const UNDEFINED_TABLE: &str = "42P01";
/// SQLSTATE raised for a schema that does not exist.
const INVALID_SCHEMA_NAME: &str = "3F000";

/// Document store backed by JSONB tables in PostgreSQL.
///
/// # Example
///
/// ```rust,ignore
/// use account_store::database::create_pool;
/// use account_store::store::PgDocumentStore;
///
/// let pool = create_pool(&config).await?;
/// let store = PgDocumentStore::new(pool, config.database_name())?;
/// ```
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    database: String,
}

impl PgDocumentStore {
    /// Binds `pool` to the schema named `database`.
    pub fn new(pool: PgPool, database: impl Into<String>) -> Result<Self, StoreError> {
        let database = database.into();
        validate_name(&database)?;
        Ok(Self { pool, database })
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn table(&self, collection: &str) -> Result<String, StoreError> {
        validate_name(collection)?;
        Ok(format!(r#""{}"."{}""#, self.database, collection))
    }

    /// Creates the schema and the collection table if they are missing.
    pub async fn ensure_collection(&self, collection: &str) -> Result<(), StoreError> {
        let table = self.table(collection)?;

        sqlx::query(&format!(r#"CREATE SCHEMA IF NOT EXISTS "{}""#, self.database))
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (id BIGSERIAL PRIMARY KEY, doc JSONB NOT NULL)"
        ))
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        tracing::debug!(database = %self.database, collection, "Collection ready");
        Ok(())
    }

    async fn insert_document(
        &self,
        table: &str,
        document: &Document,
        concern: WriteConcern,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        if concern == WriteConcern::Majority {
            // Commit waits until synchronous standbys have applied the insert.
            sqlx::query("SET LOCAL synchronous_commit = 'remote_apply'")
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(&format!("INSERT INTO {table} (doc) VALUES ($1)"))
            .bind(Json(document))
            .execute(&mut *tx)
            .await?;
        tx.commit().await
    }

    /// Runs `update` in one transaction; `condition` binds from `$2`.
    async fn update_document(
        &self,
        table: &str,
        (condition, texts): (&str, &[&str]),
        filter: &Filter,
        update: &Update,
        options: UpdateOptions,
    ) -> Result<UpdateResult, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let select = format!(
            "SELECT id, doc -> $1::text FROM {table} WHERE {condition} ORDER BY id LIMIT 1 FOR UPDATE"
        );
        let target: Option<(i64, Option<Json<Value>>)> = texts
            .iter()
            .fold(
                sqlx::query_as(&select)
                    .bind(&update.field)
                    .bind(Json(filter.as_document())),
                |query, text| query.bind(*text),
            )
            .fetch_optional(&mut *tx)
            .await?;

        let mut result = UpdateResult {
            acknowledged: true,
            matched_count: 0,
            modified_count: 0,
            upserted: false,
        };

        match target {
            Some((_, Some(Json(current)))) if current == update.value => {
                result.matched_count = 1;
            }
            Some((id, _)) => {
                sqlx::query(&format!(
                    "UPDATE {table} SET doc = jsonb_set(doc, ARRAY[$2::text], $3, true) WHERE id = $1"
                ))
                .bind(id)
                .bind(&update.field)
                .bind(Json(&update.value))
                .execute(&mut *tx)
                .await?;
                result.matched_count = 1;
                result.modified_count = 1;
            }
            None if options.upsert => {
                let mut document = filter.as_document().clone();
                update.apply(&mut document);
                sqlx::query(&format!("INSERT INTO {table} (doc) VALUES ($1)"))
                    .bind(Json(&document))
                    .execute(&mut *tx)
                    .await?;
                result.upserted = true;
            }
            None => {}
        }

        tx.commit().await?;
        Ok(result)
    }
}

/// Builds the WHERE condition for `filter`, binding the whole filter at
/// `$start` and each string value after it.
///
/// Returns the SQL and the string values in bind order.
fn condition(filter: &Filter, start: usize) -> Result<(String, Vec<&str>), StoreError> {
    let mut sql = format!("doc @> ${start}");
    let mut texts = Vec::new();

    for (field, value) in filter.as_document() {
        if let Value::String(text) = value {
            validate_name(field)?;
            texts.push(text.as_str());
            sql.push_str(&format!(
                " AND (doc ->> '{field}') = ${}",
                start + texts.len()
            ));
        }
    }

    Ok((sql, texts))
}

/// Maps a sqlx error onto the store's error categories.
fn store_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::write(WriteErrorCategory::DuplicateKey, db.message())
        }
        sqlx::Error::Database(db) if db.code().as_deref() == Some(QUERY_CANCELED) => {
            StoreError::write(WriteErrorCategory::ExecutionTimeout, db.message())
        }
        sqlx::Error::Database(db) => {
            StoreError::write(WriteErrorCategory::Uncategorized, db.message())
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Decode(err.to_string())
        }
        _ => StoreError::Unavailable(err.to_string()),
    }
}

/// Maps a sqlx error raised by a query that writes nothing.
fn read_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) => StoreError::Query(db.message().to_owned()),
        _ => store_error(err),
    }
}

/// Whether `err` reports a collection that was never created.
fn is_missing_collection(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => matches!(
            db.code().as_deref(),
            Some(UNDEFINED_TABLE | INVALID_SCHEMA_NAME)
        ),
        _ => false,
    }
}

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn nothing_deleted() -> DeleteResult {
    DeleteResult {
        acknowledged: true,
        deleted_count: 0,
    }
}

impl DocumentStore for PgDocumentStore {
    async fn is_connected(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn create_index(
        &self,
        collection: &str,
        field: &str,
        unique: bool,
    ) -> Result<(), StoreError> {
        validate_name(field)?;
        self.ensure_collection(collection).await?;

        let table = self.table(collection)?;
        let kind = if unique { "UNIQUE INDEX" } else { "INDEX" };
        sqlx::query(&format!(
            r#"CREATE {kind} IF NOT EXISTS "{collection}_{field}_idx" ON {table} ((doc ->> '{field}'))"#
        ))
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        tracing::debug!(collection, field, unique, "Index ready");
        Ok(())
    }

    async fn insert_one(
        &self,
        collection: &str,
        document: Document,
        concern: WriteConcern,
    ) -> Result<InsertResult, StoreError> {
        let table = self.table(collection)?;

        match self.insert_document(&table, &document, concern).await {
            Err(err) if is_missing_collection(&err) => {
                self.ensure_collection(collection).await?;
                self.insert_document(&table, &document, concern)
                    .await
                    .map_err(store_error)?;
            }
            other => other.map_err(store_error)?,
        }

        Ok(InsertResult { acknowledged: true })
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        let table = self.table(collection)?;
        let (condition, texts) = condition(filter, 1)?;

        let select = format!("SELECT doc FROM {table} WHERE {condition} ORDER BY id LIMIT 1");
        let row: Result<Option<Json<Document>>, _> = texts
            .iter()
            .fold(
                sqlx::query_scalar(&select).bind(Json(filter.as_document())),
                |query, text| query.bind(*text),
            )
            .fetch_optional(&self.pool)
            .await;

        match row {
            Ok(row) => Ok(row.map(|Json(doc)| doc)),
            Err(err) if is_missing_collection(&err) => Ok(None),
            Err(err) => Err(read_error(err)),
        }
    }

    async fn count_documents(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let table = self.table(collection)?;
        let (condition, texts) = condition(filter, 1)?;

        let select = format!("SELECT COUNT(*) FROM {table} WHERE {condition}");
        let total: Result<i64, _> = texts
            .iter()
            .fold(
                sqlx::query_scalar(&select).bind(Json(filter.as_document())),
                |query, text| query.bind(*text),
            )
            .fetch_one(&self.pool)
            .await;

        match total {
            Ok(total) => Ok(count(total)),
            Err(err) if is_missing_collection(&err) => Ok(0),
            Err(err) => Err(read_error(err)),
        }
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        options: UpdateOptions,
    ) -> Result<UpdateResult, StoreError> {
        let table = self.table(collection)?;
        let (condition, texts) = condition(filter, 2)?;
        let matching = (condition.as_str(), texts.as_slice());

        match self
            .update_document(&table, matching, filter, update, options)
            .await
        {
            Err(err) if is_missing_collection(&err) && options.upsert => {
                self.ensure_collection(collection).await?;
                self.update_document(&table, matching, filter, update, options)
                    .await
                    .map_err(store_error)
            }
            Err(err) if is_missing_collection(&err) => Ok(UpdateResult {
                acknowledged: true,
                matched_count: 0,
                modified_count: 0,
                upserted: false,
            }),
            other => other.map_err(store_error),
        }
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<DeleteResult, StoreError> {
        let table = self.table(collection)?;
        let (condition, texts) = condition(filter, 1)?;

        let delete = format!(
            "DELETE FROM {table} WHERE id = (SELECT id FROM {table} WHERE {condition} ORDER BY id LIMIT 1)"
        );
        let done = texts
            .iter()
            .fold(
                sqlx::query(&delete).bind(Json(filter.as_document())),
                |query, text| query.bind(*text),
            )
            .execute(&self.pool)
            .await;

        match done {
            Ok(done) => Ok(DeleteResult {
                acknowledged: true,
                deleted_count: done.rows_affected(),
            }),
            Err(err) if is_missing_collection(&err) => Ok(nothing_deleted()),
            Err(err) => Err(store_error(err)),
        }
    }

    async fn delete_many(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<DeleteResult, StoreError> {
        let table = self.table(collection)?;
        let (condition, texts) = condition(filter, 1)?;

        let delete = format!("DELETE FROM {table} WHERE {condition}");
        let done = texts
            .iter()
            .fold(
                sqlx::query(&delete).bind(Json(filter.as_document())),
                |query, text| query.bind(*text),
            )
            .execute(&self.pool)
            .await;

        match done {
            Ok(done) => Ok(DeleteResult {
                acknowledged: true,
                deleted_count: done.rows_affected(),
            }),
            Err(err) if is_missing_collection(&err) => Ok(nothing_deleted()),
            Err(err) => Err(store_error(err)),
        }
    }
}
