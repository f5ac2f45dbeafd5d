//! Document store trait definitions.

use super::types::{
    DeleteResult, Document, Filter, InsertResult, StoreError, Update, UpdateOptions, UpdateResult,
    WriteConcern,
};
use std::future::Future;

/// Generic interface over a document-oriented store.
///
/// Every single-document operation is atomic; nothing here spans documents.
/// See [module documentation](super) for the available implementations.
pub trait DocumentStore: Clone + Send + Sync + 'static {
    fn is_connected(&self) -> impl Future<Output = bool> + Send;

    /// Creates an index on `field`, creating the collection first if needed.
    ///
    /// Calling this again with the same arguments is a no-op.
    fn create_index(
        &self,
        collection: &str,
        field: &str,
        unique: bool,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn insert_one(
        &self,
        collection: &str,
        document: Document,
        concern: WriteConcern,
    ) -> impl Future<Output = Result<InsertResult, StoreError>> + Send;

    /// Returns the first document, in insertion order, matching `filter`.
    fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> impl Future<Output = Result<Option<Document>, StoreError>> + Send;

    fn count_documents(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Applies `update` to the first document matching `filter`.
    ///
    /// A document whose field already holds the new value counts as matched
    /// but not modified.
    fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        options: UpdateOptions,
    ) -> impl Future<Output = Result<UpdateResult, StoreError>> + Send;

    fn delete_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> impl Future<Output = Result<DeleteResult, StoreError>> + Send;

    fn delete_many(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> impl Future<Output = Result<DeleteResult, StoreError>> + Send;
}
