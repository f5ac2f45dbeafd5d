//! Document store abstraction.
//!
//! The account store talks to its backing database only through the
//! [`DocumentStore`] trait: named collections of JSON documents, equality
//! filters, single-field updates and per-document atomic writes. Two
//! implementations are provided:
//!
//! - [`PgDocumentStore`]: JSONB collections in PostgreSQL (production)
//! - [`MockDocumentStore`]: in-memory, with failure injection (tests)

mod mock;
mod postgres;
mod traits;
mod types;

pub use mock::MockDocumentStore;
pub use postgres::PgDocumentStore;
pub use traits::DocumentStore;
pub use types::{
    DeleteResult, Document, Filter, InsertResult, StoreError, Update, UpdateOptions, UpdateResult,
    WriteConcern, WriteErrorCategory, validate_name,
};

#[cfg(test)]
mod tests {
    use super::*;

    async fn check_store_connection<T: DocumentStore>(store: T) -> bool {
        store.is_connected().await
    }

    #[tokio::test]
    async fn test_generic_store_interface() {
        assert!(check_store_connection(MockDocumentStore::new()).await);
        assert!(!check_store_connection(MockDocumentStore::new().disconnected()).await);
    }

    async fn generic_count<S: DocumentStore>(store: &S, collection: &str) -> Result<u64, StoreError> {
        store.count_documents(collection, &Filter::default()).await
    }

    #[tokio::test]
    async fn test_generic_document_store_trait() {
        let store = MockDocumentStore::new();
        let mut document = Document::new();
        document.insert("email".to_owned(), "a@x.com".into());
        store
            .insert_one("users", document, WriteConcern::default())
            .await
            .unwrap();

        assert_eq!(generic_count(&store, "users").await.unwrap(), 1);
    }
}
