//! Mock document store for testing.

use super::traits::DocumentStore;
use super::types::{
    DeleteResult, Document, Filter, InsertResult, StoreError, Update, UpdateOptions, UpdateResult,
    WriteConcern, WriteErrorCategory, validate_name,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

#[derive(Default)]
struct MockState {
    collections: BTreeMap<String, Vec<Document>>,
    unique_fields: BTreeMap<String, BTreeSet<String>>,
    write_concerns: BTreeMap<String, Vec<WriteConcern>>,
}

impl MockState {
    /// Returns the unique field `document` would collide on, ignoring the document at `skip`.
    fn unique_conflict(
        &self,
        collection: &str,
        document: &Document,
        skip: Option<usize>,
    ) -> Option<String> {
        let fields = self.unique_fields.get(collection)?;
        let existing = self.collections.get(collection)?;

        fields
            .iter()
            .find(|field| {
                let Some(value) = document.get(field.as_str()) else {
                    return false;
                };
                existing
                    .iter()
                    .enumerate()
                    .any(|(i, other)| Some(i) != skip && other.get(field.as_str()) == Some(value))
            })
            .cloned()
    }
}

/// In-memory mock implementation of `DocumentStore` for testing.
///
/// Clones share the same documents. The failure switches (`disconnected`,
/// `failing_writes`, `unacknowledged`) belong to each handle, so a test can
/// seed data through a healthy handle and then exercise a failing clone.
///
/// ```rust,ignore
/// use account_store::store::{DocumentStore, Filter, MockDocumentStore, WriteConcern};
///
/// let store = MockDocumentStore::new();
/// store.insert_one("users", document, WriteConcern::Majority).await?;
///
/// let failing = store.clone().disconnected();
/// assert!(failing.find_one("users", &Filter::default()).await.is_err());
/// ```
#[derive(Clone)]
pub struct MockDocumentStore {
    state: Arc<RwLock<MockState>>,
    connected: bool,
    write_failure: Option<WriteErrorCategory>,
    acknowledge_writes: bool,
}

impl Default for MockDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDocumentStore {
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            connected: true,
            write_failure: None,
            acknowledge_writes: true,
        }
    }

    /// Every call fails with [`StoreError::Unavailable`].
    pub fn disconnected(mut self) -> Self {
        self.connected = false;
        self
    }

    /// Every mutating call fails with a write error of `category`.
    pub fn failing_writes(mut self, category: WriteErrorCategory) -> Self {
        self.write_failure = Some(category);
        self
    }

    /// Writes are applied but reported as unacknowledged.
    pub fn unacknowledged(mut self) -> Self {
        self.acknowledge_writes = false;
        self
    }

    /// Number of documents in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.state
            .read()
            .expect("lock poisoned")
            .collections
            .get(collection)
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Write concerns used by the inserts into `collection`, oldest first.
    pub fn write_concerns(&self, collection: &str) -> Vec<WriteConcern> {
        self.state
            .read()
            .expect("lock poisoned")
            .write_concerns
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Removes all documents and indexes.
    pub fn clear(&self) {
        let mut state = self.state.write().expect("lock poisoned");
        state.collections.clear();
        state.unique_fields.clear();
        state.write_concerns.clear();
    }

    fn check_connected(&self) -> Result<(), StoreError> {
        if self.connected {
            Ok(())
        } else {
            Err(StoreError::Unavailable("mock store is disconnected".to_owned()))
        }
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        self.check_connected()?;
        match self.write_failure {
            Some(category) => Err(StoreError::write(category, "injected write failure")),
            None => Ok(()),
        }
    }

    fn duplicate_key(collection: &str, field: &str) -> StoreError {
        StoreError::write(
            WriteErrorCategory::DuplicateKey,
            format!("duplicate value for unique index {collection}.{field}"),
        )
    }
}

impl DocumentStore for MockDocumentStore {
    async fn is_connected(&self) -> bool {
        self.connected
    }

    async fn create_index(
        &self,
        collection: &str,
        field: &str,
        unique: bool,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        validate_name(collection)?;
        validate_name(field)?;

        let mut state = self.state.write().expect("lock poisoned");
        let documents = state.collections.entry(collection.to_owned()).or_default();

        if unique {
            let mut seen = BTreeSet::new();
            for value in documents.iter().filter_map(|doc| doc.get(field)) {
                if !seen.insert(value.to_string()) {
                    return Err(Self::duplicate_key(collection, field));
                }
            }
            state
                .unique_fields
                .entry(collection.to_owned())
                .or_default()
                .insert(field.to_owned());
        }

        Ok(())
    }

    async fn insert_one(
        &self,
        collection: &str,
        document: Document,
        concern: WriteConcern,
    ) -> Result<InsertResult, StoreError> {
        self.check_writable()?;

        let mut state = self.state.write().expect("lock poisoned");
        if let Some(field) = state.unique_conflict(collection, &document, None) {
            return Err(Self::duplicate_key(collection, &field));
        }

        state
            .collections
            .entry(collection.to_owned())
            .or_default()
            .push(document);
        state
            .write_concerns
            .entry(collection.to_owned())
            .or_default()
            .push(concern);

        Ok(InsertResult {
            acknowledged: self.acknowledge_writes,
        })
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        self.check_connected()?;

        let state = self.state.read().expect("lock poisoned");
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| filter.matches(doc)))
            .cloned())
    }

    async fn count_documents(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.check_connected()?;

        let state = self.state.read().expect("lock poisoned");
        let count = state
            .collections
            .get(collection)
            .map_or(0, |docs| docs.iter().filter(|doc| filter.matches(doc)).count());
        Ok(count as u64)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        options: UpdateOptions,
    ) -> Result<UpdateResult, StoreError> {
        self.check_writable()?;

        let mut state = self.state.write().expect("lock poisoned");
        let position = state
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().position(|doc| filter.matches(doc)));

        let mut result = UpdateResult {
            acknowledged: self.acknowledge_writes,
            matched_count: 0,
            modified_count: 0,
            upserted: false,
        };

        match position {
            Some(index) => {
                result.matched_count = 1;
                let Some(docs) = state.collections.get(collection) else {
                    return Ok(result);
                };
                let mut updated = docs[index].clone();
                if !update.changes(&updated) {
                    return Ok(result);
                }
                update.apply(&mut updated);
                if let Some(field) = state.unique_conflict(collection, &updated, Some(index)) {
                    return Err(Self::duplicate_key(collection, &field));
                }
                if let Some(docs) = state.collections.get_mut(collection) {
                    docs[index] = updated;
                }
                result.modified_count = 1;
            }
            None if options.upsert => {
                let mut document = filter.as_document().clone();
                update.apply(&mut document);
                if let Some(field) = state.unique_conflict(collection, &document, None) {
                    return Err(Self::duplicate_key(collection, &field));
                }
                state
                    .collections
                    .entry(collection.to_owned())
                    .or_default()
                    .push(document);
                result.upserted = true;
            }
            None => {}
        }

        Ok(result)
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<DeleteResult, StoreError> {
        self.check_writable()?;

        let mut state = self.state.write().expect("lock poisoned");
        let deleted_count = match state.collections.get_mut(collection) {
            Some(docs) => match docs.iter().position(|doc| filter.matches(doc)) {
                Some(index) => {
                    docs.remove(index);
                    1
                }
                None => 0,
            },
            None => 0,
        };

        Ok(DeleteResult {
            acknowledged: self.acknowledge_writes,
            deleted_count,
        })
    }

    async fn delete_many(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<DeleteResult, StoreError> {
        self.check_writable()?;

        let mut state = self.state.write().expect("lock poisoned");
        let deleted_count = state.collections.get_mut(collection).map_or(0, |docs| {
            let before = docs.len();
            docs.retain(|doc| !filter.matches(doc));
            (before - docs.len()) as u64
        });

        Ok(DeleteResult {
            acknowledged: self.acknowledge_writes,
            deleted_count,
        })
    }
}
