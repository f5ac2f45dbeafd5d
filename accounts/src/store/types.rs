//! Document store types.

use serde_json::{Map, Value};
use std::fmt::Display;

/// A stored document: a JSON object keyed by field name.
pub type Document = Map<String, Value>;

/// Conjunction of field-equality conditions.
///
/// An empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter(Document);

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::default().and(field, value)
    }

    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Returns `true` when every condition holds for `document`.
    pub fn matches(&self, document: &Document) -> bool {
        self.0
            .iter()
            .all(|(field, expected)| document.get(field) == Some(expected))
    }

    /// The filter expressed as a document of the expected field values.
    pub fn as_document(&self) -> &Document {
        &self.0
    }
}

/// Replaces a single top-level field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub field: String,
    pub value: Value,
}

impl Update {
    pub fn set(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether applying this update to `document` would change it.
    pub fn changes(&self, document: &Document) -> bool {
        document.get(&self.field) != Some(&self.value)
    }

    pub fn apply(&self, document: &mut Document) {
        document.insert(self.field.clone(), self.value.clone());
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Insert a document built from the filter and the update when nothing matches.
    pub upsert: bool,
}

impl UpdateOptions {
    pub fn upsert() -> Self {
        Self { upsert: true }
    }
}

/// Durability required before a write is reported back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteConcern {
    /// Acknowledged by the primary.
    #[default]
    Acknowledged,
    /// Acknowledged by a majority of replicas.
    Majority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertResult {
    pub acknowledged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateResult {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteResult {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

/// Category of a failed write, as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteErrorCategory {
    /// A unique index rejected the write.
    DuplicateKey,
    /// The store gave up on the statement.
    ExecutionTimeout,
    Uncategorized,
}

impl Display for WriteErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateKey => write!(f, "duplicate key"),
            Self::ExecutionTimeout => write!(f, "execution timeout"),
            Self::Uncategorized => write!(f, "uncategorized"),
        }
    }
}

/// Error type for document store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Write failed ({category}): {message}")]
    Write {
        category: WriteErrorCategory,
        message: String,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store refused a query that does not write.
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Malformed document: {0}")]
    Decode(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),
}

impl StoreError {
    pub fn write(category: WriteErrorCategory, message: impl Into<String>) -> Self {
        Self::Write {
            category,
            message: message.into(),
        }
    }

    /// The write category, if this is a write failure.
    pub fn category(&self) -> Option<WriteErrorCategory> {
        match self {
            Self::Write { category, .. } => Some(*category),
            Self::Unavailable(_) | Self::Query(_) | Self::Decode(_) | Self::InvalidName(_) => None,
        }
    }
}

/// Checks that `name` can be used as a database, collection or indexed field name.
pub fn validate_name(name: &str) -> Result<&str, StoreError> {
    let mut chars = name.chars();
    let valid_head = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_head && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(name)
    } else {
        Err(StoreError::InvalidName(name.to_owned()))
    }
}
