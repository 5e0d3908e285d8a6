//! Document storage with pluggable backends.
//!
//! Supports:
//! - `memory`: In-memory storage (non-persistent, for testing)
//! - `sqlite`: SQLite database holding one JSON document per row
//!
//! Documents are schema-less JSON objects keyed by an [`ObjectId`] in the
//! `_id` field. Every operation is atomic for the documents it touches; there
//! are no transactions spanning several calls.

mod memory;
mod object_id;
mod sqlite;

pub use memory::InMemoryDocumentStore;
pub use object_id::{InvalidObjectId, ObjectId, OBJECT_ID_HEX_LEN};
pub use sqlite::SqliteDocumentStore;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// A stored JSON object.
pub type Document = Map<String, Value>;

/// Field holding the document identifier.
pub const ID_FIELD: &str = "_id";

/// Named document collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Lists,
    Tasks,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Lists, Collection::Tasks];

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Lists => "lists",
            Collection::Tasks => "tasks",
        }
    }

    /// Fields whose values must be distinct across the collection.
    pub fn unique_fields(self) -> &'static [&'static str] {
        match self {
            Collection::Lists => &["name"],
            Collection::Tasks => &[],
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate key in {collection}: {field} = {value}")]
    DuplicateKey {
        collection: Collection,
        field: String,
        value: Value,
    },

    #[error("store backend failure: {0}")]
    Backend(String),

    #[error("corrupt document: {0}")]
    Corrupt(String),
}

/// Document selection.
#[derive(Debug, Clone)]
pub enum Filter {
    All,
    Id(ObjectId),
    IdIn(Vec<ObjectId>),
    /// Field equals value; a missing field compares as `null`.
    Eq(String, Value),
    /// String field matches the pattern anywhere.
    Regex(String, Regex),
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Id(id) => document_id(document) == Some(*id),
            Filter::IdIn(ids) => document_id(document).is_some_and(|id| ids.contains(&id)),
            Filter::Eq(field, value) => document.get(field).unwrap_or(&Value::Null) == value,
            Filter::Regex(field, pattern) => document
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|s| pattern.is_match(s)),
            Filter::And(filters) => filters.iter().all(|f| f.matches(document)),
        }
    }
}

/// Read the identifier of a stored document.
pub fn document_id(document: &Document) -> Option<ObjectId> {
    document.get(ID_FIELD)?.as_str()?.parse().ok()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub skip: usize,
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn page(skip: usize, limit: usize) -> Self {
        Self {
            skip,
            limit: Some(limit),
        }
    }
}

/// Changes applied by [`DocumentStore::update_one`].
#[derive(Debug, Clone, Default)]
pub struct Update {
    set: Document,
    push: Vec<(String, Value)>,
}

impl Update {
    /// Replace the value of `field`.
    pub fn set(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::default().and_set(field, value)
    }

    /// Append `value` to the array in `field`, creating it when missing.
    pub fn push(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::default().and_push(field, value)
    }

    pub fn and_set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    pub fn and_push(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push.push((field.into(), value.into()));
        self
    }

    /// Apply to a document. The identifier field is never changed.
    pub fn apply(&self, document: &mut Document) -> Result<(), StoreError> {
        for (field, value) in &self.set {
            if field != ID_FIELD {
                document.insert(field.clone(), value.clone());
            }
        }
        for (field, value) in &self.push {
            let slot = document
                .entry(field.clone())
                .or_insert_with(|| Value::Array(Vec::new()));
            match slot {
                Value::Array(items) => items.push(value.clone()),
                other => {
                    return Err(StoreError::Corrupt(format!(
                        "cannot push onto non-array field {} ({})",
                        field, other
                    )))
                }
            }
        }
        Ok(())
    }
}

/// Reject `candidate` when it collides with another document on the
/// identifier or on one of the collection's unique fields.
pub(crate) fn check_unique<'a>(
    collection: Collection,
    candidate: &Document,
    existing: impl IntoIterator<Item = &'a Document>,
) -> Result<(), StoreError> {
    let candidate_id = candidate.get(ID_FIELD);
    for other in existing {
        if other.get(ID_FIELD) == candidate_id {
            continue;
        }
        for field in collection.unique_fields() {
            match (candidate.get(*field), other.get(*field)) {
                (Some(value), Some(taken)) if !value.is_null() && value == taken => {
                    return Err(StoreError::DuplicateKey {
                        collection,
                        field: (*field).to_string(),
                        value: value.clone(),
                    });
                }
                _ => {}
            }
        }
    }
    Ok(())
}

/// Make sure `document` carries an identifier and return it.
pub(crate) fn assign_id(document: &mut Document) -> ObjectId {
    if let Some(id) = document_id(document) {
        return id;
    }
    let id = ObjectId::new();
    document.insert(ID_FIELD.to_string(), Value::String(id.to_hex()));
    id
}

/// Document store trait - implemented by all storage backends.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Whether this store persists data across restarts.
    fn is_persistent(&self) -> bool;

    /// Documents matching `filter`, in insertion order.
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        options: FindOptions,
    ) -> Result<Vec<Document>, StoreError>;

    /// First document matching `filter`.
    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        let mut found = self
            .find(collection, filter, FindOptions::page(0, 1))
            .await?;
        Ok(found.pop())
    }

    /// Store a new document, assigning `_id` when absent.
    async fn insert(
        &self,
        collection: Collection,
        document: Document,
    ) -> Result<Document, StoreError>;

    /// Update the first matching document and return its new state.
    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> Result<Option<Document>, StoreError>;

    /// Remove every matching document, returning how many were removed.
    async fn delete_many(&self, collection: Collection, filter: &Filter)
        -> Result<u64, StoreError>;
}

pub type SharedDocumentStore = Arc<dyn DocumentStore>;

/// Document store type selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreType {
    Memory,
    Sqlite(PathBuf),
}

impl StoreType {
    /// Parse a connection string: `memory://` or `sqlite://<path>`.
    pub fn from_url(url: &str) -> Option<Self> {
        let url = url.trim();
        if url == "memory://" || url == "memory" {
            return Some(Self::Memory);
        }
        let path = url.strip_prefix("sqlite://")?;
        if path.is_empty() {
            return None;
        }
        Some(Self::Sqlite(PathBuf::from(path)))
    }
}

/// Create a document store based on type.
pub async fn create_document_store(
    store_type: &StoreType,
) -> Result<SharedDocumentStore, StoreError> {
    match store_type {
        StoreType::Memory => Ok(Arc::new(InMemoryDocumentStore::new())),
        StoreType::Sqlite(path) => {
            let store = SqliteDocumentStore::open(path.clone()).await?;
            Ok(Arc::new(store))
        }
    }
}
