//! In-memory document store (non-persistent).

use super::{
    assign_id, check_unique, Collection, Document, DocumentStore, FindOptions, Filter,
    StoreError, Update, ID_FIELD,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<HashMap<Collection, Vec<Document>>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        options: FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        let Some(documents) = collections.get(&collection) else {
            return Ok(Vec::new());
        };
        let matching = documents
            .iter()
            .filter(|d| filter.matches(d))
            .skip(options.skip);
        let found = match options.limit {
            Some(limit) => matching.take(limit).cloned().collect(),
            None => matching.cloned().collect(),
        };
        Ok(found)
    }

    async fn insert(
        &self,
        collection: Collection,
        mut document: Document,
    ) -> Result<Document, StoreError> {
        let id = assign_id(&mut document);
        let mut collections = self.collections.write().await;
        let documents = collections.entry(collection).or_default();
        if documents.iter().any(|d| super::document_id(d) == Some(id)) {
            return Err(StoreError::DuplicateKey {
                collection,
                field: ID_FIELD.to_string(),
                value: Value::String(id.to_hex()),
            });
        }
        check_unique(collection, &document, documents.iter())?;
        documents.push(document.clone());
        tracing::debug!("Inserted {} into {}", id, collection);
        Ok(document)
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> Result<Option<Document>, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(documents) = collections.get_mut(&collection) else {
            return Ok(None);
        };
        let Some(index) = documents.iter().position(|d| filter.matches(d)) else {
            return Ok(None);
        };

        let mut updated = documents[index].clone();
        update.apply(&mut updated)?;
        check_unique(collection, &updated, documents.iter())?;
        documents[index] = updated.clone();
        Ok(Some(updated))
    }

    async fn delete_many(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(documents) = collections.get_mut(&collection) else {
            return Ok(0);
        };
        let before = documents.len();
        documents.retain(|d| !filter.matches(d));
        let removed = (before - documents.len()) as u64;
        tracing::debug!("Deleted {} documents from {}", removed, collection);
        Ok(removed)
    }
}
