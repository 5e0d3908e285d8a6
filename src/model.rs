//! List and task documents.
//!
//! A stored list only holds task identifiers ([`ListRecord`]); what the API
//! hands out is a [`List`] with those references resolved to full tasks.

use crate::store::{Document, ObjectId, StoreError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named unit of work with a completion flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub complete: bool,
}

/// Fields accepted when adding a task to a list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTask {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub complete: bool,
}

impl NewTask {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            complete: false,
        }
    }
}

/// A list as persisted: tasks are weak references by identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRecord {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tasks: Vec<ObjectId>,
}

/// A list with its tasks populated, in reference order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct List {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl List {
    pub fn from_record(record: ListRecord, tasks: Vec<Task>) -> Self {
        Self {
            id: record.id,
            name: record.name,
            description: record.description,
            tasks,
        }
    }
}

/// Decode a stored document into a typed value.
pub fn from_document<T: DeserializeOwned>(document: Document) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(document)).map_err(|e| StoreError::Corrupt(e.to_string()))
}

/// Encode a typed value as a document.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(document)) => Ok(document),
        Ok(other) => Err(StoreError::Corrupt(format!("not an object: {}", other))),
        Err(e) => Err(StoreError::Corrupt(e.to_string())),
    }
}
