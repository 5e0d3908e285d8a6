//! List resource manager.
//!
//! Owns the list-level invariants: list names are unique across the store
//! (backed by the store's unique index) and task names are unique within a
//! list (checked before appending, then guarded by a compare-and-swap on the
//! list's `tasks` array).

use regex::Regex;
use serde_json::Value;

use crate::error::ServiceError;
use crate::model::{from_document, to_document, List, ListRecord, NewTask};
use crate::service::{parse_id, required_name, TaskService};
use crate::store::{
    Collection, Filter, FindOptions, ObjectId, SharedDocumentStore, Update,
};

/// Page size used when a listing request does not give one.
pub const DEFAULT_LIST_LIMIT: usize = 100;

#[derive(Clone)]
pub struct ListService {
    store: SharedDocumentStore,
    tasks: TaskService,
    default_limit: usize,
}

impl ListService {
    pub fn new(store: SharedDocumentStore, tasks: TaskService) -> Self {
        Self {
            store,
            tasks,
            default_limit: DEFAULT_LIST_LIMIT,
        }
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    /// Lists in store order, optionally filtered by a name pattern.
    ///
    /// `search` is a regular expression; a pattern that does not compile is
    /// matched as a literal substring. A `limit` of zero means no limit.
    pub async fn list_all(
        &self,
        skip: Option<usize>,
        limit: Option<usize>,
        search: Option<&str>,
    ) -> Result<Vec<List>, ServiceError> {
        let filter = match search.filter(|s| !s.is_empty()) {
            Some(search) => Filter::Regex("name".to_string(), name_pattern(search)?),
            None => Filter::All,
        };
        let options = FindOptions {
            skip: skip.unwrap_or(0),
            limit: match limit.unwrap_or(self.default_limit) {
                0 => None,
                n => Some(n),
            },
        };

        let documents = self.store.find(Collection::Lists, &filter, options).await?;
        let mut lists = Vec::with_capacity(documents.len());
        for document in documents {
            lists.push(self.populate(from_document(document)?).await?);
        }
        Ok(lists)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<List, ServiceError> {
        let id = parse_id(id)?;
        let record = self.find_record(id).await?;
        self.populate(record).await
    }

    /// Create an empty list. Names must be unique.
    pub async fn create(
        &self,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<List, ServiceError> {
        let name = required_name(name, "List")?;

        if self
            .store
            .find_one(Collection::Lists, &Filter::eq("name", name.as_str()))
            .await?
            .is_some()
        {
            tracing::warn!("Rejected duplicate list name {:?}", name);
            return Err(ServiceError::Conflict(format!(
                "List named {:?} already exists",
                name
            )));
        }

        let record = ListRecord {
            id: ObjectId::new(),
            name,
            description: description.map(str::to_string),
            tasks: Vec::new(),
        };
        // A racing create with the same name is rejected by the unique index.
        let stored = self
            .store
            .insert(Collection::Lists, to_document(&record)?)
            .await?;
        let record: ListRecord = from_document(stored)?;
        tracing::info!("Created list {} ({:?})", record.id, record.name);
        Ok(List::from_record(record, Vec::new()))
    }

    /// Create a task and append it to a list, rejecting duplicate task names.
    ///
    /// The append only lands if the list's task array is still the one the
    /// duplicate check saw. Otherwise the new task is discarded and the check
    /// runs again; every miss means some other append succeeded.
    pub async fn add_task(&self, list_id: &str, task: NewTask) -> Result<List, ServiceError> {
        let name = required_name(task.name.as_deref(), "Task")?;
        let id = parse_id(list_id)?;

        let mut attempt = 0u64;
        loop {
            attempt += 1;
            let record = self.find_record(id).await?;
            let current = self.tasks.find_many(&record.tasks).await?;
            if current.iter().any(|t| t.name == name) {
                tracing::warn!("Rejected duplicate task {:?} in list {}", name, id);
                return Err(ServiceError::Conflict(format!(
                    "List {} already has a task named {:?}",
                    id, name
                )));
            }

            let created = self.tasks.create(&name, task.complete).await?;
            let expected: Vec<Value> = record
                .tasks
                .iter()
                .map(|t| Value::String(t.to_hex()))
                .collect();
            let unchanged = Filter::And(vec![
                Filter::Id(id),
                Filter::eq("tasks", Value::Array(expected)),
            ]);
            let appended = self
                .store
                .update_one(
                    Collection::Lists,
                    &unchanged,
                    &Update::push("tasks", created.id.to_hex()),
                )
                .await?;

            match appended {
                Some(document) => {
                    tracing::info!("Added task {} ({:?}) to list {}", created.id, name, id);
                    return self.populate(from_document(document)?).await;
                }
                None => {
                    tracing::debug!(
                        "List {} changed during append (attempt {}), retrying",
                        id,
                        attempt
                    );
                    self.tasks.delete_many(&[created.id]).await?;
                }
            }
        }
    }

    /// Delete one list and the tasks it references.
    pub async fn delete_by_id(&self, id: &str) -> Result<(), ServiceError> {
        let id = parse_id(id)?;
        let record = self.find_record(id).await?;
        self.store
            .delete_many(Collection::Lists, &Filter::Id(id))
            .await?;
        let removed_tasks = self.tasks.delete_many(&record.tasks).await?;
        tracing::info!("Deleted list {} and {} tasks", id, removed_tasks);
        Ok(())
    }

    /// Remove every list and every task.
    pub async fn delete_all(&self) -> Result<(), ServiceError> {
        let lists = self
            .store
            .delete_many(Collection::Lists, &Filter::All)
            .await?;
        let tasks = self.tasks.delete_all().await?;
        tracing::info!("Cleared {} lists and {} tasks", lists, tasks);
        Ok(())
    }

    /// Resolve a list's task references.
    pub async fn populate(&self, record: ListRecord) -> Result<List, ServiceError> {
        let tasks = self.tasks.find_many(&record.tasks).await?;
        Ok(List::from_record(record, tasks))
    }

    async fn find_record(&self, id: ObjectId) -> Result<ListRecord, ServiceError> {
        let document = self
            .store
            .find_one(Collection::Lists, &Filter::Id(id))
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("List {}", id)))?;
        Ok(from_document(document)?)
    }
}

fn name_pattern(search: &str) -> Result<Regex, ServiceError> {
    Regex::new(search)
        .or_else(|_| Regex::new(&regex::escape(search)))
        .map_err(|e| ServiceError::InvalidInput(format!("Invalid search: {}", e)))
}
