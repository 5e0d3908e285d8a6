//! Task resource manager.

use crate::error::ServiceError;
use crate::model::{from_document, to_document, Task};
use crate::service::parse_id;
use crate::store::{Collection, Filter, FindOptions, ObjectId, SharedDocumentStore, Update};
use serde_json::Value;

#[derive(Clone)]
pub struct TaskService {
    store: SharedDocumentStore,
}

impl TaskService {
    pub fn new(store: SharedDocumentStore) -> Self {
        Self { store }
    }

    /// Persist a new task.
    pub async fn create(&self, name: &str, complete: bool) -> Result<Task, ServiceError> {
        let task = Task {
            id: ObjectId::new(),
            name: name.to_string(),
            complete,
        };
        let stored = self
            .store
            .insert(Collection::Tasks, to_document(&task)?)
            .await?;
        Ok(from_document(stored)?)
    }

    /// Set the completion flag of a task.
    ///
    /// `complete` must be a JSON boolean. An unknown task is `NotFound`.
    pub async fn set_complete(
        &self,
        task_id: &str,
        complete: Option<&Value>,
    ) -> Result<Task, ServiceError> {
        let Some(complete) = complete.and_then(Value::as_bool) else {
            return Err(ServiceError::InvalidInput(
                "complete must be a boolean".to_string(),
            ));
        };
        let id = parse_id(task_id)?;

        let updated = self
            .store
            .update_one(
                Collection::Tasks,
                &Filter::Id(id),
                &Update::set("complete", complete),
            )
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Task {}", id)))?;
        tracing::debug!("Task {} complete = {}", id, complete);
        Ok(from_document(updated)?)
    }

    /// Fetch tasks by identifier, in the order given. Unknown ids are skipped.
    pub async fn find_many(&self, ids: &[ObjectId]) -> Result<Vec<Task>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let documents = self
            .store
            .find(
                Collection::Tasks,
                &Filter::IdIn(ids.to_vec()),
                FindOptions::default(),
            )
            .await?;
        let mut found = documents
            .into_iter()
            .map(from_document::<Task>)
            .collect::<Result<Vec<_>, _>>()?;

        let mut ordered = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(pos) = found.iter().position(|t| t.id == *id) {
                ordered.push(found.swap_remove(pos));
            }
        }
        Ok(ordered)
    }

    pub async fn delete_many(&self, ids: &[ObjectId]) -> Result<u64, ServiceError> {
        if ids.is_empty() {
            return Ok(0);
        }
        Ok(self
            .store
            .delete_many(Collection::Tasks, &Filter::IdIn(ids.to_vec()))
            .await?)
    }

    pub async fn delete_all(&self) -> Result<u64, ServiceError> {
        Ok(self.store.delete_many(Collection::Tasks, &Filter::All).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryDocumentStore;
    use serde_json::json;
    use std::sync::Arc;

    fn service() -> TaskService {
        TaskService::new(Arc::new(InMemoryDocumentStore::new()))
    }

    #[tokio::test]
    async fn test_create_defaults_incomplete() {
        let tasks = service();
        let task = tasks.create("dishes", false).await.unwrap();
        assert_eq!(task.name, "dishes");
        assert!(!task.complete);
    }

    #[tokio::test]
    async fn test_set_complete_updates_task() {
        let tasks = service();
        let task = tasks.create("dishes", false).await.unwrap();

        let updated = tasks
            .set_complete(&task.id.to_hex(), Some(&json!(true)))
            .await
            .unwrap();
        assert!(updated.complete);
        assert_eq!(updated.id, task.id);

        let fetched = tasks.find_many(&[task.id]).await.unwrap();
        assert!(fetched[0].complete);
    }

    #[tokio::test]
    async fn test_set_complete_requires_boolean() {
        let tasks = service();
        let task = tasks.create("dishes", false).await.unwrap();
        let id = task.id.to_hex();

        for value in [None, Some(json!("true")), Some(json!(1)), Some(Value::Null)] {
            let err = tasks.set_complete(&id, value.as_ref()).await.unwrap_err();
            assert!(matches!(err, ServiceError::InvalidInput(_)), "{value:?}");
        }
    }

    #[tokio::test]
    async fn test_set_complete_unknown_task_is_not_found() {
        let tasks = service();
        let err = tasks
            .set_complete(&ObjectId::new().to_hex(), Some(&json!(true)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let err = tasks
            .set_complete("bad-id", Some(&json!(true)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidIdentifier(_)));
    }

    #[tokio::test]
    async fn test_find_many_keeps_reference_order_and_skips_missing() {
        let tasks = service();
        let first = tasks.create("first", false).await.unwrap();
        let second = tasks.create("second", false).await.unwrap();

        let found = tasks
            .find_many(&[second.id, ObjectId::new(), first.id])
            .await
            .unwrap();
        let names: Vec<_> = found.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_delete_all_is_idempotent() {
        let tasks = service();
        tasks.create("a", false).await.unwrap();
        tasks.create("b", true).await.unwrap();
        assert_eq!(tasks.delete_all().await.unwrap(), 2);
        assert_eq!(tasks.delete_all().await.unwrap(), 0);
    }
}
