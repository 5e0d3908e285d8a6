//! SQLite-based document store.
//!
//! Every document is a row in `documents` holding its JSON body. Unique
//! fields are backed by partial expression indexes, so other processes
//! sharing the file cannot sneak in duplicates either.

use super::{
    assign_id, Collection, Document, DocumentStore, FindOptions, Filter, ObjectId, StoreError,
    Update, ID_FIELD,
};
use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, Params};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS documents (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    body TEXT NOT NULL,
    UNIQUE (collection, id)
);

CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, seq);
"#;

pub struct SqliteDocumentStore {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

fn backend_error(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn unique_index_name(collection: Collection, field: &str) -> String {
    format!("idx_{}_{}_unique", collection.as_str(), field)
}

/// Identifiers a filter restricts matches to, if it restricts them at all.
fn id_constraint(filter: &Filter) -> Option<Vec<ObjectId>> {
    match filter {
        Filter::Id(id) => Some(vec![*id]),
        Filter::IdIn(ids) => Some(ids.clone()),
        Filter::And(filters) => filters.iter().find_map(id_constraint),
        _ => None,
    }
}

impl SqliteDocumentStore {
    pub async fn open(path: PathBuf) -> Result<Self, StoreError> {
        let in_memory = path.as_os_str() == ":memory:";
        if !in_memory {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StoreError::Backend(format!("Failed to create store dir: {}", e)))?;
            }
        }

        let db_path = path.clone();
        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)
                .map_err(|e| StoreError::Backend(format!("Failed to open SQLite database: {}", e)))?;
            conn.execute_batch(SCHEMA)
                .map_err(|e| StoreError::Backend(format!("Failed to run schema: {}", e)))?;
            Self::create_unique_indexes(&conn)?;
            Ok::<_, StoreError>(conn)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("Task join error: {}", e)))??;

        tracing::info!("Opened SQLite document store at {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn create_unique_indexes(conn: &Connection) -> Result<(), StoreError> {
        for collection in Collection::ALL {
            for field in collection.unique_fields() {
                let sql = format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS {} ON documents(json_extract(body, '$.{}')) WHERE collection = '{}'",
                    unique_index_name(collection, field),
                    field,
                    collection.as_str()
                );
                conn.execute_batch(&sql).map_err(|e| {
                    StoreError::Backend(format!("Failed to create unique index: {}", e))
                })?;
            }
        }
        Ok(())
    }

    /// Documents matching `filter` in insertion order, as `(row id, document)` pairs.
    ///
    /// Identifier filters become a key lookup; everything else is matched
    /// after decoding.
    fn load(
        conn: &Connection,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<(String, Document)>, StoreError> {
        let rows = match id_constraint(filter) {
            Some(ids) if ids.is_empty() => Vec::new(),
            Some(ids) => {
                let placeholders: Vec<String> =
                    (0..ids.len()).map(|i| format!("?{}", i + 2)).collect();
                let sql = format!(
                    "SELECT id, body FROM documents WHERE collection = ?1 AND id IN ({}) ORDER BY seq",
                    placeholders.join(", ")
                );
                let mut values = vec![collection.as_str().to_string()];
                values.extend(ids.iter().map(ObjectId::to_hex));
                Self::rows(conn, &sql, params_from_iter(values))?
            }
            None => Self::rows(
                conn,
                "SELECT id, body FROM documents WHERE collection = ?1 ORDER BY seq",
                params![collection.as_str()],
            )?,
        };

        let mut documents = Vec::with_capacity(rows.len());
        for (id, body) in rows {
            let document = match serde_json::from_str::<Value>(&body) {
                Ok(Value::Object(document)) => document,
                Ok(_) => return Err(StoreError::Corrupt(format!("{} is not an object", id))),
                Err(e) => return Err(StoreError::Corrupt(format!("{}: {}", id, e))),
            };
            if filter.matches(&document) {
                documents.push((id, document));
            }
        }
        Ok(documents)
    }

    fn rows<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<(String, String)>, StoreError> {
        let mut stmt = conn.prepare(sql).map_err(backend_error)?;
        let rows = stmt
            .query_map(params, |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(backend_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend_error)?;
        Ok(rows)
    }

    /// Map a failed write to a duplicate key when a constraint rejected it.
    fn write_error(collection: Collection, document: &Document, err: rusqlite::Error) -> StoreError {
        let rusqlite::Error::SqliteFailure(failure, message) = &err else {
            return backend_error(err);
        };
        if failure.code != ErrorCode::ConstraintViolation {
            return backend_error(err);
        }
        let message = message.as_deref().unwrap_or_default();
        let field = collection
            .unique_fields()
            .iter()
            .find(|f| message.contains(&unique_index_name(collection, f)))
            .copied()
            .unwrap_or(ID_FIELD);
        StoreError::DuplicateKey {
            collection,
            field: field.to_string(),
            value: document.get(field).cloned().unwrap_or(Value::Null),
        }
    }

    fn encode(document: &Document) -> Result<String, StoreError> {
        serde_json::to_string(document).map_err(|e| StoreError::Corrupt(e.to_string()))
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    fn is_persistent(&self) -> bool {
        self.path.as_os_str() != ":memory:"
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        options: FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let conn = self.conn.clone();
        let filter = filter.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<Document>, StoreError> {
            let conn = conn.blocking_lock();
            let matching = Self::load(&conn, collection, &filter)?
                .into_iter()
                .map(|(_, document)| document)
                .skip(options.skip);
            Ok(match options.limit {
                Some(limit) => matching.take(limit).collect(),
                None => matching.collect(),
            })
        })
        .await
        .map_err(backend_error)?
    }

    async fn insert(
        &self,
        collection: Collection,
        mut document: Document,
    ) -> Result<Document, StoreError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<Document, StoreError> {
            let id = assign_id(&mut document);
            let conn = conn.blocking_lock();
            // Duplicate ids and unique fields are rejected by the table's indexes.
            let body = Self::encode(&document)?;
            conn.execute(
                "INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3)",
                params![collection.as_str(), id.to_hex(), body],
            )
            .map_err(|e| Self::write_error(collection, &document, e))?;
            tracing::debug!("Inserted {} into {}", id, collection);
            Ok(document)
        })
        .await
        .map_err(backend_error)?
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> Result<Option<Document>, StoreError> {
        let conn = self.conn.clone();
        let filter = filter.clone();
        let update = update.clone();
        tokio::task::spawn_blocking(move || -> Result<Option<Document>, StoreError> {
            let conn = conn.blocking_lock();
            let Some((row_id, mut updated)) =
                Self::load(&conn, collection, &filter)?.into_iter().next()
            else {
                return Ok(None);
            };
            update.apply(&mut updated)?;

            let body = Self::encode(&updated)?;
            conn.execute(
                "UPDATE documents SET body = ?1 WHERE collection = ?2 AND id = ?3",
                params![body, collection.as_str(), &row_id],
            )
            .map_err(|e| Self::write_error(collection, &updated, e))?;
            Ok(Some(updated))
        })
        .await
        .map_err(backend_error)?
    }

    async fn delete_many(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<u64, StoreError> {
        let conn = self.conn.clone();
        let filter = filter.clone();
        tokio::task::spawn_blocking(move || -> Result<u64, StoreError> {
            let mut conn = conn.blocking_lock();
            let doomed: Vec<String> = Self::load(&conn, collection, &filter)?
                .into_iter()
                .map(|(id, _)| id)
                .collect();

            let tx = conn.transaction().map_err(backend_error)?;
            for id in &doomed {
                tx.execute(
                    "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection.as_str(), id],
                )
                .map_err(backend_error)?;
            }
            tx.commit().map_err(backend_error)?;
            tracing::debug!("Deleted {} documents from {}", doomed.len(), collection);
            Ok(doomed.len() as u64)
        })
        .await
        .map_err(backend_error)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::document_id;
    use serde_json::json;
    use tempfile::TempDir;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_documents_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("todo.db");

        let id = {
            let store = SqliteDocumentStore::open(path.clone()).await.unwrap();
            assert!(store.is_persistent());
            let stored = store
                .insert(Collection::Lists, doc(json!({ "name": "kept", "tasks": [] })))
                .await
                .unwrap();
            document_id(&stored).unwrap()
        };

        let reopened = SqliteDocumentStore::open(path).await.unwrap();
        let found = reopened
            .find_one(Collection::Lists, &Filter::Id(id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found["name"], json!("kept"));
    }

    #[tokio::test]
    async fn test_unique_name_and_paging() {
        let store = SqliteDocumentStore::open(PathBuf::from(":memory:"))
            .await
            .unwrap();
        assert!(!store.is_persistent());

        for name in ["a1", "a2", "b1"] {
            store
                .insert(Collection::Lists, doc(json!({ "name": name })))
                .await
                .unwrap();
        }
        let err = store
            .insert(Collection::Lists, doc(json!({ "name": "a2" })))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { ref field, .. } if field == "name"));

        let page = store
            .find(Collection::Lists, &Filter::All, FindOptions::page(1, 1))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0]["name"], json!("a2"));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = SqliteDocumentStore::open(PathBuf::from(":memory:"))
            .await
            .unwrap();
        let task = store
            .insert(Collection::Tasks, doc(json!({ "name": "t", "complete": false })))
            .await
            .unwrap();
        let id = document_id(&task).unwrap();

        let updated = store
            .update_one(Collection::Tasks, &Filter::Id(id), &Update::set("complete", true))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["complete"], json!(true));

        let reread = store
            .find_one(Collection::Tasks, &Filter::Id(id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reread["complete"], json!(true));

        let missing = store
            .update_one(
                Collection::Tasks,
                &Filter::Id(crate::store::ObjectId::new()),
                &Update::set("complete", true),
            )
            .await
            .unwrap();
        assert!(missing.is_none());

        assert_eq!(
            store
                .delete_many(Collection::Tasks, &Filter::All)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .delete_many(Collection::Tasks, &Filter::All)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_id_lookups_use_key_and_keep_insert_order() {
        let store = SqliteDocumentStore::open(PathBuf::from(":memory:"))
            .await
            .unwrap();
        let mut ids = Vec::new();
        for name in ["one", "two", "three"] {
            let stored = store
                .insert(Collection::Tasks, doc(json!({ "name": name, "complete": false })))
                .await
                .unwrap();
            ids.push(document_id(&stored).unwrap());
        }

        let found = store
            .find(
                Collection::Tasks,
                &Filter::IdIn(vec![ids[2], ObjectId::new(), ids[0]]),
                FindOptions::default(),
            )
            .await
            .unwrap();
        let names: Vec<_> = found.iter().map(|d| d["name"].clone()).collect();
        assert_eq!(names, vec![json!("one"), json!("three")]);

        let none = store
            .find(Collection::Tasks, &Filter::IdIn(Vec::new()), FindOptions::default())
            .await
            .unwrap();
        assert!(none.is_empty());

        let narrowed = Filter::And(vec![Filter::Id(ids[1]), Filter::eq("name", "other")]);
        assert!(store
            .find_one(Collection::Tasks, &narrowed)
            .await
            .unwrap()
            .is_none());
        let matched = Filter::And(vec![Filter::Id(ids[1]), Filter::eq("name", "two")]);
        assert!(store
            .find_one(Collection::Tasks, &matched)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_index_rejects_duplicates_on_insert_and_update() {
        let store = SqliteDocumentStore::open(PathBuf::from(":memory:"))
            .await
            .unwrap();
        let first = store
            .insert(Collection::Lists, doc(json!({ "name": "first" })))
            .await
            .unwrap();
        let second = store
            .insert(Collection::Lists, doc(json!({ "name": "second" })))
            .await
            .unwrap();

        let err = store
            .insert(Collection::Lists, first.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { ref field, .. } if field == ID_FIELD));

        let err = store
            .update_one(
                Collection::Lists,
                &Filter::Id(document_id(&second).unwrap()),
                &Update::set("name", "first"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { ref field, .. } if field == "name"));

        // tasks have no unique fields
        for _ in 0..2 {
            store
                .insert(Collection::Tasks, doc(json!({ "name": "same" })))
                .await
                .unwrap();
        }
    }
}
