//! List and task endpoints.
//!
//! Handlers only extract parameters, call the list/task services and pick the
//! status code. Backend failures map to a per-endpoint status.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use std::sync::Arc;

use crate::error::ServiceError;
use crate::model::{List, NewTask, Task};
use crate::store::ObjectId;

use super::routes::AppState;
use super::types::{CreateListRequest, ListListsQuery, SetCompleteRequest};

/// Create list routes (mounted under `/lists`).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_lists).post(create_list))
        .route("/clear", delete(clear_lists))
        .route("/:id", get(get_list).delete(delete_list))
        .route("/:id/tasks", post(add_task))
        .route("/:id/tasks/:task_id/complete", put(set_task_complete))
}

/// Translate a service failure into a status and plain-text body.
///
/// `store_status` is what this endpoint reports when the store itself failed.
fn error_response(err: ServiceError, store_status: StatusCode) -> (StatusCode, String) {
    let status = match &err {
        ServiceError::InvalidInput(_) | ServiceError::InvalidIdentifier(_) => {
            StatusCode::BAD_REQUEST
        }
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Conflict(_) => StatusCode::CONFLICT,
        ServiceError::Store(e) => {
            tracing::error!("Store failure: {}", e);
            store_status
        }
    };
    (status, err.to_string())
}

fn invalid_body(rejection: JsonRejection) -> (StatusCode, String) {
    (
        StatusCode::BAD_REQUEST,
        format!("Invalid Body: {}", rejection.body_text()),
    )
}

/// GET /lists - List lists with populated tasks.
async fn list_lists(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListListsQuery>,
) -> Result<Json<Vec<List>>, (StatusCode, String)> {
    state
        .lists
        .list_all(query.skip, query.limit, query.search.as_deref())
        .await
        .map(Json)
        .map_err(|e| error_response(e, StatusCode::NOT_FOUND))
}

/// GET /lists/:id - Get one list, wrapped in an array.
async fn get_list(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<List>>, (StatusCode, String)> {
    let list = state
        .lists
        .get_by_id(&id)
        .await
        .map_err(|e| error_response(e, StatusCode::BAD_REQUEST))?;
    Ok(Json(vec![list]))
}

/// POST /lists - Create a list.
async fn create_list(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateListRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<List>), (StatusCode, String)> {
    let Json(req) = payload.map_err(invalid_body)?;
    let list = state
        .lists
        .create(req.name.as_deref(), req.description.as_deref())
        .await
        .map_err(|e| error_response(e, StatusCode::BAD_REQUEST))?;
    Ok((StatusCode::CREATED, Json(list)))
}

/// POST /lists/:id/tasks - Add a task to a list.
async fn add_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<NewTask>, JsonRejection>,
) -> Result<(StatusCode, Json<List>), (StatusCode, String)> {
    let Json(task) = payload.map_err(invalid_body)?;
    let list = state
        .lists
        .add_task(&id, task)
        .await
        .map_err(|e| match e {
            // a list that cannot be loaded is reported like a duplicate
            ServiceError::NotFound(_) => (StatusCode::CONFLICT, e.to_string()),
            other => error_response(other, StatusCode::CONFLICT),
        })?;
    Ok((StatusCode::CREATED, Json(list)))
}

/// PUT /lists/:id/tasks/:task_id/complete - Set a task's completion flag.
async fn set_task_complete(
    State(state): State<Arc<AppState>>,
    Path((list_id, task_id)): Path<(String, String)>,
    payload: Result<Json<SetCompleteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), (StatusCode, String)> {
    let Json(req) = payload.map_err(invalid_body)?;
    ObjectId::parse_str(&list_id)
        .map_err(|e| error_response(e.into(), StatusCode::BAD_REQUEST))?;
    let task = state
        .tasks
        .set_complete(&task_id, req.complete.as_ref())
        .await
        .map_err(|e| error_response(e, StatusCode::BAD_REQUEST))?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// DELETE /lists/clear - Remove every list and task.
async fn clear_lists(State(state): State<Arc<AppState>>) -> Result<StatusCode, (StatusCode, String)> {
    state
        .lists
        .delete_all()
        .await
        .map_err(|e| error_response(e, StatusCode::BAD_REQUEST))?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /lists/:id - Remove one list and its tasks.
async fn delete_list(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .lists
        .delete_by_id(&id)
        .await
        .map_err(|e| match e {
            // an id that cannot name a list is reported like an absent one
            ServiceError::InvalidIdentifier(_) => (StatusCode::NOT_FOUND, e.to_string()),
            other => error_response(other, StatusCode::NOT_FOUND),
        })?;
    Ok(StatusCode::NO_CONTENT)
}
