//! HTTP API for the to-do list service.
//!
//! ## Endpoints
//!
//! - `GET /lists` - List lists (`skip`, `limit`, `search` query parameters)
//! - `GET /lists/{id}` - Get one list, wrapped in an array
//! - `POST /lists` - Create a list
//! - `POST /lists/{id}/tasks` - Add a task to a list
//! - `PUT /lists/{id}/tasks/{task_id}/complete` - Set a task's completion flag
//! - `DELETE /lists/clear` - Remove every list and task
//! - `DELETE /lists/{id}` - Remove one list and its tasks

mod lists;
mod routes;
pub mod types;

pub use routes::{router, AppState};
pub use types::*;
