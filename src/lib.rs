//! # todo_lists
//!
//! REST service for to-do lists made of tasks, backed by a document store.
//!
//! ## Architecture
//!
//! ```text
//!        ┌──────────────────────────────────┐
//!        │        api (axum Router)         │
//!        │  /lists, /lists/:id/tasks, ...   │
//!        └────────────────┬─────────────────┘
//!                         │
//!                         ▼
//!        ┌──────────────────────────────────┐
//!        │   ListService ──▶ TaskService    │
//!        └────────────────┬─────────────────┘
//!                         │
//!                         ▼
//!                ┌─────────────────┐
//!                │  DocumentStore  │
//!                │ (memory/sqlite) │
//!                └─────────────────┘
//! ```
//!
//! ## Modules
//! - `api`: HTTP routes and status mapping
//! - `service`: list and task resource managers
//! - `store`: document store trait and backends
//! - `server`: start/stop lifecycle

pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod server;
pub mod service;
pub mod store;

pub use config::Config;
pub use error::ServiceError;
pub use model::{List, NewTask, Task};
pub use server::{Server, ServerError};
pub use service::{ListService, TaskService};
