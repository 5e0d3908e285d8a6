//! Router assembly and shared state.

use std::sync::Arc;

use axum::{handler::HandlerWithoutStateExt, http::StatusCode, Router};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::service::{ListService, TaskService};
use crate::store::SharedDocumentStore;

use super::lists as lists_api;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// List resource manager
    pub lists: ListService,
    /// Task resource manager
    pub tasks: TaskService,
}

impl AppState {
    pub fn new(config: Config, store: SharedDocumentStore) -> Self {
        let tasks = TaskService::new(Arc::clone(&store));
        let lists = ListService::new(store, tasks.clone())
            .with_default_limit(config.default_list_limit);
        Self {
            config,
            lists,
            tasks,
        }
    }
}

/// Build the HTTP application.
pub fn router(state: Arc<AppState>) -> Router {
    let app = Router::new().nest("/lists", lists_api::routes());

    let app = match &state.config.static_dir {
        Some(dir) => app.fallback_service(
            ServeDir::new(dir)
                .call_fallback_on_method_not_allowed(true)
                .not_found_service(not_found.into_service()),
        ),
        None => app.fallback(not_found),
    };

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}
