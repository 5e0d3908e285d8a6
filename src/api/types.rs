//! API request types.

use serde::Deserialize;
use serde_json::Value;

/// Query parameters for listing lists.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListListsQuery {
    /// Number of lists to skip (default 0)
    pub skip: Option<usize>,

    /// Maximum number of lists to return (default from config, 0 = no limit)
    pub limit: Option<usize>,

    /// Name pattern to match
    pub search: Option<String>,
}

/// Request to create a list.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateListRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Request to set a task's completion flag.
///
/// `complete` stays untyped so that a non-boolean value reaches the task
/// service and is rejected there.
#[derive(Debug, Clone, Deserialize)]
pub struct SetCompleteRequest {
    pub complete: Option<Value>,
}
