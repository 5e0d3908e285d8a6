//! Resource managers for lists and tasks.
//!
//! Both services receive the document store handle explicitly, so tests can
//! hand them an in-memory store.

mod lists;
mod tasks;

pub use lists::{ListService, DEFAULT_LIST_LIMIT};
pub use tasks::TaskService;

use crate::error::ServiceError;
use crate::store::ObjectId;

/// Parse a path identifier.
pub(crate) fn parse_id(value: &str) -> Result<ObjectId, ServiceError> {
    Ok(ObjectId::parse_str(value)?)
}

/// A required, non-empty name.
pub(crate) fn required_name(name: Option<&str>, what: &str) -> Result<String, ServiceError> {
    match name {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(ServiceError::InvalidInput(format!("{} name is required", what))),
    }
}
