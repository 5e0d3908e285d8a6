//! Error taxonomy shared by the list and task services.

use crate::store::{InvalidObjectId, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// A required field is missing or malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidObjectId),

    /// Well-formed identifier without a matching document.
    #[error("{0} not found")]
    NotFound(String),

    /// Uniqueness violation.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey {
                collection,
                field,
                value,
            } => ServiceError::Conflict(format!(
                "{} with {} {} already exists",
                collection, field, value
            )),
            other => ServiceError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Collection, ObjectId};
    use serde_json::json;

    #[test]
    fn test_duplicate_key_becomes_conflict() {
        let err: ServiceError = StoreError::DuplicateKey {
            collection: Collection::Lists,
            field: "name".to_string(),
            value: json!("Groceries"),
        }
        .into();
        match err {
            ServiceError::Conflict(message) => {
                assert_eq!(message, r#"lists with name "Groceries" already exists"#)
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_backend_failure_stays_store_error() {
        let err: ServiceError = StoreError::Backend("disk full".to_string()).into();
        assert!(matches!(err, ServiceError::Store(StoreError::Backend(_))));
    }

    #[test]
    fn test_invalid_identifier_from_parse() {
        let err: ServiceError = ObjectId::parse_str("nope").unwrap_err().into();
        assert!(matches!(err, ServiceError::InvalidIdentifier(_)));
    }
}
