use crate::{
    Error,
    error::{StorageError, ValidationError},
};

/// Extension trait for mapping backend errors into [`StorageError`].
///
/// The backend message is kept for logs; it never reaches an HTTP client
/// because every storage error is reported as a generic server error.
///
/// # Example
///
/// ```rust,ignore
/// use gatehouse_core::error::utilities::DatabaseResultExt;
///
/// query.execute(&pool).await.map_db_err_with_context("Failed to delete session")?;
/// ```
pub trait DatabaseResultExt<T> {
    /// Convert a database error to a storage error
    fn map_db_err(self) -> Result<T, Error>;

    /// Convert a database error to a storage error, prefixing `context`
    fn map_db_err_with_context(self, context: &str) -> Result<T, Error>;
}

impl<T, E: std::fmt::Display> DatabaseResultExt<T> for Result<T, E> {
    fn map_db_err(self) -> Result<T, Error> {
        self.map_err(|e| Error::Storage(StorageError::Database(e.to_string())))
    }

    fn map_db_err_with_context(self, context: &str) -> Result<T, Error> {
        self.map_err(|e| {
            tracing::error!(error = %e, "{context}");
            Error::Storage(StorageError::Database(format!("{context}: {e}")))
        })
    }
}

/// Extension trait for builder fields that must be present.
pub trait RequiredFieldExt<T> {
    /// Convert None to a ValidationError::MissingField
    fn require_field(self, field_name: &str) -> Result<T, ValidationError>;
}

impl<T> RequiredFieldExt<T> for Option<T> {
    fn require_field(self, field_name: &str) -> Result<T, ValidationError> {
        self.ok_or_else(|| ValidationError::MissingField(format!("{field_name} is required")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_db_err() {
        let result: Result<i32, &str> = Err("database is locked");
        match result.map_db_err().unwrap_err() {
            Error::Storage(StorageError::Database(msg)) => {
                assert_eq!(msg, "database is locked");
            }
            other => panic!("Expected storage database error, got {other:?}"),
        }
    }

    #[test]
    fn test_map_db_err_with_context() {
        let result: Result<i32, &str> = Err("timeout");
        match result
            .map_db_err_with_context("Failed to record login failure")
            .unwrap_err()
        {
            Error::Storage(StorageError::Database(msg)) => {
                assert_eq!(msg, "Failed to record login failure: timeout");
            }
            other => panic!("Expected storage database error, got {other:?}"),
        }
    }

    #[test]
    fn test_require_field() {
        assert_eq!(
            Some("seller@example.pk").require_field("Email").unwrap(),
            "seller@example.pk"
        );

        let none: Option<String> = None;
        match none.require_field("Email").unwrap_err() {
            ValidationError::MissingField(msg) => assert_eq!(msg, "Email is required"),
            other => panic!("Expected missing field error, got {other:?}"),
        }
    }
}
