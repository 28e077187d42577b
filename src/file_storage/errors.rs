//! # File Storage Errors

use thiserror::Error;
use uuid::Uuid;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// File storage errors
///
/// `NotFound` is also returned when the caller may not see the record.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(Uuid),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("File already exists: {0}")]
    Conflict(Uuid),

    // Validation errors
    #[error("Bad request: {0}")]
    BadRequest(String),

    // Persistence errors
    #[error("Corrupted record {0}: {1}")]
    Corrupted(String, String),

    #[error("I/O error: {0}")]
    IoError(String),

    // Internal
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            StorageError::NotFound(_) => 404,
            StorageError::Unauthorized => 403,
            StorageError::Conflict(_) => 409,
            StorageError::BadRequest(_) => 400,
            StorageError::Corrupted(_, _) => 500,
            StorageError::IoError(_) => 500,
            StorageError::Internal(_) => 500,
        }
    }

    pub(crate) fn poisoned() -> Self {
        StorageError::Internal("Lock poisoned".into())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::IoError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(StorageError::NotFound(Uuid::nil()).status_code(), 404);
        assert_eq!(StorageError::Conflict(Uuid::nil()).status_code(), 409);
        assert_eq!(StorageError::Unauthorized.status_code(), 403);
        assert_eq!(StorageError::BadRequest("x".into()).status_code(), 400);
    }

    #[test]
    fn test_io_error_conversion() {
        let err: StorageError = std::io::Error::new(std::io::ErrorKind::Other, "disk gone").into();
        assert!(matches!(err, StorageError::IoError(ref msg) if msg.contains("disk gone")));
    }
}
