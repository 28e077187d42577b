//! Fulltext index error types

use thiserror::Error;

/// Fulltext index errors
#[derive(Debug, Clone, Error)]
pub enum FulltextError {
    #[error("Invalid search request: {0}")]
    BadRequest(String),

    #[error("Fulltext index failure: {0}")]
    Internal(String),
}

impl FulltextError {
    /// HTTP status code for the request layer
    pub fn status_code(&self) -> u16 {
        match self {
            FulltextError::BadRequest(_) => 400,
            FulltextError::Internal(_) => 500,
        }
    }

    pub(crate) fn poisoned() -> Self {
        FulltextError::Internal("fulltext index lock poisoned".to_string())
    }
}

pub type FulltextResult<T> = Result<T, FulltextError>;
