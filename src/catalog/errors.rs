//! Catalog error types

use thiserror::Error;
use uuid::Uuid;

use crate::file_storage::StorageError;
use crate::fulltext::FulltextError;

/// Errors surfaced by the catalog service
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Fulltext(#[from] FulltextError),

    /// The storage mutation committed but the index was not updated
    #[error("File {id} was stored but indexing failed: {source}")]
    IndexFailed { id: Uuid, source: FulltextError },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl CatalogError {
    pub fn config(message: impl Into<String>) -> Self {
        CatalogError::Config(message.into())
    }

    /// HTTP status code for the request layer
    pub fn status_code(&self) -> u16 {
        match self {
            CatalogError::Storage(e) => e.status_code(),
            CatalogError::Fulltext(e) => e.status_code(),
            CatalogError::IndexFailed { .. } => 500,
            CatalogError::Config(_) => 500,
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;
