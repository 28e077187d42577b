//! # Catalog
//!
//! The entry point for request handlers: storage and search behind one
//! service, configured from a JSON file.

pub mod config;
pub mod errors;
pub mod service;

pub use config::{CatalogConfig, IndexFailurePolicy};
pub use errors::{CatalogError, CatalogResult};
pub use service::CatalogService;
