//! Catalog configuration
//!
//! Loaded from a JSON file. Only `storagePath` is required.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::{CatalogError, CatalogResult};
use crate::fulltext::{DEFAULT_MAX_QUERY_TEXT_LENGTH, DEFAULT_MAX_SEARCH_HITS};

/// What a mutation reports when storage committed but indexing failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IndexFailurePolicy {
    /// Log and report success; the record is searchable after the next rebuild
    #[default]
    BestEffort,
    /// Return `CatalogError::IndexFailed`
    Report,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogConfig {
    /// Root directory of the file store
    pub storage_path: PathBuf,

    #[serde(default)]
    pub index_failure_policy: IndexFailurePolicy,

    /// Rebuild the fulltext index from storage when the catalog opens
    #[serde(default = "default_rebuild_index_on_open")]
    pub rebuild_index_on_open: bool,

    /// Longest accepted search text, in characters
    #[serde(default = "default_max_query_text_length")]
    pub max_query_text_length: usize,

    /// Most ids a single search returns
    #[serde(default = "default_max_search_hits")]
    pub max_search_hits: usize,
}

fn default_rebuild_index_on_open() -> bool {
    true
}
fn default_max_query_text_length() -> usize {
    DEFAULT_MAX_QUERY_TEXT_LENGTH
}
fn default_max_search_hits() -> usize {
    DEFAULT_MAX_SEARCH_HITS
}

impl CatalogConfig {
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: storage_path.into(),
            index_failure_policy: IndexFailurePolicy::default(),
            rebuild_index_on_open: default_rebuild_index_on_open(),
            max_query_text_length: default_max_query_text_length(),
            max_search_hits: default_max_search_hits(),
        }
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> CatalogResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CatalogError::config(format!("Failed to read config: {}", e)))?;

        let config: CatalogConfig = serde_json::from_str(&content)
            .map_err(|e| CatalogError::config(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> CatalogResult<()> {
        if self.storage_path.as_os_str().is_empty() {
            return Err(CatalogError::config("storagePath must not be empty"));
        }
        if self.max_query_text_length == 0 {
            return Err(CatalogError::config("maxQueryTextLength must be > 0"));
        }
        if self.max_search_hits == 0 {
            return Err(CatalogError::config("maxSearchHits must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_applied() {
        let config: CatalogConfig = serde_json::from_str(r#"{"storagePath": "/var/lib/catalog"}"#).unwrap();
        assert_eq!(config, CatalogConfig::new("/var/lib/catalog"));
        assert_eq!(config.index_failure_policy, IndexFailurePolicy::BestEffort);
        assert!(config.rebuild_index_on_open);
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(
            &path,
            r#"{"storagePath": "data", "indexFailurePolicy": "report", "maxSearchHits": 50}"#,
        )
        .unwrap();

        let config = CatalogConfig::load(&path).unwrap();
        assert_eq!(config.index_failure_policy, IndexFailurePolicy::Report);
        assert_eq!(config.max_search_hits, 50);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");

        fs::write(&path, r#"{"storagePath": "data", "maxSearchHits": 0}"#).unwrap();
        assert!(matches!(CatalogConfig::load(&path), Err(CatalogError::Config(_))));

        fs::write(&path, r#"{"indexFailurePolicy": "report"}"#).unwrap();
        assert!(matches!(CatalogConfig::load(&path), Err(CatalogError::Config(_))));

        assert!(matches!(
            CatalogConfig::load(&dir.path().join("missing.json")),
            Err(CatalogError::Config(_))
        ));
    }
}
