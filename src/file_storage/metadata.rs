//! # File Metadata
//!
//! Stable, serde-backed data model shared by the storage engine, the
//! fulltext index and the request layer. Optional fields default on read so
//! records persisted by older layouts stay readable.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::errors::{StorageError, StorageResult};

/// Kind of catalog document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileType {
    DatasetRegistration,
    DistributionRegistration,
    PublisherRegistration,
    LocalCatalogRegistration,
    DistributionFile,
}

impl FileType {
    pub const ALL: [FileType; 5] = [
        FileType::DatasetRegistration,
        FileType::DistributionRegistration,
        FileType::PublisherRegistration,
        FileType::LocalCatalogRegistration,
        FileType::DistributionFile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::DatasetRegistration => "datasetRegistration",
            FileType::DistributionRegistration => "distributionRegistration",
            FileType::PublisherRegistration => "publisherRegistration",
            FileType::LocalCatalogRegistration => "localCatalogRegistration",
            FileType::DistributionFile => "distributionFile",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Facet and filter dimension names with built-in meaning
pub mod dimensions {
    pub const PUBLISHERS: &str = "publishers";
    pub const TYPES: &str = "types";
    pub const THEMES: &str = "themes";
    pub const KEYWORDS: &str = "keywords";
}

fn default_timestamp() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// Metadata describing one stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    #[serde(default)]
    pub parent_file: Option<Uuid>,
    #[serde(default)]
    pub publisher: Option<String>,
    pub is_public: bool,
    #[serde(default)]
    pub original_file_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub additional_values: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_timestamp")]
    pub created: DateTime<Utc>,
    #[serde(default = "default_timestamp")]
    pub last_modified: DateTime<Utc>,
}

impl FileMetadata {
    /// Create non-public metadata with no publisher and empty descriptive fields
    pub fn new(id: Uuid, name: impl Into<String>, file_type: FileType) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            file_type,
            parent_file: None,
            publisher: None,
            is_public: false,
            original_file_name: None,
            description: None,
            themes: Vec::new(),
            keywords: Vec::new(),
            additional_values: BTreeMap::new(),
            created: now,
            last_modified: now,
        }
    }

    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = Some(publisher.into());
        self
    }

    pub fn public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }

    /// Structural checks applied before any write
    pub fn validate(&self) -> StorageResult<()> {
        if self.id.is_nil() {
            return Err(StorageError::BadRequest("Id must not be empty".into()));
        }

        match self.publisher.as_deref() {
            Some(p) if p.trim().is_empty() => {
                Err(StorageError::BadRequest("Publisher must not be blank".into()))
            }
            None if !self.is_public => Err(StorageError::BadRequest(
                "Publisher is required for non-public records".into(),
            )),
            _ => Ok(()),
        }
    }

    /// Values of a facet/filter dimension carried by this record
    pub fn dimension_values(&self, dimension: &str) -> Vec<&str> {
        match dimension {
            dimensions::PUBLISHERS => self.publisher.as_deref().into_iter().collect(),
            dimensions::TYPES => vec![self.file_type.as_str()],
            dimensions::THEMES => self.themes.iter().map(String::as_str).collect(),
            dimensions::KEYWORDS => self.keywords.iter().map(String::as_str).collect(),
            other => self
                .additional_values
                .get(other)
                .map(|values| values.iter().map(String::as_str).collect())
                .unwrap_or_default(),
        }
    }
}

/// Descriptor of a stored content blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentInfo {
    pub size: u64,
    /// SHA-256, lowercase hex
    pub checksum: String,
}

impl ContentInfo {
    /// Calculate checksum for data
    pub fn calculate_checksum(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        format!("{:x}", hasher.finalize())
    }

    pub fn for_bytes(data: &[u8]) -> Self {
        Self {
            size: data.len() as u64,
            checksum: Self::calculate_checksum(data),
        }
    }
}

/// Metadata paired with its committed content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileState {
    pub metadata: FileMetadata,
    pub content: ContentInfo,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependent_files: Vec<FileState>,
}

impl FileState {
    pub fn new(metadata: FileMetadata, content: ContentInfo) -> Self {
        Self {
            metadata,
            content,
            dependent_files: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.metadata.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_requires_publisher_for_private() {
        let metadata = FileMetadata::new(Uuid::new_v4(), "x", FileType::DatasetRegistration);
        assert!(matches!(metadata.validate(), Err(StorageError::BadRequest(_))));

        assert!(metadata.clone().public(true).validate().is_ok());
        assert!(metadata.with_publisher("P1").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_nil_id_and_blank_publisher() {
        let nil = FileMetadata::new(Uuid::nil(), "x", FileType::DatasetRegistration).public(true);
        assert!(nil.validate().is_err());

        let blank = FileMetadata::new(Uuid::new_v4(), "x", FileType::DatasetRegistration)
            .with_publisher("  ");
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_reads_minimal_legacy_record() {
        let id = Uuid::new_v4();
        let value = json!({
            "id": id,
            "name": "Legacy",
            "type": "datasetRegistration",
            "isPublic": true
        });

        let metadata: FileMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(metadata.id, id);
        assert_eq!(metadata.publisher, None);
        assert!(metadata.keywords.is_empty());
        assert_eq!(metadata.created, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_serialized_field_names() {
        let metadata = FileMetadata::new(Uuid::new_v4(), "x", FileType::PublisherRegistration)
            .with_publisher("P1");
        let value = serde_json::to_value(&metadata).unwrap();

        assert_eq!(value["type"], "publisherRegistration");
        assert_eq!(value["isPublic"], false);
        assert_eq!(value["publisher"], "P1");
        assert!(value.get("lastModified").is_some());
    }

    #[test]
    fn test_dimension_values() {
        let mut metadata = FileMetadata::new(Uuid::new_v4(), "x", FileType::DatasetRegistration)
            .with_publisher("P1");
        metadata.themes = vec!["health".into(), "transport".into()];
        metadata
            .additional_values
            .insert("format".into(), vec!["csv".into()]);

        assert_eq!(metadata.dimension_values("publishers"), vec!["P1"]);
        assert_eq!(metadata.dimension_values("types"), vec!["datasetRegistration"]);
        assert_eq!(metadata.dimension_values("themes"), vec!["health", "transport"]);
        assert_eq!(metadata.dimension_values("format"), vec!["csv"]);
        assert!(metadata.dimension_values("unknown").is_empty());
    }

    #[test]
    fn test_checksum() {
        let info = ContentInfo::for_bytes(b"test");
        assert_eq!(info.size, 4);
        assert_eq!(info.checksum.len(), 64); // SHA-256 hex
    }
}
