//! # Stored Record
//!
//! Persisted envelope pairing metadata with the content version it
//! describes. Writing the envelope is the commit point of every mutation.
//!
//! The checksum is sealed over the exact metadata and content bytes held
//! in the envelope, so a record stays verifiable after fields gain
//! defaults or new optional fields are added.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use uuid::Uuid;

use super::errors::{StorageError, StorageResult};
use super::metadata::{ContentInfo, FileMetadata, FileState};

/// In-memory form of a persisted record
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub metadata: FileMetadata,
    pub content: ContentInfo,
    /// Name of the committed content version
    pub version: Uuid,
}

/// On-disk layout. Payload fields are kept as raw JSON so the bytes
/// that were sealed are the bytes that get verified.
#[derive(Serialize, Deserialize)]
struct Envelope<'a> {
    #[serde(borrow)]
    metadata: &'a RawValue,
    #[serde(borrow)]
    content: &'a RawValue,
    version: Uuid,
    /// `crc32:XXXXXXXX` over raw metadata, raw content and version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    checksum: Option<String>,
}

fn seal(metadata: &[u8], content: &[u8], version: &Uuid) -> String {
    let mut hasher = Hasher::new();
    hasher.update(metadata);
    hasher.update(content);
    hasher.update(version.as_bytes());
    format!("crc32:{:08x}", hasher.finalize())
}

fn to_raw<T: Serialize>(value: &T) -> StorageResult<Box<RawValue>> {
    serde_json::to_string(value)
        .and_then(RawValue::from_string)
        .map_err(|e| StorageError::Internal(format!("Failed to serialize record: {}", e)))
}

impl StoredRecord {
    /// Pair metadata and content descriptor with the version holding the bytes
    pub fn new(metadata: FileMetadata, content: ContentInfo, version: Uuid) -> Self {
        Self {
            metadata,
            content,
            version,
        }
    }

    /// Id of the record
    pub fn id(&self) -> Uuid {
        self.metadata.id
    }

    /// Public view of the record
    pub fn to_state(&self) -> FileState {
        FileState::new(self.metadata.clone(), self.content.clone())
    }

    /// Serialize with a fresh checksum
    pub fn encode(&self) -> StorageResult<Vec<u8>> {
        let metadata = to_raw(&self.metadata)?;
        let content = to_raw(&self.content)?;
        let checksum = seal(
            metadata.get().as_bytes(),
            content.get().as_bytes(),
            &self.version,
        );

        let envelope = Envelope {
            metadata: &*metadata,
            content: &*content,
            version: self.version,
            checksum: Some(checksum),
        };
        serde_json::to_vec_pretty(&envelope)
            .map_err(|e| StorageError::Internal(format!("Failed to serialize record: {}", e)))
    }

    /// Parse and verify an envelope. Envelopes without a checksum are accepted.
    pub fn decode(bytes: &[u8], origin: &str) -> StorageResult<Self> {
        let corrupted = |e: serde_json::Error| StorageError::Corrupted(origin.to_string(), e.to_string());

        let envelope: Envelope<'_> = serde_json::from_slice(bytes).map_err(corrupted)?;

        if let Some(expected) = &envelope.checksum {
            let actual = seal(
                envelope.metadata.get().as_bytes(),
                envelope.content.get().as_bytes(),
                &envelope.version,
            );
            if &actual != expected {
                return Err(StorageError::Corrupted(
                    origin.to_string(),
                    format!("checksum mismatch: expected {}, got {}", expected, actual),
                ));
            }
        }

        Ok(Self {
            metadata: serde_json::from_str(envelope.metadata.get()).map_err(corrupted)?,
            content: serde_json::from_str(envelope.content.get()).map_err(corrupted)?,
            version: envelope.version,
        })
    }
}
