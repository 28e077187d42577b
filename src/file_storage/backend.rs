//! # Storage Backend Trait

use std::fmt;
use std::io::{Read, Write};

use uuid::Uuid;

use super::errors::StorageResult;
use super::record::StoredRecord;

/// Durable home of records and content versions
///
/// Content is first written to a staging area, then published under a
/// fresh version name. A version only becomes authoritative once a record
/// naming it has been written; `write_record` must therefore be atomic.
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Writable staging area; dropping it unpublished discards the bytes
    type Staging: Write + Send;

    /// Reader over a published content version
    type Reader: Read + Send;

    /// Start staging new content
    fn begin_staging(&self) -> StorageResult<Self::Staging>;

    /// Make staged bytes durable as `version` of `id`
    fn publish_content(&self, staging: Self::Staging, id: &Uuid, version: &Uuid) -> StorageResult<()>;

    /// Atomically replace the record of `record.id()`
    fn write_record(&self, record: &StoredRecord) -> StorageResult<()>;

    /// Open a published content version
    fn open_content(&self, id: &Uuid, version: &Uuid) -> StorageResult<Self::Reader>;

    /// Remove a content version; missing versions are not an error
    fn remove_content(&self, id: &Uuid, version: &Uuid) -> StorageResult<()>;

    /// Remove the record and every content version of `id`
    fn remove_record(&self, id: &Uuid) -> StorageResult<()>;

    /// Load every committed record, discarding unreferenced leftovers
    fn load_records(&self) -> StorageResult<Vec<StoredRecord>>;
}
