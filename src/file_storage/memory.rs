//! # In-Memory Backend
//!
//! Volatile backend for tests and tooling. Mirrors the commit semantics of
//! the local backend without touching the filesystem.

use std::collections::HashMap;
use std::io::{self, Cursor, Write};
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use super::backend::StorageBackend;
use super::errors::{StorageError, StorageResult};
use super::record::StoredRecord;

/// In-memory storage backend for testing
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<HashMap<Uuid, Vec<u8>>>,
    contents: RwLock<HashMap<(Uuid, Uuid), Arc<[u8]>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of content versions currently held
    pub fn content_versions(&self) -> usize {
        self.contents.read().map(|c| c.len()).unwrap_or(0)
    }
}

/// Content staged in memory
#[derive(Debug, Default)]
pub struct MemoryStaging {
    buffer: Vec<u8>,
}

impl Write for MemoryStaging {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl StorageBackend for MemoryBackend {
    type Staging = MemoryStaging;
    type Reader = Cursor<Arc<[u8]>>;

    fn begin_staging(&self) -> StorageResult<MemoryStaging> {
        Ok(MemoryStaging::default())
    }

    fn publish_content(&self, staging: MemoryStaging, id: &Uuid, version: &Uuid) -> StorageResult<()> {
        let mut contents = self.contents.write().map_err(|_| StorageError::poisoned())?;
        contents.insert((*id, *version), Arc::from(staging.buffer));
        Ok(())
    }

    fn write_record(&self, record: &StoredRecord) -> StorageResult<()> {
        // Round-trip through the encoding so checksums are exercised
        let bytes = record.encode()?;
        let mut records = self.records.write().map_err(|_| StorageError::poisoned())?;
        records.insert(record.id(), bytes);
        Ok(())
    }

    fn open_content(&self, id: &Uuid, version: &Uuid) -> StorageResult<Self::Reader> {
        let contents = self.contents.read().map_err(|_| StorageError::poisoned())?;
        contents
            .get(&(*id, *version))
            .cloned()
            .map(Cursor::new)
            .ok_or(StorageError::NotFound(*id))
    }

    fn remove_content(&self, id: &Uuid, version: &Uuid) -> StorageResult<()> {
        let mut contents = self.contents.write().map_err(|_| StorageError::poisoned())?;
        contents.remove(&(*id, *version));
        Ok(())
    }

    fn remove_record(&self, id: &Uuid) -> StorageResult<()> {
        let removed = self
            .records
            .write()
            .map_err(|_| StorageError::poisoned())?
            .remove(id);
        if removed.is_none() {
            return Err(StorageError::NotFound(*id));
        }

        let mut contents = self.contents.write().map_err(|_| StorageError::poisoned())?;
        contents.retain(|(owner, _), _| owner != id);
        Ok(())
    }

    fn load_records(&self) -> StorageResult<Vec<StoredRecord>> {
        let records = self.records.read().map_err(|_| StorageError::poisoned())?;
        let loaded = records
            .iter()
            .map(|(id, bytes)| StoredRecord::decode(bytes, &id.to_string()))
            .collect::<StorageResult<Vec<_>>>()?;

        let live: Vec<(Uuid, Uuid)> = loaded.iter().map(|r| (r.id(), r.version)).collect();
        drop(records);

        let mut contents = self.contents.write().map_err(|_| StorageError::poisoned())?;
        contents.retain(|key, _| live.contains(key));
        Ok(loaded)
    }
}
