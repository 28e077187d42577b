//! # Local Filesystem Backend
//!
//! Layout:
//!
//! ```text
//! <root>/.staging/<uuid>.tmp        content being streamed
//! <root>/<id>/<version>.content     published content versions
//! <root>/<id>/record.json           committed record (commit point)
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use super::backend::StorageBackend;
use super::errors::{StorageError, StorageResult};
use super::record::StoredRecord;

const RECORD_FILE: &str = "record.json";
const RECORD_TEMP_FILE: &str = "record.json.tmp";
const STAGING_DIR: &str = ".staging";
const CONTENT_EXTENSION: &str = "content";

fn io_error(context: impl AsRef<str>, path: &Path, e: io::Error) -> StorageError {
    StorageError::IoError(format!("{} {}: {}", context.as_ref(), path.display(), e))
}

/// fsync a directory so renames inside it are durable
fn fsync_dir(path: &Path) {
    if let Ok(dir) = File::open(path) {
        let _ = dir.sync_all();
    }
}

/// Local filesystem storage backend
#[derive(Debug)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Open a backend rooted at `root`, creating directories if needed
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        let staging = root.join(STAGING_DIR);
        fs::create_dir_all(&staging)
            .map_err(|e| io_error("Failed to create storage directory", &staging, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_dir(&self, id: &Uuid) -> PathBuf {
        self.root.join(id.to_string())
    }

    fn content_path(&self, id: &Uuid, version: &Uuid) -> PathBuf {
        self.record_dir(id)
            .join(format!("{}.{}", version, CONTENT_EXTENSION))
    }

    fn clear_staging(&self) -> StorageResult<()> {
        let staging = self.root.join(STAGING_DIR);
        let entries = fs::read_dir(&staging)
            .map_err(|e| io_error("Failed to read staging directory", &staging, e))?;

        for entry in entries.flatten() {
            let path = entry.path();
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "failed to remove leftover staging file");
            }
        }
        Ok(())
    }

    /// Load one record directory, pruning files the record does not reference
    fn load_record_dir(&self, id: &Uuid, dir: &Path) -> StorageResult<Option<StoredRecord>> {
        let record_path = dir.join(RECORD_FILE);

        if !record_path.exists() {
            // Content published but never committed
            debug!(id = %id, "removing uncommitted record directory");
            fs::remove_dir_all(dir)
                .map_err(|e| io_error("Failed to remove uncommitted directory", dir, e))?;
            return Ok(None);
        }

        let bytes = fs::read(&record_path)
            .map_err(|e| io_error("Failed to read record", &record_path, e))?;
        let record = StoredRecord::decode(&bytes, &record_path.display().to_string())?;

        if record.id() != *id {
            return Err(StorageError::Corrupted(
                record_path.display().to_string(),
                format!("record id {} stored under {}", record.id(), id),
            ));
        }

        let current = format!("{}.{}", record.version, CONTENT_EXTENSION);
        let entries = fs::read_dir(dir)
            .map_err(|e| io_error("Failed to read record directory", dir, e))?;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name == RECORD_FILE || name == current {
                continue;
            }
            if let Err(e) = fs::remove_file(entry.path()) {
                warn!(id = %id, file = %name, error = %e, "failed to prune stale file");
            }
        }

        if !dir.join(&current).exists() {
            return Err(StorageError::Corrupted(
                record_path.display().to_string(),
                format!("content version {} is missing", record.version),
            ));
        }

        Ok(Some(record))
    }
}

/// Content staged in a temp file
#[derive(Debug)]
pub struct LocalStaging {
    file: File,
    path: PathBuf,
    published: bool,
}

impl Write for LocalStaging {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Drop for LocalStaging {
    fn drop(&mut self) {
        if !self.published {
            let _ = fs::remove_file(&self.path);
        }
    }
}

impl StorageBackend for LocalBackend {
    type Staging = LocalStaging;
    type Reader = File;

    fn begin_staging(&self) -> StorageResult<LocalStaging> {
        let path = self
            .root
            .join(STAGING_DIR)
            .join(format!("{}.tmp", Uuid::new_v4()));

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| io_error("Failed to create staging file", &path, e))?;

        Ok(LocalStaging {
            file,
            path,
            published: false,
        })
    }

    fn publish_content(&self, mut staging: LocalStaging, id: &Uuid, version: &Uuid) -> StorageResult<()> {
        staging
            .file
            .flush()
            .and_then(|_| staging.file.sync_all())
            .map_err(|e| io_error("Failed to fsync staging file", &staging.path, e))?;

        let dir = self.record_dir(id);
        fs::create_dir_all(&dir)
            .map_err(|e| io_error("Failed to create record directory", &dir, e))?;

        let target = self.content_path(id, version);
        fs::rename(&staging.path, &target)
            .map_err(|e| io_error("Failed to publish content", &target, e))?;
        staging.published = true;

        fsync_dir(&dir);
        Ok(())
    }

    fn write_record(&self, record: &StoredRecord) -> StorageResult<()> {
        let dir = self.record_dir(&record.id());
        fs::create_dir_all(&dir)
            .map_err(|e| io_error("Failed to create record directory", &dir, e))?;

        let bytes = record.encode()?;
        let temp_path = dir.join(RECORD_TEMP_FILE);
        let final_path = dir.join(RECORD_FILE);

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| io_error("Failed to create temp record", &temp_path, e))?;

        file.write_all(&bytes)
            .and_then(|_| file.sync_all())
            .map_err(|e| io_error("Failed to write temp record", &temp_path, e))?;
        drop(file);

        // Commit point
        fs::rename(&temp_path, &final_path)
            .map_err(|e| io_error("Failed to commit record", &final_path, e))?;

        fsync_dir(&dir);
        Ok(())
    }

    fn open_content(&self, id: &Uuid, version: &Uuid) -> StorageResult<File> {
        let path = self.content_path(id, version);
        File::open(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                StorageError::NotFound(*id)
            } else {
                io_error("Failed to open content", &path, e)
            }
        })
    }

    fn remove_content(&self, id: &Uuid, version: &Uuid) -> StorageResult<()> {
        let path = self.content_path(id, version);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("Failed to remove content", &path, e)),
        }
    }

    fn remove_record(&self, id: &Uuid) -> StorageResult<()> {
        let dir = self.record_dir(id);
        let record_path = dir.join(RECORD_FILE);

        match fs::remove_file(&record_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(StorageError::NotFound(*id)),
            Err(e) => return Err(io_error("Failed to remove record", &record_path, e)),
        }
        fsync_dir(&dir);

        // Record is gone; leftovers are pruned on next load
        if let Err(e) = fs::remove_dir_all(&dir) {
            warn!(id = %id, error = %e, "failed to remove record directory");
        }
        Ok(())
    }

    fn load_records(&self) -> StorageResult<Vec<StoredRecord>> {
        self.clear_staging()?;

        let entries = fs::read_dir(&self.root)
            .map_err(|e| io_error("Failed to read storage directory", &self.root, e))?;

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error("Failed to read entry in", &self.root, e))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let id = match entry.file_name().to_str().and_then(|n| Uuid::parse_str(n).ok()) {
                Some(id) => id,
                None => continue, // staging and foreign directories
            };

            if let Some(record) = self.load_record_dir(&id, &path)? {
                records.push(record);
            }
        }

        Ok(records)
    }
}
