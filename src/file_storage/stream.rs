//! # Content Streams
//!
//! Scoped readers and writers over stored content. Both release their
//! underlying handles on every exit path through `Drop`.

use std::io::{self, Read, Write};

use sha2::{Digest, Sha256};

use super::backend::StorageBackend;
use super::errors::{StorageError, StorageResult};
use super::metadata::{ContentInfo, FileMetadata, FileState};
use super::storage::FileStorage;
use crate::auth::AccessPolicy;

/// Reader over one committed content version
#[derive(Debug)]
pub struct ContentStream<R: Read> {
    inner: R,
    content: ContentInfo,
}

impl<R: Read> ContentStream<R> {
    pub(crate) fn new(inner: R, content: ContentInfo) -> Self {
        Self { inner, content }
    }

    /// Descriptor of the version being read
    pub fn content(&self) -> &ContentInfo {
        &self.content
    }

    pub fn size(&self) -> u64 {
        self.content.size
    }

    /// Read the remaining bytes as UTF-8
    pub fn read_to_text(mut self) -> StorageResult<String> {
        let mut text = String::new();
        self.inner.read_to_string(&mut text)?;
        Ok(text)
    }
}

impl<R: Read> Read for ContentStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Streaming insert that commits on `commit()`
///
/// Authorization and conflict checks have already passed when the writer is
/// handed out and are repeated under the record lock at commit. Dropping the
/// writer without committing discards the staged bytes and leaves the prior
/// version (or absence) untouched.
pub struct ContentWriter<'a, B: StorageBackend> {
    storage: &'a FileStorage<B>,
    policy: &'a dyn AccessPolicy,
    metadata: FileMetadata,
    allow_overwrite: bool,
    staging: B::Staging,
    hasher: Sha256,
    size: u64,
}

impl<'a, B: StorageBackend> ContentWriter<'a, B> {
    pub(crate) fn new(
        storage: &'a FileStorage<B>,
        policy: &'a dyn AccessPolicy,
        metadata: FileMetadata,
        allow_overwrite: bool,
        staging: B::Staging,
    ) -> Self {
        Self {
            storage,
            policy,
            metadata,
            allow_overwrite,
            staging,
            hasher: Sha256::new(),
            size: 0,
        }
    }

    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    /// Bytes accepted so far
    pub fn written(&self) -> u64 {
        self.size
    }

    /// Publish the staged bytes and commit the record atomically
    pub fn commit(mut self) -> StorageResult<FileState> {
        self.staging
            .flush()
            .map_err(|e| StorageError::IoError(format!("Failed to flush content: {}", e)))?;

        let content = ContentInfo {
            size: self.size,
            checksum: format!("{:x}", self.hasher.finalize()),
        };

        self.storage.commit_staged(
            self.staging,
            content,
            self.metadata,
            self.allow_overwrite,
            self.policy,
        )
    }
}

impl<B: StorageBackend> Write for ContentWriter<'_, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.staging.write(buf)?;
        self.hasher.update(&buf[..written]);
        self.size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.staging.flush()
    }
}
