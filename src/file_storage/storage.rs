//! # File Storage Engine
//!
//! Owns durable content and metadata. Every operation is gated by the
//! caller's [`AccessPolicy`]; records the caller may not read behave as
//! absent.
//!
//! Committed records are held in memory as immutable `Arc<StoredRecord>`
//! values. A mutation publishes its content version, writes the record (the
//! commit point) and only then swaps the in-memory entry, so readers observe
//! either the previous or the new version, never a mix. Queries evaluate over
//! a snapshot of the entry map taken at the start of the call.

use std::collections::{BTreeMap, HashMap};
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::backend::StorageBackend;
use super::errors::{StorageError, StorageResult};
use super::evaluate::{compare_names, is_publisher_registration, paginate, QueryEvaluator};
use super::local::LocalBackend;
use super::locks::IdLocks;
use super::metadata::{ContentInfo, FileMetadata, FileState};
use super::query::{
    FileStorageGroup, FileStorageGroupResponse, FileStorageQuery, FileStorageResponse,
    OrderProperty,
};
use super::record::StoredRecord;
use super::stream::{ContentStream, ContentWriter};
use crate::auth::AccessPolicy;

type Snapshot = Vec<Arc<StoredRecord>>;

/// Storage engine over a backend
#[derive(Debug)]
pub struct FileStorage<B: StorageBackend = LocalBackend> {
    backend: B,
    entries: RwLock<HashMap<Uuid, Arc<StoredRecord>>>,
    locks: IdLocks,
}

impl FileStorage<LocalBackend> {
    /// Open (or create) a store in a local directory
    pub fn open_local(root: impl Into<PathBuf>) -> StorageResult<Self> {
        Self::open(LocalBackend::open(root)?)
    }
}

impl<B: StorageBackend> FileStorage<B> {
    /// Open a store, loading every committed record from the backend
    pub fn open(backend: B) -> StorageResult<Self> {
        let records = backend.load_records()?;
        let entries: HashMap<Uuid, Arc<StoredRecord>> = records
            .into_iter()
            .map(|record| (record.id(), Arc::new(record)))
            .collect();

        info!(records = entries.len(), "file storage opened");

        Ok(Self {
            backend,
            entries: RwLock::new(entries),
            locks: IdLocks::new(),
        })
    }

    /// Backend holding records and content versions
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Number of committed records, regardless of visibility
    pub fn len(&self) -> StorageResult<usize> {
        let entries = self.entries.read().map_err(|_| StorageError::poisoned())?;
        Ok(entries.len())
    }

    /// Whether no record is committed
    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    fn snapshot(&self) -> StorageResult<Snapshot> {
        let entries = self.entries.read().map_err(|_| StorageError::poisoned())?;
        Ok(entries.values().cloned().collect())
    }

    fn entry(&self, id: &Uuid) -> StorageResult<Option<Arc<StoredRecord>>> {
        let entries = self.entries.read().map_err(|_| StorageError::poisoned())?;
        Ok(entries.get(id).cloned())
    }

    /// Entry the caller may read; invisible records are reported as absent
    fn visible_entry(&self, id: Uuid, policy: &dyn AccessPolicy) -> StorageResult<Arc<StoredRecord>> {
        self.entry(&id)?
            .filter(|record| policy.has_read_access(&record.metadata))
            .ok_or(StorageError::NotFound(id))
    }

    /// Metadata and content descriptor of a readable record
    pub fn get_file_state(&self, id: Uuid, policy: &dyn AccessPolicy) -> StorageResult<FileState> {
        Ok(self.visible_entry(id, policy)?.to_state())
    }

    /// Metadata of a readable record
    pub fn get_metadata(&self, id: Uuid, policy: &dyn AccessPolicy) -> StorageResult<FileMetadata> {
        Ok(self.visible_entry(id, policy)?.metadata.clone())
    }

    /// Open the committed content of `id` for reading
    pub fn open_read_content(
        &self,
        id: Uuid,
        policy: &dyn AccessPolicy,
    ) -> StorageResult<ContentStream<B::Reader>> {
        // Shared lock keeps the version from being pruned between lookup and open
        let lease = self.locks.lease(id)?;
        let _guard = lease.read()?;

        let record = self.visible_entry(id, policy)?;
        let reader = self.backend.open_content(&id, &record.version)?;
        Ok(ContentStream::new(reader, record.content.clone()))
    }

    /// Filter, facet, order and page the records visible to the caller
    ///
    /// `query_text` is not evaluated here; free text is resolved to ids
    /// through the fulltext index before the query reaches storage.
    pub fn query(&self, query: &FileStorageQuery, policy: &dyn AccessPolicy) -> StorageResult<FileStorageResponse> {
        let snapshot = self.snapshot()?;
        let evaluator = QueryEvaluator::new(query);

        let mut matched: Snapshot = snapshot
            .iter()
            .filter(|r| policy.has_read_access(&r.metadata) && evaluator.matches(&r.metadata))
            .cloned()
            .collect();

        let total_count = matched.len();
        let facets = evaluator.facets(matched.iter().map(|r| &r.metadata));

        evaluator.sort(&mut matched, |r| &r.metadata);
        let page = paginate(matched, query.skip_results, query.max_results);

        let files = if query.include_dependent_files {
            let children = Self::children_by_parent(&snapshot, policy);
            page.iter()
                .map(|record| {
                    let mut state = record.to_state();
                    if let Some(dependents) = children.get(&record.id()) {
                        state.dependent_files = dependents.iter().map(|c| c.to_state()).collect();
                    }
                    state
                })
                .collect()
        } else {
            page.iter().map(|record| record.to_state()).collect()
        };

        debug!(total = total_count, returned = page.len(), "storage query evaluated");

        Ok(FileStorageResponse {
            files,
            total_count,
            facets,
        })
    }

    /// Readable records keyed by their parent, each list ordered by id
    fn children_by_parent<'s>(
        snapshot: &'s Snapshot,
        policy: &dyn AccessPolicy,
    ) -> HashMap<Uuid, Vec<&'s Arc<StoredRecord>>> {
        let mut children: HashMap<Uuid, Vec<&Arc<StoredRecord>>> = HashMap::new();
        for record in snapshot {
            if let Some(parent) = record.metadata.parent_file {
                if policy.has_read_access(&record.metadata) {
                    children.entry(parent).or_default().push(record);
                }
            }
        }
        for list in children.values_mut() {
            list.sort_by_key(|r| r.id());
        }
        children
    }

    /// Same filters as [`query`](Self::query), grouped by publisher
    ///
    /// One group per publisher with at least one matching record. The group
    /// carries the publisher's registration when it exists and is readable.
    pub fn query_grouped_by_publisher(
        &self,
        query: &FileStorageQuery,
        policy: &dyn AccessPolicy,
    ) -> StorageResult<FileStorageGroupResponse> {
        let snapshot = self.snapshot()?;
        let evaluator = QueryEvaluator::new(query);

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        let mut registrations: HashMap<&str, &Arc<StoredRecord>> = HashMap::new();

        for record in &snapshot {
            let metadata = &record.metadata;
            if !policy.has_read_access(metadata) {
                continue;
            }

            if let Some(publisher) = metadata.publisher.as_deref() {
                if evaluator.matches(metadata) {
                    *counts.entry(publisher).or_insert(0) += 1;
                }

                if is_publisher_registration(metadata) {
                    // Lowest id wins when a publisher is registered twice
                    registrations
                        .entry(publisher)
                        .and_modify(|current| {
                            if record.id() < current.id() {
                                *current = record;
                            }
                        })
                        .or_insert(record);
                }
            }
        }

        let mut groups: Vec<FileStorageGroup> = counts
            .into_iter()
            .map(|(publisher, count)| FileStorageGroup {
                publisher_id: publisher.to_string(),
                publisher_file_state: registrations.get(publisher).map(|r| r.to_state()),
                count,
            })
            .collect();

        sort_groups(&mut groups, query);

        let total_count = groups.len();
        let groups = paginate(groups, query.skip_results, query.max_results);

        debug!(total = total_count, "grouped storage query evaluated");

        Ok(FileStorageGroupResponse { groups, total_count })
    }

    /// Write-side checks shared by the pre-stream check and the commit.
    /// Returns the record being replaced, if any.
    fn check_insert(
        &self,
        metadata: &FileMetadata,
        allow_overwrite: bool,
        policy: &dyn AccessPolicy,
    ) -> StorageResult<Option<Arc<StoredRecord>>> {
        if policy.is_read_only() || !policy.has_write_access(metadata) {
            return Err(StorageError::Unauthorized);
        }
        metadata.validate()?;

        match self.entry(&metadata.id)? {
            Some(existing) => {
                if !policy.has_write_access(&existing.metadata) {
                    return Err(StorageError::Unauthorized);
                }
                if !allow_overwrite {
                    return Err(StorageError::Conflict(metadata.id));
                }
                Ok(Some(existing))
            }
            None => Ok(None),
        }
    }

    /// Store content and metadata as one atomic step
    pub fn insert<R: Read>(
        &self,
        mut content: R,
        metadata: FileMetadata,
        allow_overwrite: bool,
        policy: &dyn AccessPolicy,
    ) -> StorageResult<FileState> {
        let mut writer = self.open_write_content(metadata, allow_overwrite, policy)?;
        io::copy(&mut content, &mut writer)
            .map_err(|e| StorageError::IoError(format!("Failed to stage content: {}", e)))?;
        writer.commit()
    }

    /// Streaming variant of [`insert`](Self::insert)
    ///
    /// Fails before any byte is accepted when the caller may not write or
    /// the id exists and overwrite is disabled.
    pub fn open_write_content<'a>(
        &'a self,
        metadata: FileMetadata,
        allow_overwrite: bool,
        policy: &'a dyn AccessPolicy,
    ) -> StorageResult<ContentWriter<'a, B>> {
        self.check_insert(&metadata, allow_overwrite, policy)?;
        let staging = self.backend.begin_staging()?;
        Ok(ContentWriter::new(self, policy, metadata, allow_overwrite, staging))
    }

    pub(crate) fn commit_staged(
        &self,
        staging: B::Staging,
        content: ContentInfo,
        mut metadata: FileMetadata,
        allow_overwrite: bool,
        policy: &dyn AccessPolicy,
    ) -> StorageResult<FileState> {
        let id = metadata.id;
        let lease = self.locks.lease(id)?;
        let _guard = lease.write()?;

        // The record may have changed while the content was streaming
        let previous = self.check_insert(&metadata, allow_overwrite, policy)?;

        let now = Utc::now();
        metadata.created = previous.as_ref().map(|p| p.metadata.created).unwrap_or(now);
        metadata.last_modified = now;

        let version = Uuid::new_v4();
        self.backend.publish_content(staging, &id, &version)?;

        let record = StoredRecord::new(metadata, content, version);
        if let Err(e) = self.backend.write_record(&record) {
            if let Err(cleanup) = self.backend.remove_content(&id, &version) {
                warn!(id = %id, error = %cleanup, "failed to remove uncommitted content version");
            }
            return Err(e);
        }

        let state = record.to_state();
        self.entries
            .write()
            .map_err(|_| StorageError::poisoned())?
            .insert(id, Arc::new(record));

        if let Some(previous) = previous {
            if let Err(e) = self.backend.remove_content(&id, &previous.version) {
                warn!(id = %id, error = %e, "failed to remove previous content version");
            }
        }

        info!(id = %id, size = state.content.size, overwrite = allow_overwrite, "file committed");
        Ok(state)
    }

    /// Replace metadata only; content is untouched
    ///
    /// The caller must be able to write both the stored record and the
    /// replacement, so ownership cannot be handed to a foreign publisher.
    pub fn update_metadata(&self, mut metadata: FileMetadata, policy: &dyn AccessPolicy) -> StorageResult<FileState> {
        if policy.is_read_only() {
            return Err(StorageError::Unauthorized);
        }
        metadata.validate()?;

        let id = metadata.id;
        let lease = self.locks.lease(id)?;
        let _guard = lease.write()?;

        let existing = self.visible_entry(id, policy)?;
        if !policy.has_write_access(&existing.metadata) || !policy.has_write_access(&metadata) {
            return Err(StorageError::Unauthorized);
        }

        metadata.created = existing.metadata.created;
        metadata.last_modified = Utc::now();

        let record = StoredRecord::new(metadata, existing.content.clone(), existing.version);
        self.backend.write_record(&record)?;

        let state = record.to_state();
        self.entries
            .write()
            .map_err(|_| StorageError::poisoned())?
            .insert(id, Arc::new(record));

        info!(id = %id, "metadata updated");
        Ok(state)
    }

    /// Remove metadata and content of `id`
    pub fn delete(&self, id: Uuid, policy: &dyn AccessPolicy) -> StorageResult<()> {
        if policy.is_read_only() {
            return Err(StorageError::Unauthorized);
        }

        let lease = self.locks.lease(id)?;
        let _guard = lease.write()?;

        let existing = self.visible_entry(id, policy)?;
        if !policy.has_write_access(&existing.metadata) {
            return Err(StorageError::Unauthorized);
        }

        self.backend.remove_record(&id)?;
        self.entries
            .write()
            .map_err(|_| StorageError::poisoned())?
            .remove(&id);

        info!(id = %id, "file deleted");
        Ok(())
    }
}

fn sort_groups(groups: &mut [FileStorageGroup], query: &FileStorageQuery) {
    let by_name = query
        .order_definitions
        .as_deref()
        .unwrap_or_default()
        .iter()
        .find(|d| d.property == OrderProperty::Name);

    match by_name {
        Some(definition) => groups.sort_by(|a, b| {
            let name = |g: &FileStorageGroup| {
                g.publisher_file_state
                    .as_ref()
                    .map(|s| s.metadata.name.clone())
                    .unwrap_or_default()
            };
            let ordering = compare_names(&name(a), &name(b));
            let ordering = if definition.reverse_order {
                ordering.reverse()
            } else {
                ordering
            };
            ordering.then_with(|| a.publisher_id.cmp(&b.publisher_id))
        }),
        None => groups.sort_by(|a, b| a.publisher_id.cmp(&b.publisher_id)),
    }
}
