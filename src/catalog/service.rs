//! # Catalog Service
//!
//! Couples the file store with the fulltext index.
//!
//! Free-text queries run in two phases: the index resolves text to ranked
//! ids, then storage evaluates the query restricted to those ids under the
//! caller's policy. Index hits never reach the caller without passing
//! through storage, so a stale hit is dropped rather than served.
//!
//! Mutations commit to storage first and update the index afterwards. A
//! record is briefly unsearchable after insert (or still searchable after
//! delete) until the second step completes.
//!
//! Index updates share a gate that [`CatalogService::rebuild_index`] takes
//! exclusively, so an update either lands in the rebuild's storage snapshot
//! or is applied after the rebuilt index is swapped in.

use std::io::Read;
use std::slice;
use std::sync::{Arc, RwLock};

use tracing::{info, warn};
use uuid::Uuid;

use super::config::{CatalogConfig, IndexFailurePolicy};
use super::errors::{CatalogError, CatalogResult};
use crate::auth::{AccessPolicy, ServiceAccessPolicy};
use crate::file_storage::{
    evaluate::paginate, ContentStream, ContentWriter, FileMetadata, FileState, FileStorage,
    FileStorageGroupResponse, FileStorageOrderDefinition, FileStorageQuery, FileStorageResponse,
    FileType, LocalBackend, OrderProperty, StorageBackend,
};
use crate::fulltext::{FulltextError, FulltextIndex, FulltextResult};

#[derive(Debug)]
pub struct CatalogService<B: StorageBackend = LocalBackend> {
    storage: Arc<FileStorage<B>>,
    index: Arc<FulltextIndex>,
    index_failure_policy: IndexFailurePolicy,
    index_gate: RwLock<()>,
}

impl CatalogService<LocalBackend> {
    /// Open the store under `config.storage_path` and build its index
    pub fn open(config: &CatalogConfig) -> CatalogResult<Self> {
        config.validate()?;

        let storage = FileStorage::open_local(&config.storage_path)?;
        let index = FulltextIndex::with_limits(config.max_query_text_length, config.max_search_hits)?;
        let service = Self::new(Arc::new(storage), Arc::new(index), config.index_failure_policy);

        if config.rebuild_index_on_open {
            service.rebuild_index()?;
        }

        Ok(service)
    }
}

impl<B: StorageBackend> CatalogService<B> {
    /// Combine an opened store with an index; the index is not rebuilt
    pub fn new(
        storage: Arc<FileStorage<B>>,
        index: Arc<FulltextIndex>,
        index_failure_policy: IndexFailurePolicy,
    ) -> Self {
        Self {
            storage,
            index,
            index_failure_policy,
            index_gate: RwLock::new(()),
        }
    }

    /// Underlying file store
    pub fn storage(&self) -> &Arc<FileStorage<B>> {
        &self.storage
    }

    /// Fulltext index kept in step with storage
    pub fn index(&self) -> &Arc<FulltextIndex> {
        &self.index
    }

    // ==================
    // Reads
    // ==================

    /// Metadata and content descriptor of a readable record
    pub fn get_file_state(&self, id: Uuid, policy: &dyn AccessPolicy) -> CatalogResult<FileState> {
        Ok(self.storage.get_file_state(id, policy)?)
    }

    /// Metadata of a readable record
    pub fn get_metadata(&self, id: Uuid, policy: &dyn AccessPolicy) -> CatalogResult<FileMetadata> {
        Ok(self.storage.get_metadata(id, policy)?)
    }

    /// Stream the committed content of a readable record
    pub fn open_read_content(
        &self,
        id: Uuid,
        policy: &dyn AccessPolicy,
    ) -> CatalogResult<ContentStream<B::Reader>> {
        Ok(self.storage.open_read_content(id, policy)?)
    }

    /// Structured query with optional free text
    ///
    /// With text and no explicit ordering, results follow search relevance.
    pub fn query(&self, query: &FileStorageQuery, policy: &dyn AccessPolicy) -> CatalogResult<FileStorageResponse> {
        if query.text().is_none() {
            return Ok(self.storage.query(query, policy)?);
        }

        let mut ids = self.index.search(query)?.ids();
        if let Some(allowed) = query.only_ids.as_deref().filter(|ids| !ids.is_empty()) {
            ids.retain(|id| allowed.contains(id));
        }
        if ids.is_empty() {
            return Ok(FileStorageResponse::empty(query));
        }

        let mut resolved = query.clone();
        resolved.query_text = None;
        resolved.only_ids = Some(ids);
        if resolved.order_definitions.as_deref().map_or(true, |o| o.is_empty()) {
            resolved.order_definitions = Some(vec![FileStorageOrderDefinition::asc(OrderProperty::Relevance)]);
        }

        Ok(self.storage.query(&resolved, policy)?)
    }

    /// Publisher directory query
    ///
    /// Free text is matched against publisher registrations only; a group is
    /// kept when its registration is among the hits.
    pub fn query_grouped_by_publisher(
        &self,
        query: &FileStorageQuery,
        policy: &dyn AccessPolicy,
    ) -> CatalogResult<FileStorageGroupResponse> {
        if query.text().is_none() {
            return Ok(self.storage.query_grouped_by_publisher(query, policy)?);
        }

        let mut search = FileStorageQuery::new().with_types(vec![FileType::PublisherRegistration]);
        search.query_text = query.query_text.clone();
        let hits = self.index.search(&search)?;
        if hits.is_empty() {
            return Ok(FileStorageGroupResponse::default());
        }

        let mut unpaged = query.clone();
        unpaged.query_text = None;
        unpaged.skip_results = 0;
        unpaged.max_results = None;

        let mut groups = self.storage.query_grouped_by_publisher(&unpaged, policy)?.groups;
        groups.retain(|group| {
            group
                .publisher_file_state
                .as_ref()
                .is_some_and(|state| hits.contains(&state.id()))
        });

        let total_count = groups.len();
        let groups = paginate(groups, query.skip_results, query.max_results);
        Ok(FileStorageGroupResponse { groups, total_count })
    }

    // ==================
    // Mutations
    // ==================

    /// Store a file, then index it
    pub fn insert<R: Read>(
        &self,
        content: R,
        metadata: FileMetadata,
        allow_overwrite: bool,
        policy: &dyn AccessPolicy,
    ) -> CatalogResult<FileState> {
        let state = self.storage.insert(content, metadata, allow_overwrite, policy)?;
        self.after_write(&state)?;
        Ok(state)
    }

    /// Begin a streaming write; finish it with [`commit_write`](Self::commit_write)
    pub fn open_write_content<'a>(
        &'a self,
        metadata: FileMetadata,
        allow_overwrite: bool,
        policy: &'a dyn AccessPolicy,
    ) -> CatalogResult<ContentWriter<'a, B>> {
        Ok(self.storage.open_write_content(metadata, allow_overwrite, policy)?)
    }

    /// Commit a streaming write, then index it
    pub fn commit_write(&self, writer: ContentWriter<'_, B>) -> CatalogResult<FileState> {
        let state = writer.commit()?;
        self.after_write(&state)?;
        Ok(state)
    }

    /// Replace metadata while keeping content, then re-index
    pub fn update_metadata(&self, metadata: FileMetadata, policy: &dyn AccessPolicy) -> CatalogResult<FileState> {
        let state = self.storage.update_metadata(metadata, policy)?;
        self.after_write(&state)?;
        Ok(state)
    }

    /// Delete a record with its content, then drop it from the index
    pub fn delete(&self, id: Uuid, policy: &dyn AccessPolicy) -> CatalogResult<()> {
        self.storage.delete(id, policy)?;
        let outcome = self.gated(|| self.index.remove_from_index(id));
        self.settle_index(id, outcome)
    }

    fn after_write(&self, state: &FileState) -> CatalogResult<()> {
        let outcome = self.gated(|| self.index.index(slice::from_ref(state)));
        self.settle_index(state.id(), outcome)
    }

    fn gated(&self, update: impl FnOnce() -> FulltextResult<()>) -> FulltextResult<()> {
        let _gate = self.index_gate.read().map_err(|_| FulltextError::poisoned())?;
        update()
    }

    fn settle_index(&self, id: Uuid, outcome: Result<(), FulltextError>) -> CatalogResult<()> {
        match (outcome, self.index_failure_policy) {
            (Ok(()), _) => Ok(()),
            (Err(e), IndexFailurePolicy::BestEffort) => {
                warn!(id = %id, error = %e, "index update failed after commit");
                Ok(())
            }
            (Err(source), IndexFailurePolicy::Report) => Err(CatalogError::IndexFailed { id, source }),
        }
    }

    /// Replace the index with one built from every stored record
    pub fn rebuild_index(&self) -> CatalogResult<usize> {
        let _gate = self.index_gate.write().map_err(|_| FulltextError::poisoned())?;

        let all = self.storage.query(&FileStorageQuery::new(), &ServiceAccessPolicy)?;
        self.index.replace_all(&all.files)?;

        info!(documents = all.files.len(), "fulltext index rebuilt");
        Ok(all.files.len())
    }
}
