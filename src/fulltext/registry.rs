//! # Fulltext Index Registry
//!
//! One [`TypePartition`] per document type behind a single lock. The
//! registry is built once by the owner of the catalog and shared by
//! reference; there is no global instance.
//!
//! The index holds derived postings only. It can be replaced wholesale
//! from storage at any time without loss.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::debug;
use uuid::Uuid;

use super::errors::{FulltextError, FulltextResult};
use super::partition::TypePartition;
use super::response::{FulltextResponse, FulltextResponseDocument};
use super::tokenizer::Tokenizer;
use crate::file_storage::{FileState, FileStorageQuery, FileType};

pub const DEFAULT_MAX_QUERY_TEXT_LENGTH: usize = 1024;
pub const DEFAULT_MAX_SEARCH_HITS: usize = 10_000;

/// Per-type fulltext index
#[derive(Debug)]
pub struct FulltextIndex {
    partitions: RwLock<BTreeMap<FileType, TypePartition>>,
    tokenizer: Tokenizer,
    max_query_text_length: usize,
    max_hits: usize,
}

impl FulltextIndex {
    /// Index with the default limits
    pub fn new() -> FulltextResult<Self> {
        Self::with_limits(DEFAULT_MAX_QUERY_TEXT_LENGTH, DEFAULT_MAX_SEARCH_HITS)
    }

    /// Index with explicit bounds on query text (in characters) and returned hits
    pub fn with_limits(max_query_text_length: usize, max_hits: usize) -> FulltextResult<Self> {
        let partitions = FileType::ALL
            .iter()
            .map(|t| (*t, TypePartition::new()))
            .collect();

        Ok(Self {
            partitions: RwLock::new(partitions),
            tokenizer: Tokenizer::new()?,
            max_query_text_length,
            max_hits,
        })
    }

    /// Upsert each state into the partition of its type
    ///
    /// Re-indexing an id replaces its prior postings, including when the
    /// record changed type.
    pub fn index(&self, states: &[FileState]) -> FulltextResult<()> {
        let mut partitions = self.partitions.write().map_err(|_| FulltextError::poisoned())?;

        for state in states {
            let metadata = &state.metadata;
            for partition in partitions.values_mut() {
                partition.remove(&metadata.id);
            }
            partitions
                .entry(metadata.file_type)
                .or_default()
                .upsert(metadata, &self.tokenizer);
        }

        debug!(documents = states.len(), "documents indexed");
        Ok(())
    }

    /// Remove `id` from every partition
    pub fn remove_from_index(&self, id: Uuid) -> FulltextResult<()> {
        let mut partitions = self.partitions.write().map_err(|_| FulltextError::poisoned())?;
        let removed = partitions
            .values_mut()
            .fold(false, |removed, partition| partition.remove(&id) || removed);

        debug!(id = %id, removed, "document removed from index");
        Ok(())
    }

    /// Ranked ids matching `query.query_text` within the requested types
    ///
    /// Blank text (or text without word characters) matches nothing.
    pub fn search(&self, query: &FileStorageQuery) -> FulltextResult<FulltextResponse> {
        let Some(text) = query.text() else {
            return Ok(FulltextResponse::default());
        };

        if text.chars().count() > self.max_query_text_length {
            return Err(FulltextError::BadRequest(format!(
                "Query text exceeds {} characters",
                self.max_query_text_length
            )));
        }

        let tokens = self.tokenizer.query_tokens(text);
        if tokens.is_empty() {
            return Ok(FulltextResponse::default());
        }

        let partitions = self.partitions.read().map_err(|_| FulltextError::poisoned())?;
        let mut documents: Vec<FulltextResponseDocument> = partitions
            .iter()
            .filter(|(file_type, _)| query.type_filter().map_or(true, |types| types.contains(*file_type)))
            .flat_map(|(_, partition)| partition.search(&tokens))
            .map(|(id, score)| FulltextResponseDocument { id, score })
            .collect();
        drop(partitions);

        documents.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        let total_count = documents.len();
        documents.truncate(self.max_hits);

        debug!(tokens = tokens.len(), total = total_count, "fulltext search evaluated");

        Ok(FulltextResponse {
            documents,
            total_count,
        })
    }

    /// Swap in an index built from `states` alone
    ///
    /// The new postings are built off to the side, so readers see either the
    /// previous index or the complete new one.
    pub fn replace_all(&self, states: &[FileState]) -> FulltextResult<()> {
        let mut fresh: BTreeMap<FileType, TypePartition> = FileType::ALL
            .iter()
            .map(|t| (*t, TypePartition::new()))
            .collect();
        for state in states {
            for partition in fresh.values_mut() {
                partition.remove(&state.metadata.id);
            }
            fresh
                .entry(state.metadata.file_type)
                .or_default()
                .upsert(&state.metadata, &self.tokenizer);
        }

        let mut partitions = self.partitions.write().map_err(|_| FulltextError::poisoned())?;
        *partitions = fresh;

        debug!(documents = states.len(), "index replaced");
        Ok(())
    }

    /// Number of indexed documents across all partitions
    pub fn len(&self) -> FulltextResult<usize> {
        let partitions = self.partitions.read().map_err(|_| FulltextError::poisoned())?;
        Ok(partitions.values().map(TypePartition::len).sum())
    }

    /// Whether no document is indexed
    pub fn is_empty(&self) -> FulltextResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_storage::{ContentInfo, FileMetadata};

    fn state(name: &str, file_type: FileType) -> FileState {
        let metadata = FileMetadata::new(Uuid::new_v4(), name, file_type)
            .with_publisher("P1")
            .public(true);
        FileState::new(metadata, ContentInfo::for_bytes(b""))
    }

    #[test]
    fn test_index_search_remove_round_trip() {
        let index = FulltextIndex::new().unwrap();
        let s = state("Public transport timetables", FileType::DatasetRegistration);
        index.index(&[s.clone()]).unwrap();

        let hits = index.search(&FileStorageQuery::new().with_text("transport")).unwrap();
        assert!(hits.contains(&s.id()));

        index.remove_from_index(s.id()).unwrap();
        let hits = index.search(&FileStorageQuery::new().with_text("transport")).unwrap();
        assert!(!hits.contains(&s.id()));
        assert!(index.is_empty().unwrap());
    }

    #[test]
    fn test_empty_text_matches_nothing() {
        let index = FulltextIndex::new().unwrap();
        index.index(&[state("Anything", FileType::DatasetRegistration)]).unwrap();

        for text in ["", "   ", "?!"] {
            let hits = index.search(&FileStorageQuery::new().with_text(text)).unwrap();
            assert!(hits.is_empty());
            assert_eq!(hits.total_count, 0);
        }
        assert!(index.search(&FileStorageQuery::new()).unwrap().is_empty());
    }

    #[test]
    fn test_type_partitions_do_not_compete() {
        let index = FulltextIndex::new().unwrap();
        let dataset = state("Ministry of Health budget", FileType::DatasetRegistration);
        let publisher = state("Ministry of Health", FileType::PublisherRegistration);
        index.index(&[dataset.clone(), publisher.clone()]).unwrap();

        let query = FileStorageQuery::new()
            .with_text("ministry")
            .with_types(vec![FileType::PublisherRegistration]);
        let hits = index.search(&query).unwrap();
        assert_eq!(hits.ids(), vec![publisher.id()]);

        let all = index.search(&FileStorageQuery::new().with_text("ministry")).unwrap();
        assert_eq!(all.total_count, 2);
    }

    #[test]
    fn test_reindex_moves_between_partitions() {
        let index = FulltextIndex::new().unwrap();
        let mut s = state("Registry", FileType::DatasetRegistration);
        index.index(&[s.clone()]).unwrap();

        s.metadata.file_type = FileType::LocalCatalogRegistration;
        index.index(&[s.clone()]).unwrap();

        assert_eq!(index.len().unwrap(), 1);
        let query = FileStorageQuery::new()
            .with_text("registry")
            .with_types(vec![FileType::DatasetRegistration]);
        assert!(index.search(&query).unwrap().is_empty());
    }

    #[test]
    fn test_ranked_by_score_then_id() {
        let index = FulltextIndex::new().unwrap();
        let strong = state("Water water", FileType::DatasetRegistration);
        let weak_a = state("Waterways", FileType::DatasetRegistration);
        let weak_b = state("Waterways", FileType::DatasetRegistration);
        index.index(&[weak_a.clone(), strong.clone(), weak_b.clone()]).unwrap();

        let hits = index.search(&FileStorageQuery::new().with_text("water")).unwrap();
        assert_eq!(hits.documents[0].id, strong.id());
        let tail: Vec<Uuid> = hits.ids()[1..].to_vec();
        let mut sorted = tail.clone();
        sorted.sort();
        assert_eq!(tail, sorted);
    }

    #[test]
    fn test_limits() {
        let index = FulltextIndex::with_limits(8, 1).unwrap();
        index
            .index(&[
                state("Forest map", FileType::DatasetRegistration),
                state("Forest census", FileType::DatasetRegistration),
            ])
            .unwrap();

        let hits = index.search(&FileStorageQuery::new().with_text("forest")).unwrap();
        assert_eq!(hits.documents.len(), 1);
        assert_eq!(hits.total_count, 2);

        let result = index.search(&FileStorageQuery::new().with_text("much too long"));
        assert!(matches!(result, Err(FulltextError::BadRequest(_))));
    }

    #[test]
    fn test_replace_all_drops_absent_documents() {
        let index = FulltextIndex::new().unwrap();
        let kept = state("Bridges", FileType::DatasetRegistration);
        let dropped = state("Bridge tolls", FileType::PublisherRegistration);
        index.index(&[kept.clone(), dropped.clone()]).unwrap();

        index.replace_all(&[kept.clone()]).unwrap();

        assert_eq!(index.len().unwrap(), 1);
        let hits = index.search(&FileStorageQuery::new().with_text("bridge")).unwrap();
        assert_eq!(hits.ids(), vec![kept.id()]);

        index.replace_all(&[]).unwrap();
        assert!(index.is_empty().unwrap());
    }
}
