//! File Storage Property Tests
//!
//! End-to-end behavior of the storage engine through its public API:
//! - Round trip of content and metadata
//! - Exactly one winner among racing non-overwrite inserts
//! - Totals independent of pagination, facet sums bounded by totals
//! - Visibility of non-public records
//! - Durability across reopen and failed commits

use std::collections::HashSet;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Barrier;
use std::thread;

use catalog_store::auth::{CallerContext, DefaultAccessPolicy, ServiceAccessPolicy};
use catalog_store::file_storage::{
    dimensions, ContentInfo, FileMetadata, FileStorage, FileStorageOrderDefinition,
    FileStorageQuery, FileType, MemoryBackend, OrderProperty, StorageBackend, StorageError,
    StorageResult, StoredRecord,
};
use tempfile::TempDir;
use uuid::Uuid;

// =============================================================================
// Test Utilities
// =============================================================================

fn publisher(p: &str) -> DefaultAccessPolicy {
    DefaultAccessPolicy::new(CallerContext::publisher(format!("member-of-{}", p), p))
}

fn admin() -> DefaultAccessPolicy {
    DefaultAccessPolicy::new(CallerContext::superadmin("admin"))
}

fn dataset(name: &str, p: &str, is_public: bool) -> FileMetadata {
    FileMetadata::new(Uuid::new_v4(), name, FileType::DatasetRegistration)
        .with_publisher(p)
        .public(is_public)
}

fn create_temp_store() -> (TempDir, FileStorage) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let storage = FileStorage::open_local(dir.path().join("store")).expect("Failed to open store");
    (dir, storage)
}

/// Memory backend that can be told to fail record writes
#[derive(Debug, Default)]
struct FlakyBackend {
    inner: MemoryBackend,
    fail_record_writes: AtomicBool,
}

impl StorageBackend for FlakyBackend {
    type Staging = <MemoryBackend as StorageBackend>::Staging;
    type Reader = <MemoryBackend as StorageBackend>::Reader;

    fn begin_staging(&self) -> StorageResult<Self::Staging> {
        self.inner.begin_staging()
    }

    fn publish_content(&self, staging: Self::Staging, id: &Uuid, version: &Uuid) -> StorageResult<()> {
        self.inner.publish_content(staging, id, version)
    }

    fn write_record(&self, record: &StoredRecord) -> StorageResult<()> {
        if self.fail_record_writes.load(Ordering::SeqCst) {
            return Err(StorageError::IoError("injected record write failure".into()));
        }
        self.inner.write_record(record)
    }

    fn open_content(&self, id: &Uuid, version: &Uuid) -> StorageResult<Self::Reader> {
        self.inner.open_content(id, version)
    }

    fn remove_content(&self, id: &Uuid, version: &Uuid) -> StorageResult<()> {
        self.inner.remove_content(id, version)
    }

    fn remove_record(&self, id: &Uuid) -> StorageResult<()> {
        self.inner.remove_record(id)
    }

    fn load_records(&self) -> StorageResult<Vec<StoredRecord>> {
        self.inner.load_records()
    }
}

// =============================================================================
// Round Trip
// =============================================================================

/// Content and metadata read back exactly as inserted.
#[test]
fn test_insert_get_round_trip_on_disk() {
    let (_dir, storage) = create_temp_store();
    let policy = publisher("P1");

    let mut metadata = dataset("Noise map", "P1", false);
    metadata.description = Some("Road noise levels".into());
    metadata.keywords = vec!["noise".into(), "traffic".into()];
    metadata.additional_values.insert("license".into(), vec!["cc-by".into()]);
    let body = b"@prefix dcat: <http://www.w3.org/ns/dcat#> .".to_vec();

    storage.insert(&body[..], metadata.clone(), false, &policy).unwrap();

    let state = storage.get_file_state(metadata.id, &policy).unwrap();
    assert_eq!(state.metadata.name, metadata.name);
    assert_eq!(state.metadata.description, metadata.description);
    assert_eq!(state.metadata.keywords, metadata.keywords);
    assert_eq!(state.metadata.additional_values, metadata.additional_values);
    assert_eq!(state.content, ContentInfo::for_bytes(&body));

    let mut stream = storage.open_read_content(metadata.id, &policy).unwrap();
    assert_eq!(stream.size(), body.len() as u64);
    let mut read_back = Vec::new();
    std::io::Read::read_to_end(&mut stream, &mut read_back).unwrap();
    assert_eq!(read_back, body);
}

// =============================================================================
// Concurrency
// =============================================================================

/// Racing non-overwrite inserts of one new id: one success, the rest Conflict.
#[test]
fn test_concurrent_inserts_single_winner() {
    let (_dir, storage) = create_temp_store();
    let policy = publisher("P1");
    let metadata = dataset("Contested", "P1", true);
    let writers = 8;
    let barrier = Barrier::new(writers);

    let results: Vec<Result<_, StorageError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..writers)
            .map(|i| {
                let storage = &storage;
                let policy = &policy;
                let barrier = &barrier;
                let metadata = metadata.clone();
                scope.spawn(move || {
                    let body = format!("writer {}", i);
                    barrier.wait();
                    storage.insert(body.as_bytes(), metadata, false, policy)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(StorageError::Conflict(_))))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(conflicts, writers - 1);

    let winner = results.into_iter().find_map(Result::ok).unwrap();
    let text = storage.open_read_content(metadata.id, &policy).unwrap().read_to_text().unwrap();
    assert_eq!(ContentInfo::for_bytes(text.as_bytes()), winner.content);
}

/// Readers racing overwrites see a complete version every time.
#[test]
fn test_reads_never_observe_partial_overwrite() {
    let (_dir, storage) = create_temp_store();
    let policy = publisher("P1");
    let metadata = dataset("Flipping", "P1", true);
    let versions: Vec<String> = (0..20).map(|i| format!("version-{:02}-", i).repeat(64)).collect();
    storage.insert(versions[0].as_bytes(), metadata.clone(), false, &policy).unwrap();

    thread::scope(|scope| {
        scope.spawn(|| {
            for body in &versions[1..] {
                storage.insert(body.as_bytes(), metadata.clone(), true, &policy).unwrap();
            }
        });

        for _ in 0..2 {
            scope.spawn(|| {
                for _ in 0..50 {
                    let state = storage.get_file_state(metadata.id, &policy).unwrap();
                    assert!(versions.iter().any(|v| ContentInfo::for_bytes(v.as_bytes()) == state.content));

                    let text = storage.open_read_content(metadata.id, &policy).unwrap().read_to_text().unwrap();
                    assert!(versions.contains(&text));
                }
            });
        }
    });
}

/// Writes on distinct ids proceed in parallel and all land.
#[test]
fn test_parallel_writes_on_distinct_ids() {
    let (_dir, storage) = create_temp_store();
    let policy = admin();

    thread::scope(|scope| {
        for t in 0..4 {
            let storage = &storage;
            let policy = &policy;
            scope.spawn(move || {
                for i in 0..10 {
                    let metadata = dataset(&format!("t{}-{}", t, i), "P1", true);
                    storage.insert(&b"x"[..], metadata, false, policy).unwrap();
                }
            });
        }
    });

    assert_eq!(storage.len().unwrap(), 40);
}

// =============================================================================
// Query Totals and Facets
// =============================================================================

/// TotalCount counts every visible record, whatever the page.
#[test]
fn test_total_count_independent_of_pagination() {
    let (_dir, storage) = create_temp_store();
    for i in 0..6 {
        storage.insert(&b"x"[..], dataset(&format!("pub-{}", i), "P1", true), false, &admin()).unwrap();
    }
    for i in 0..3 {
        storage.insert(&b"x"[..], dataset(&format!("own-{}", i), "P2", false), false, &admin()).unwrap();
    }

    let anonymous = DefaultAccessPolicy::anonymous();
    let owner = publisher("P2");
    for (policy, visible) in [(&anonymous, 6usize), (&owner, 9), (&admin(), 9)] {
        for (skip, max) in [(0, 1), (2, 3), (5, 100), (100, 10)] {
            let response = storage.query(&FileStorageQuery::new().page(skip, max), policy).unwrap();
            assert_eq!(response.total_count, visible);
            assert_eq!(response.files.len(), visible.saturating_sub(skip).min(max));
        }
    }
}

/// Repeated paging over an unchanged store yields each record exactly once.
#[test]
fn test_pagination_is_deterministic() {
    let (_dir, storage) = create_temp_store();
    for _ in 0..7 {
        storage.insert(&b"x"[..], dataset("Same name", "P1", true), false, &admin()).unwrap();
    }

    let order = FileStorageOrderDefinition::asc(OrderProperty::Name);
    let mut seen = HashSet::new();
    for skip in (0..7).step_by(2) {
        let query = FileStorageQuery::new().with_order(order.clone()).page(skip, 2);
        for state in storage.query(&query, &admin()).unwrap().files {
            assert!(seen.insert(state.id()));
        }
    }
    assert_eq!(seen.len(), 7);
}

/// Facet values sum to at most TotalCount, exactly for single-valued dimensions.
#[test]
fn test_facet_sums_bounded_by_total() {
    let (_dir, storage) = create_temp_store();
    let themes = [vec!["env"], vec!["env", "health"], vec![], vec!["transport"]];
    for (i, theme_list) in themes.iter().enumerate() {
        let mut metadata = dataset(&format!("d{}", i), if i % 2 == 0 { "P1" } else { "P2" }, true);
        metadata.themes = theme_list.iter().map(|t| t.to_string()).collect();
        storage.insert(&b"x"[..], metadata, false, &admin()).unwrap();
    }
    let registration = FileMetadata::new(Uuid::new_v4(), "Publisher one", FileType::PublisherRegistration)
        .with_publisher("P1")
        .public(true);
    storage.insert(&b"x"[..], registration, false, &admin()).unwrap();

    let query = FileStorageQuery::new()
        .with_types(vec![FileType::DatasetRegistration])
        .with_facets(&[dimensions::PUBLISHERS, dimensions::TYPES, dimensions::THEMES, "license"]);
    let response = storage.query(&query, &admin()).unwrap();

    assert_eq!(response.total_count, 4);
    let ids: Vec<&str> = response.facets.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec![dimensions::PUBLISHERS, dimensions::TYPES, dimensions::THEMES, "license"]);

    assert_eq!(response.facets[0].total(), 4);
    assert_eq!(response.facets[0].values["P1"], 2);
    assert_eq!(response.facets[1].total(), 4);
    assert_eq!(response.facets[2].values["env"], 2);
    assert!(response.facets[3].values.is_empty());
    for facet in &response.facets[..2] {
        assert!(facet.total() <= response.total_count);
    }
}

// =============================================================================
// Visibility
// =============================================================================

/// Private record as P1: anonymous excluded, P1 included, gone after delete.
#[test]
fn test_private_record_lifecycle() {
    let (_dir, storage) = create_temp_store();
    let p1 = publisher("P1");
    let anonymous = DefaultAccessPolicy::anonymous();
    let a = dataset("A", "P1", false);

    storage.insert(&b"private"[..], a.clone(), false, &p1).unwrap();

    let as_anonymous = storage.query(&FileStorageQuery::new(), &anonymous).unwrap();
    assert!(as_anonymous.files.iter().all(|s| s.id() != a.id));
    assert_eq!(as_anonymous.total_count, 0);

    let as_owner = storage.query(&FileStorageQuery::new(), &p1).unwrap();
    assert!(as_owner.files.iter().any(|s| s.id() == a.id));

    storage.delete(a.id, &p1).unwrap();
    for policy in [&p1, &anonymous, &publisher("P2"), &admin()] {
        assert!(matches!(storage.get_file_state(a.id, policy), Err(StorageError::NotFound(_))));
    }
}

/// Non-members get NotFound from every read path; members get the record.
#[test]
fn test_non_public_reads_are_indistinguishable_from_absent() {
    let (_dir, storage) = create_temp_store();
    let hidden = dataset("Hidden", "P1", false);
    storage.insert(&b"secret"[..], hidden.clone(), false, &publisher("P1")).unwrap();
    let absent = Uuid::new_v4();

    for policy in [publisher("P2"), DefaultAccessPolicy::anonymous()] {
        for id in [hidden.id, absent] {
            assert!(matches!(storage.get_file_state(id, &policy), Err(StorageError::NotFound(x)) if x == id));
            assert!(matches!(storage.get_metadata(id, &policy), Err(StorageError::NotFound(_))));
            assert!(matches!(storage.open_read_content(id, &policy), Err(StorageError::NotFound(_))));
        }
    }

    for policy in [publisher("P1"), admin()] {
        assert_eq!(storage.get_metadata(hidden.id, &policy).unwrap().name, "Hidden");
    }
}

// =============================================================================
// Durability
// =============================================================================

/// Committed records survive reopen; a corrupted record fails the open.
#[test]
fn test_reopen_and_corruption_detection() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("store");
    let metadata = dataset("Roads", "P1", true);

    {
        let storage = FileStorage::open_local(&root).unwrap();
        storage.insert(&b"v1"[..], metadata.clone(), false, &admin()).unwrap();
        storage.insert(&b"v2"[..], metadata.clone(), true, &admin()).unwrap();
    }

    {
        let storage = FileStorage::open_local(&root).unwrap();
        let text = storage
            .open_read_content(metadata.id, &ServiceAccessPolicy)
            .unwrap()
            .read_to_text()
            .unwrap();
        assert_eq!(text, "v2");

        let versions = fs::read_dir(root.join(metadata.id.to_string()))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "content"))
            .count();
        assert_eq!(versions, 1);
    }

    let record_path = root.join(metadata.id.to_string()).join("record.json");
    let tampered = fs::read_to_string(&record_path).unwrap().replace("\"Roads\"", "\"Rails\"");
    fs::write(&record_path, tampered).unwrap();

    assert!(matches!(FileStorage::open_local(&root), Err(StorageError::Corrupted(_, _))));
}

/// A failed commit is reported and leaves the prior version authoritative.
#[test]
fn test_failed_commit_keeps_prior_state() {
    let storage = FileStorage::open(FlakyBackend::default()).unwrap();
    let policy = publisher("P1");
    let metadata = dataset("Stable", "P1", true);
    let original = storage.insert(&b"original"[..], metadata.clone(), false, &policy).unwrap();

    storage.backend().fail_record_writes.store(true, Ordering::SeqCst);

    let result = storage.insert(&b"replacement"[..], metadata.clone(), true, &policy);
    assert!(matches!(result, Err(StorageError::IoError(_))));

    let mut renamed = metadata.clone();
    renamed.name = "Renamed".into();
    assert!(storage.update_metadata(renamed, &policy).is_err());

    let fresh = dataset("Never stored", "P1", true);
    assert!(storage.insert(&b"x"[..], fresh.clone(), false, &policy).is_err());

    assert_eq!(storage.get_file_state(metadata.id, &policy).unwrap(), original);
    let text = storage.open_read_content(metadata.id, &policy).unwrap().read_to_text().unwrap();
    assert_eq!(text, "original");
    assert!(matches!(storage.get_file_state(fresh.id, &policy), Err(StorageError::NotFound(_))));
    assert_eq!(storage.backend().inner.content_versions(), 1);

    storage.backend().fail_record_writes.store(false, Ordering::SeqCst);
    storage.insert(&b"replacement"[..], metadata.clone(), true, &policy).unwrap();
    let text = storage.open_read_content(metadata.id, &policy).unwrap().read_to_text().unwrap();
    assert_eq!(text, "replacement");
}
