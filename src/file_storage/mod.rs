//! # File Storage
//!
//! Durable, access-controlled storage of catalog files: one content blob
//! plus one metadata record per id.
//!
//! A mutation is committed when its record is durably written. Content is
//! published under a fresh version before that point and the previous
//! version is pruned after it, so a failure at any step leaves the prior
//! committed state intact.

pub mod backend;
pub mod errors;
pub mod evaluate;
pub mod local;
pub mod locks;
pub mod memory;
pub mod metadata;
pub mod query;
pub mod record;
pub mod storage;
pub mod stream;

pub use backend::StorageBackend;
pub use errors::{StorageError, StorageResult};
pub use local::LocalBackend;
pub use memory::MemoryBackend;
pub use metadata::{dimensions, ContentInfo, FileMetadata, FileState, FileType};
pub use query::{
    Facet, FileStorageGroup, FileStorageGroupResponse, FileStorageOrderDefinition,
    FileStorageQuery, FileStorageResponse, OrderProperty,
};
pub use record::StoredRecord;
pub use storage::FileStorage;
pub use stream::{ContentStream, ContentWriter};
