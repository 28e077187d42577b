//! # Fulltext Index
//!
//! Token postings over record names, keywords and descriptions, partitioned
//! per document type. Search returns ranked ids only; callers resolve and
//! authorize them against storage.

pub mod errors;
pub mod partition;
pub mod registry;
pub mod response;
pub mod tokenizer;

pub use errors::{FulltextError, FulltextResult};
pub use partition::TypePartition;
pub use registry::{FulltextIndex, DEFAULT_MAX_QUERY_TEXT_LENGTH, DEFAULT_MAX_SEARCH_HITS};
pub use response::{FulltextResponse, FulltextResponseDocument};
pub use tokenizer::Tokenizer;
