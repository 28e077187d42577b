//! catalog-store - access-controlled file storage for a data catalog
//!
//! Stores documents (content plus structured metadata), answers filtered,
//! faceted and fulltext queries over them, and enforces per-publisher
//! access control on every read and write.
//!
//! - [`auth`]: caller context and access policies
//! - [`file_storage`]: durable storage engine and query evaluation
//! - [`fulltext`]: per-type inverted index returning ranked ids
//! - [`catalog`]: two-phase search and mutate-then-index sequencing
//! - [`cli`]: administration binary

pub mod auth;
pub mod catalog;
pub mod cli;
pub mod file_storage;
pub mod fulltext;
