//! # Auth Module
//!
//! Caller identity and the access policy that gates every read and write
//! path of the file storage.

pub mod context;
pub mod policy;

pub use context::{CallerContext, Role};
pub use policy::{AccessPolicy, DefaultAccessPolicy, ServiceAccessPolicy};
