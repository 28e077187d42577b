//! # Access Policy
//!
//! Pure read/write decisions over a single metadata record. Policies carry
//! no state besides the caller context and are evaluated on every record an
//! operation touches.

use super::context::CallerContext;
use crate::file_storage::FileMetadata;

/// Capability decision interface threaded through every storage call
pub trait AccessPolicy: Send + Sync {
    /// Whether the caller may see the record
    fn has_read_access(&self, metadata: &FileMetadata) -> bool;

    /// Whether the caller may insert, update or delete the record
    fn has_write_access(&self, metadata: &FileMetadata) -> bool;

    /// True for callers that can never write anything
    fn is_read_only(&self) -> bool {
        false
    }
}

/// Policy derived from the caller context
#[derive(Debug, Clone, Default)]
pub struct DefaultAccessPolicy {
    context: CallerContext,
}

impl DefaultAccessPolicy {
    pub fn new(context: CallerContext) -> Self {
        Self { context }
    }

    pub fn anonymous() -> Self {
        Self::new(CallerContext::anonymous())
    }

    pub fn context(&self) -> &CallerContext {
        &self.context
    }
}

impl AccessPolicy for DefaultAccessPolicy {
    fn has_read_access(&self, metadata: &FileMetadata) -> bool {
        if metadata.is_public || self.context.is_administrative() {
            return true;
        }

        match &metadata.publisher {
            Some(publisher) => self.context.belongs_to(publisher),
            None => false,
        }
    }

    fn has_write_access(&self, metadata: &FileMetadata) -> bool {
        if self.context.is_administrative() {
            return true;
        }

        match &metadata.publisher {
            Some(publisher) => self.context.belongs_to(publisher),
            None => false,
        }
    }

    fn is_read_only(&self) -> bool {
        !self.context.is_authenticated()
    }
}

/// Unrestricted read access for internal maintenance (index rebuilds)
///
/// Never writes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceAccessPolicy;

impl AccessPolicy for ServiceAccessPolicy {
    fn has_read_access(&self, _metadata: &FileMetadata) -> bool {
        true
    }

    fn has_write_access(&self, _metadata: &FileMetadata) -> bool {
        false
    }

    fn is_read_only(&self) -> bool {
        true
    }
}
