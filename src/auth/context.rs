//! # Caller Context
//!
//! Identity of the caller as supplied by the request layer. The core never
//! parses credentials; it only receives an already-authenticated context.

use serde::{Deserialize, Serialize};

/// Roles recognised by the access policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    /// Catalog operator, full access to every publisher
    Superadmin,
    /// Administrator of a single publisher
    PublisherAdmin,
    /// Regular member of a publisher
    Publisher,
}

impl Role {
    /// Whether the role sees and modifies records of every publisher
    pub fn is_administrative(&self) -> bool {
        matches!(self, Role::Superadmin)
    }
}

/// Caller context carried with each storage call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerContext {
    /// Subject identifier (None if anonymous)
    pub subject: Option<String>,

    /// Role granted to the subject
    pub role: Option<Role>,

    /// Publisher the subject belongs to
    pub publisher: Option<String>,
}

impl CallerContext {
    /// Create context for anonymous access
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Create context for a member of a publisher
    pub fn publisher(subject: impl Into<String>, publisher: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            role: Some(Role::Publisher),
            publisher: Some(publisher.into()),
        }
    }

    /// Create context for a catalog superadmin
    pub fn superadmin(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            role: Some(Role::Superadmin),
            publisher: None,
        }
    }

    /// Replace the role
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.subject.is_some()
    }

    pub fn is_administrative(&self) -> bool {
        self.is_authenticated() && self.role.map(|r| r.is_administrative()).unwrap_or(false)
    }

    /// True when the caller is authenticated and belongs to `publisher`
    pub fn belongs_to(&self, publisher: &str) -> bool {
        self.is_authenticated() && self.publisher.as_deref() == Some(publisher)
    }
}
