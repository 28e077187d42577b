//! # Query and Response Shapes
//!
//! Data contracts exchanged with the request layer. All filters are
//! conjunctive; an absent or empty filter imposes no restriction.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::metadata::{FileState, FileType};

/// Property used to order query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderProperty {
    Name,
    Created,
    LastModified,
    /// Position in `only_ids`, i.e. fulltext rank
    Relevance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStorageOrderDefinition {
    pub property: OrderProperty,
    #[serde(default)]
    pub reverse_order: bool,
}

impl FileStorageOrderDefinition {
    /// Ascending order on `property`
    pub fn asc(property: OrderProperty) -> Self {
        Self {
            property,
            reverse_order: false,
        }
    }

    /// Descending order on `property`
    pub fn desc(property: OrderProperty) -> Self {
        Self {
            property,
            reverse_order: true,
        }
    }
}

/// Filters, facets and ordering of one query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileStorageQuery {
    pub skip_results: usize,
    pub max_results: Option<usize>,
    /// Free text, resolved through the fulltext index by the orchestrator
    pub query_text: Option<String>,
    pub only_ids: Option<Vec<Uuid>>,
    pub only_types: Option<Vec<FileType>>,
    pub only_publishers: Option<Vec<String>>,
    pub only_published: bool,
    pub parent_file: Option<Uuid>,
    pub additional_filters: Option<BTreeMap<String, Vec<String>>>,
    pub required_facets: Vec<String>,
    pub order_definitions: Option<Vec<FileStorageOrderDefinition>>,
    pub include_dependent_files: bool,
}

impl FileStorageQuery {
    /// Unrestricted query returning every visible record
    pub fn new() -> Self {
        Self::default()
    }

    /// Trimmed query text, None when blank
    pub fn text(&self) -> Option<&str> {
        self.query_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Set the free text
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.query_text = Some(text.into());
        self
    }

    /// Restrict to the given types
    pub fn with_types(mut self, types: Vec<FileType>) -> Self {
        self.only_types = Some(types);
        self
    }

    /// Restrict to the given publishers
    pub fn with_publishers(mut self, publishers: Vec<String>) -> Self {
        self.only_publishers = Some(publishers);
        self
    }

    /// Request facet counts for the named dimensions
    pub fn with_facets(mut self, facets: &[&str]) -> Self {
        self.required_facets = facets.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Append an ordering; earlier orderings take precedence
    pub fn with_order(mut self, order: FileStorageOrderDefinition) -> Self {
        self.order_definitions.get_or_insert_with(Vec::new).push(order);
        self
    }

    /// Skip `skip` results and return at most `max`
    pub fn page(mut self, skip: usize, max: usize) -> Self {
        self.skip_results = skip;
        self.max_results = Some(max);
        self
    }

    /// Types restriction, None when unrestricted
    pub fn type_filter(&self) -> Option<&[FileType]> {
        self.only_types.as_deref().filter(|t| !t.is_empty())
    }
}

/// Count of matching records per observed value of one dimension
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facet {
    pub id: String,
    pub values: BTreeMap<String, usize>,
}

impl Facet {
    /// Facet with no observed values
    pub fn empty(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: BTreeMap::new(),
        }
    }

    /// Sum of counts over all values
    pub fn total(&self) -> usize {
        self.values.values().sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStorageResponse {
    pub files: Vec<FileState>,
    /// Matching records before pagination
    pub total_count: usize,
    pub facets: Vec<Facet>,
}

impl FileStorageResponse {
    /// Empty page reporting every requested facet with no values
    pub fn empty(query: &FileStorageQuery) -> Self {
        let mut seen = HashSet::new();
        Self {
            files: Vec::new(),
            total_count: 0,
            facets: query
                .required_facets
                .iter()
                .filter(|id| seen.insert(id.as_str()))
                .map(Facet::empty)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStorageGroup {
    pub publisher_id: String,
    /// Publisher's own registration, when stored and visible to the caller
    pub publisher_file_state: Option<FileState>,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStorageGroupResponse {
    pub groups: Vec<FileStorageGroup>,
    pub total_count: usize,
}
