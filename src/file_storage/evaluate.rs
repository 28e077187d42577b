//! # Query Evaluation
//!
//! Filtering, facet counting and ordering over a point-in-time snapshot of
//! metadata. Access control is applied by the caller before records reach
//! the evaluator.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use uuid::Uuid;

use super::metadata::{FileMetadata, FileType};
use super::query::{Facet, FileStorageOrderDefinition, FileStorageQuery, OrderProperty};

/// Evaluates a query against individual metadata records
pub struct QueryEvaluator<'q> {
    query: &'q FileStorageQuery,
    ids: Option<HashSet<Uuid>>,
    relevance: HashMap<Uuid, usize>,
}

impl<'q> QueryEvaluator<'q> {
    pub fn new(query: &'q FileStorageQuery) -> Self {
        let only_ids = query.only_ids.as_deref().filter(|ids| !ids.is_empty());

        let ids = only_ids.map(|ids| ids.iter().copied().collect());
        let mut relevance = HashMap::new();
        for (rank, id) in only_ids.unwrap_or_default().iter().enumerate() {
            relevance.entry(*id).or_insert(rank);
        }

        Self {
            query,
            ids,
            relevance,
        }
    }

    /// Checks if a record matches all filters (AND semantics)
    pub fn matches(&self, metadata: &FileMetadata) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&metadata.id) {
                return false;
            }
        }

        if let Some(types) = self.query.type_filter() {
            if !types.contains(&metadata.file_type) {
                return false;
            }
        }

        if let Some(publishers) = self.query.only_publishers.as_deref().filter(|p| !p.is_empty()) {
            match &metadata.publisher {
                Some(p) if publishers.contains(p) => {}
                _ => return false,
            }
        }

        if self.query.only_published && !metadata.is_public {
            return false;
        }

        if let Some(parent) = self.query.parent_file {
            if metadata.parent_file != Some(parent) {
                return false;
            }
        }

        if let Some(filters) = &self.query.additional_filters {
            for (dimension, accepted) in filters {
                if accepted.is_empty() {
                    continue;
                }
                let values = metadata.dimension_values(dimension);
                if !values.iter().any(|v| accepted.iter().any(|a| a == v)) {
                    return false;
                }
            }
        }

        true
    }

    /// Counts matching records per distinct value of every requested dimension
    ///
    /// Every requested dimension is reported, in request order. A record
    /// contributes at most once to each distinct value it carries.
    pub fn facets<'m, I>(&self, matched: I) -> Vec<Facet>
    where
        I: IntoIterator<Item = &'m FileMetadata> + Clone,
    {
        let mut facets: Vec<Facet> = Vec::with_capacity(self.query.required_facets.len());

        for dimension in &self.query.required_facets {
            if facets.iter().any(|f| &f.id == dimension) {
                continue;
            }

            let mut values: BTreeMap<String, usize> = BTreeMap::new();
            for metadata in matched.clone() {
                let distinct: BTreeSet<&str> = metadata.dimension_values(dimension).into_iter().collect();
                for value in distinct {
                    *values.entry(value.to_string()).or_insert(0) += 1;
                }
            }

            facets.push(Facet {
                id: dimension.clone(),
                values,
            });
        }

        facets
    }

    /// Sorts records according to the order definitions.
    ///
    /// Sort is deterministic: ties always fall back to ascending id.
    pub fn sort<T, F>(&self, items: &mut [T], metadata_of: F)
    where
        F: Fn(&T) -> &FileMetadata,
    {
        let definitions = self.query.order_definitions.as_deref().unwrap_or_default();

        items.sort_by(|a, b| {
            let (a, b) = (metadata_of(a), metadata_of(b));
            definitions
                .iter()
                .map(|definition| self.compare(a, b, definition))
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or_else(|| a.id.cmp(&b.id))
        });
    }

    fn compare(&self, a: &FileMetadata, b: &FileMetadata, definition: &FileStorageOrderDefinition) -> Ordering {
        let ordering = match definition.property {
            OrderProperty::Name => compare_names(&a.name, &b.name),
            OrderProperty::Created => a.created.cmp(&b.created),
            OrderProperty::LastModified => a.last_modified.cmp(&b.last_modified),
            OrderProperty::Relevance => self.rank(&a.id).cmp(&self.rank(&b.id)),
        };

        if definition.reverse_order {
            ordering.reverse()
        } else {
            ordering
        }
    }

    fn rank(&self, id: &Uuid) -> usize {
        self.relevance.get(id).copied().unwrap_or(usize::MAX)
    }
}

/// Case-insensitive name comparison with a case-sensitive tiebreak
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Applies skip/max to an ordered list
pub fn paginate<T>(items: Vec<T>, skip: usize, max: Option<usize>) -> Vec<T> {
    let page = items.into_iter().skip(skip);
    match max {
        Some(max) => page.take(max).collect(),
        None => page.collect(),
    }
}

/// Whether a record registers a publisher
pub fn is_publisher_registration(metadata: &FileMetadata) -> bool {
    metadata.file_type == FileType::PublisherRegistration && metadata.publisher.is_some()
}
