//! Search results: ids and scores, never content or metadata.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FulltextResponseDocument {
    pub id: Uuid,
    pub score: f64,
}

/// Ranked ids, best match first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulltextResponse {
    pub documents: Vec<FulltextResponseDocument>,
    /// Matches before the hit cap was applied
    pub total_count: usize,
}

impl FulltextResponse {
    pub fn ids(&self) -> Vec<Uuid> {
        self.documents.iter().map(|d| d.id).collect()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.documents.iter().any(|d| d.id == *id)
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
