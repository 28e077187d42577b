//! Inverted index for one document type.
//!
//! Postings map each term to the documents carrying it with a field-weighted
//! frequency. A per-document term list makes removal proportional to the
//! document rather than the vocabulary.

use std::collections::{BTreeMap, HashMap};

use uuid::Uuid;

use super::tokenizer::Tokenizer;
use crate::file_storage::FileMetadata;

const NAME_WEIGHT: u32 = 3;
const KEYWORD_WEIGHT: u32 = 2;
const DESCRIPTION_WEIGHT: u32 = 1;

/// Score multiplier for a term equal to the search token
const EXACT_BOOST: f64 = 2.0;

#[derive(Debug, Default)]
pub struct TypePartition {
    postings: BTreeMap<String, BTreeMap<Uuid, u32>>,
    documents: HashMap<Uuid, Vec<String>>,
}

impl TypePartition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.documents.contains_key(id)
    }

    /// Replace the postings of `metadata.id`
    pub fn upsert(&mut self, metadata: &FileMetadata, tokenizer: &Tokenizer) {
        self.remove(&metadata.id);

        let mut weights: BTreeMap<String, u32> = BTreeMap::new();
        let mut add = |text: &str, weight: u32| {
            for token in tokenizer.tokenize(text) {
                *weights.entry(token).or_insert(0) += weight;
            }
        };

        add(&metadata.name, NAME_WEIGHT);
        for keyword in &metadata.keywords {
            add(keyword, KEYWORD_WEIGHT);
        }
        if let Some(description) = &metadata.description {
            add(description, DESCRIPTION_WEIGHT);
        }

        let mut terms = Vec::with_capacity(weights.len());
        for (term, weight) in weights {
            self.postings
                .entry(term.clone())
                .or_default()
                .insert(metadata.id, weight);
            terms.push(term);
        }
        // A document with no text is still tracked so removal reports it
        self.documents.insert(metadata.id, terms);
    }

    /// Drop all postings of `id`. Returns whether it was indexed here.
    pub fn remove(&mut self, id: &Uuid) -> bool {
        let Some(terms) = self.documents.remove(id) else {
            return false;
        };
        for term in terms {
            if let Some(docs) = self.postings.get_mut(&term) {
                docs.remove(id);
                if docs.is_empty() {
                    self.postings.remove(&term);
                }
            }
        }
        true
    }

    /// Documents matching every token, with their relevance score
    ///
    /// An indexed term matches a token when it contains the token. Each
    /// matching term contributes its weight scaled by inverse document
    /// frequency; exact matches are boosted.
    pub fn search(&self, tokens: &[String]) -> HashMap<Uuid, f64> {
        let mut scores: Option<HashMap<Uuid, f64>> = None;
        let total_docs = self.documents.len() as f64;

        for token in tokens {
            let mut token_scores: HashMap<Uuid, f64> = HashMap::new();

            for (term, docs) in self.postings.iter().filter(|(term, _)| term.contains(token.as_str())) {
                let idf = (1.0 + total_docs / docs.len() as f64).ln();
                let boost = if term == token { EXACT_BOOST } else { 1.0 };
                for (id, weight) in docs {
                    *token_scores.entry(*id).or_insert(0.0) += f64::from(*weight) * idf * boost;
                }
            }

            scores = Some(match scores {
                None => token_scores,
                Some(mut acc) => {
                    acc.retain(|id, _| token_scores.contains_key(id));
                    for (id, score) in acc.iter_mut() {
                        *score += token_scores.get(id).copied().unwrap_or(0.0);
                    }
                    acc
                }
            });

            if scores.as_ref().is_some_and(|s| s.is_empty()) {
                break;
            }
        }

        scores.unwrap_or_default()
    }
}
