//! Text normalization shared by indexing and search.

use std::collections::HashSet;

use regex::Regex;

use super::errors::{FulltextError, FulltextResult};

const WORD_PATTERN: &str = r"[\p{L}\p{N}]+";

/// Splits text into lowercase word tokens
#[derive(Debug, Clone)]
pub struct Tokenizer {
    words: Regex,
}

impl Tokenizer {
    pub fn new() -> FulltextResult<Self> {
        let words = Regex::new(WORD_PATTERN)
            .map_err(|e| FulltextError::Internal(format!("Invalid word pattern: {}", e)))?;
        Ok(Self { words })
    }

    /// Tokens in order of appearance
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.words
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .collect()
    }

    /// Distinct tokens of a search string, in order of first appearance
    pub fn query_tokens(&self, text: &str) -> Vec<String> {
        let mut tokens = self.tokenize(text);
        let mut seen = HashSet::new();
        tokens.retain(|t| seen.insert(t.clone()));
        tokens
    }
}
