//! Full-text inverted index
//!
//! Text is lowercased and split on every non-alphanumeric character; tokens
//! shorter than the configured minimum length are dropped. The index maps
//! each token to the rows containing it and the token's frequency in each.
//!
//! Relevance of a row for a query is `sum(tf * idf)` over the query terms
//! it contains, with `idf = ln(1 + N / df)`.

use std::collections::{BTreeMap, HashMap};

use crate::storage::{RowKey, Tuple, Value};

/// Default minimum token length, matching InnoDB's `innodb_ft_min_token_size`
pub const DEFAULT_MIN_TOKEN_LEN: usize = 3;

/// Split text into index tokens
pub fn tokenize(text: &str, min_len: usize) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(move |t| !t.is_empty() && t.chars().count() >= min_len)
        .map(str::to_lowercase)
}

/// Distinct query terms, in first-seen order
pub fn query_terms(query: &str, min_len: usize) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for token in tokenize(query, min_len) {
        if !terms.contains(&token) {
            terms.push(token);
        }
    }
    terms
}

/// Term frequencies of a row's indexed columns
pub fn document_terms(tuple: &Tuple, columns: &[usize], min_len: usize) -> HashMap<String, u32> {
    let mut terms = HashMap::new();
    for &idx in columns {
        if let Some(Value::String(text)) = tuple.get(idx) {
            for token in tokenize(text, min_len) {
                *terms.entry(token).or_insert(0) += 1;
            }
        }
    }
    terms
}

#[derive(Debug, Clone)]
pub struct FullTextIndex {
    /// Positions of the indexed columns
    columns: Vec<usize>,
    min_token_len: usize,
    /// token -> {row key: term frequency}
    postings: HashMap<String, BTreeMap<RowKey, u32>>,
}

impl FullTextIndex {
    pub fn new(columns: Vec<usize>, min_token_len: usize) -> Self {
        Self {
            columns,
            min_token_len,
            postings: HashMap::new(),
        }
    }

    /// Build an index from existing rows
    pub fn build<'a>(
        columns: Vec<usize>,
        min_token_len: usize,
        rows: impl IntoIterator<Item = (&'a RowKey, &'a Tuple)>,
    ) -> Self {
        let mut index = Self::new(columns, min_token_len);
        for (key, tuple) in rows {
            index.insert(key, tuple);
        }
        index
    }

    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    pub fn min_token_len(&self) -> usize {
        self.min_token_len
    }

    /// Term frequencies this index would record for `tuple`
    pub fn terms_of(&self, tuple: &Tuple) -> HashMap<String, u32> {
        document_terms(tuple, &self.columns, self.min_token_len)
    }

    pub fn insert(&mut self, key: &RowKey, tuple: &Tuple) {
        for (term, tf) in self.terms_of(tuple) {
            self.postings
                .entry(term)
                .or_default()
                .insert(key.clone(), tf);
        }
    }

    pub fn remove(&mut self, key: &RowKey, tuple: &Tuple) {
        for term in self.terms_of(tuple).into_keys() {
            if let Some(rows) = self.postings.get_mut(&term) {
                rows.remove(key);
                if rows.is_empty() {
                    self.postings.remove(&term);
                }
            }
        }
    }

    /// Rows containing `term` with their term frequency
    pub fn postings(&self, term: &str) -> Option<&BTreeMap<RowKey, u32>> {
        self.postings.get(term)
    }
}

/// A ranked full-text match
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub key: RowKey,
    pub score: f64,
}

/// Rank rows given, per query term, the visible rows containing it
///
/// Ordered by descending score, ties by ascending key.
pub fn rank(term_postings: &[BTreeMap<RowKey, u32>], total_docs: usize) -> Vec<SearchHit> {
    let mut scores: BTreeMap<RowKey, f64> = BTreeMap::new();
    for postings in term_postings {
        let df = postings.len();
        if df == 0 {
            continue;
        }
        let n = total_docs.max(df) as f64;
        let idf = (1.0 + n / df as f64).ln();
        for (key, &tf) in postings {
            *scores.entry(key.clone()).or_insert(0.0) += tf as f64 * idf;
        }
    }

    let mut hits: Vec<SearchHit> = scores
        .into_iter()
        .map(|(key, score)| SearchHit { key, score })
        .collect();
    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.key.cmp(&b.key)));
    hits
}
