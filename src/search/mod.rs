//! Per-docset text indexes and federated search across them.

pub mod aggregator;
pub mod tantivy;

use serde::Serialize;

use crate::storage::StorageError;

pub use aggregator::SearchAggregator;
pub use tantivy::{IndexError, IndexMode, TextIndex};

/// Default number of search results to return.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Options for filtering and limiting search results.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    /// Restrict the search to a single docset.
    pub docset: Option<String>,
    /// Results scoring below this are dropped before truncation.
    pub min_score: f32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SEARCH_LIMIT,
            docset: None,
            min_score: 0.0,
        }
    }
}

/// A single ranked hit with a highlighted excerpt.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    pub url: String,
    /// Bounded excerpt with matched terms wrapped in `**`.
    pub snippet: String,
    /// Non-negative relevance; higher is better.
    pub score: f32,
    pub docset: String,
}

/// Errors that abort a federated search.
///
/// Failures of individual docset indexes are logged and skipped instead.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search query cannot be empty")]
    EmptyQuery,

    #[error("Failed to enumerate docsets: {0}")]
    Storage(#[from] StorageError),
}
