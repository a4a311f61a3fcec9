//! Federated search across every installed docset.

use std::path::Path;

use tracing::{debug, warn};

use crate::search::{IndexError, IndexMode, SearchError, SearchOptions, SearchResult, TextIndex};
use crate::storage::DocStore;

/// Minimum number of candidates pulled from each docset before merging.
const MIN_CANDIDATES_PER_DOCSET: usize = 50;

/// Queries each docset index in turn and merges the hits into one ranking.
pub struct SearchAggregator<'a, S: DocStore + ?Sized> {
    store: &'a S,
    index_root: &'a Path,
}

impl<'a, S: DocStore + ?Sized> SearchAggregator<'a, S> {
    pub fn new(store: &'a S, index_root: &'a Path) -> Self {
        Self { store, index_root }
    }

    /// Search all installed docsets, or only `options.docset` when set.
    ///
    /// A docset whose index is missing or unreadable is skipped with a
    /// warning; the remaining docsets still contribute results.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::EmptyQuery` for a blank query, or
    /// `SearchError::Storage` if the installed docsets cannot be listed.
    pub fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let docsets = match &options.docset {
            Some(name) if self.store.is_installed(name) => vec![name.clone()],
            Some(_) => Vec::new(),
            None => self.store.list_installed()?,
        };

        let per_docset = candidates_per_docset(options.limit);
        let mut hits = Vec::new();
        for docset in &docsets {
            hits.extend(self.search_docset(docset, query, per_docset, options.min_score));
        }

        debug!(query, docsets = docsets.len(), hits = hits.len(), "merged search results");
        Ok(merge_results(hits, options.limit, options.min_score))
    }

    fn search_docset(
        &self,
        docset: &str,
        query: &str,
        limit: usize,
        min_score: f32,
    ) -> Vec<SearchResult> {
        let index = match TextIndex::open(self.index_root, docset, IndexMode::ReadOnly) {
            Ok(index) => index,
            Err(IndexError::NotFound(_)) => {
                warn!(docset, "no search index for docset, skipping");
                return Vec::new();
            }
            Err(e) => {
                warn!(docset, error = %e, "failed to open search index, skipping");
                return Vec::new();
            }
        };

        let results = index.query(query, limit, min_score);
        index.close();

        results.unwrap_or_else(|e| {
            warn!(docset, error = %e, "search failed, skipping docset");
            Vec::new()
        })
    }
}

fn candidates_per_docset(limit: usize) -> usize {
    limit.saturating_mul(5).max(MIN_CANDIDATES_PER_DOCSET)
}

/// Filter by `min_score`, order by descending score, then truncate.
///
/// The sort is stable, so equal scores keep docset enumeration order.
#[must_use]
pub fn merge_results(
    mut results: Vec<SearchResult>,
    limit: usize,
    min_score: f32,
) -> Vec<SearchResult> {
    results.retain(|r| r.score >= min_score);
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(limit);
    results
}
