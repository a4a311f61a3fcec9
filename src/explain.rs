//! Optional prose explanation of search results.
//!
//! Search works without an explainer. When one is configured, its output is
//! extra information shown after the results and never a reason to fail.

use tracing::warn;

use crate::search::SearchResult;

/// A service that summarizes search results for a query.
pub trait Explainer {
    /// Produce an explanation of `results` for `query`.
    fn explain(
        &self,
        query: &str,
        results: &[SearchResult],
    ) -> impl Future<Output = anyhow::Result<String>> + Send;
}

/// Explainer with nothing to add. Names the capability type when callers
/// pass `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExplainer;

impl Explainer for NoExplainer {
    async fn explain(&self, _query: &str, _results: &[SearchResult]) -> anyhow::Result<String> {
        Ok(String::new())
    }
}

/// Run the explainer if present.
///
/// Returns `None` when there is no explainer, nothing to explain, or the
/// explainer fails (the failure is logged).
pub async fn explain_results<E: Explainer>(
    explainer: Option<&E>,
    query: &str,
    results: &[SearchResult],
) -> Option<String> {
    let explainer = explainer?;
    if results.is_empty() {
        return None;
    }

    match explainer.explain(query, results).await {
        Ok(text) if !text.trim().is_empty() => Some(text),
        Ok(_) => None,
        Err(e) => {
            warn!(query, error = %e, "explanation failed");
            None
        }
    }
}
