//! Command implementations shared by CLI and MCP server.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::Config;
use crate::crawler::{Crawler, PageFailure};
use crate::docset::{DocsetMetadata, Document, validate_name};
use crate::explain::{Explainer, explain_results};
use crate::export::{self as export_format, ExportFormat};
use crate::extract::ContentExtractor;
use crate::search::{IndexMode, SearchAggregator, SearchOptions, SearchResult, TextIndex};
use crate::storage::DocStore;
use crate::storage::local::LocalDocStore;

/// Usage and whole-operation failures of the commands.
///
/// Returned inside `anyhow::Error`; downcast to tell them apart.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown docset '{name}'. Available docsets: {}", .available.join(", "))]
    UnknownDocset { name: String, available: Vec<String> },

    #[error("Docset '{0}' is already installed. Use --force to re-fetch it.")]
    AlreadyInstalled(String),

    #[error("No documents extracted for docset '{name}' ({pages_failed} of {pages} pages failed)")]
    NoDocuments {
        name: String,
        pages: usize,
        pages_failed: usize,
    },

    #[error("Search query cannot be empty")]
    EmptyQuery,

    #[error("Docset '{0}' is not installed")]
    NotInstalled(String),
}

/// Result of a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchSummary {
    pub name: String,
    pub documents: usize,
    pub pages_succeeded: usize,
    pub pages_failed: usize,
    pub failures: Vec<PageFailure>,
}

/// A catalog entry and whether it is installed.
#[derive(Debug, Clone)]
pub struct AvailableDocset {
    pub name: String,
    pub description: String,
    pub base_url: String,
    pub installed: bool,
}

/// Freshness of an installed docset.
#[derive(Debug, Clone)]
pub struct UpdateStatus {
    pub name: String,
    pub last_fetched: DateTime<Utc>,
    /// Human readable age, e.g. "3 days ago".
    pub age: String,
    pub stale: bool,
}

/// Search hits and the explanation attached to them, if any.
#[derive(Debug, Clone)]
pub struct ExplainedSearch {
    pub results: Vec<SearchResult>,
    pub explanation: Option<String>,
}

/// Where an export was written and what it holds.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    /// `None` when the search had no results and nothing was written.
    pub path: Option<PathBuf>,
    pub results: usize,
    pub format: ExportFormat,
    pub bytes: usize,
}

/// Per-docset result of an update run.
#[derive(Debug)]
pub struct UpdateOutcome {
    pub name: String,
    pub result: anyhow::Result<FetchSummary>,
}

fn store(config: &Config) -> LocalDocStore {
    LocalDocStore::new(config.docsets_dir())
}

/// Crawl, persist and index a docset.
///
/// The docset only counts as installed once every step has succeeded: the
/// old metadata is dropped first and the new record is written last. A crawl
/// that yields no documents leaves any previous install untouched.
///
/// # Errors
///
/// Returns `CommandError::UnknownDocset`, `CommandError::AlreadyInstalled`
/// (without `force`), `CommandError::NoDocuments`, or a storage/index error.
pub async fn fetch(config: &Config, name: &str, force: bool) -> anyhow::Result<FetchSummary> {
    let docset = config
        .docset(name)
        .ok_or_else(|| CommandError::UnknownDocset {
            name: name.to_string(),
            available: config.docset_names().into_iter().map(String::from).collect(),
        })?;

    let store = store(config);
    if !force && store.is_installed(name) {
        return Err(CommandError::AlreadyInstalled(name.to_string()).into());
    }

    let extractor = ContentExtractor::new(&docset.selectors)?;
    let crawler = Crawler::new(&config.crawl)?;

    info!(docset = name, pages = docset.entry_points.len(), "fetching docset");
    let report = crawler.crawl(&docset.entry_points, &extractor).await;

    if report.is_empty() {
        return Err(CommandError::NoDocuments {
            name: name.to_string(),
            pages: docset.entry_points.len(),
            pages_failed: report.pages_failed,
        }
        .into());
    }

    let documents = dedup_by_id(report.documents);

    store.invalidate(name)?;
    store.replace_documents(name, &documents)?;

    let index = TextIndex::open(&config.index_dir(), name, IndexMode::ReadWrite)?;
    let indexed = index.rebuild(&documents);
    index.close();
    indexed?;

    store.write_metadata(&DocsetMetadata::for_fetch(docset, documents.len(), Utc::now()))?;

    info!(
        docset = name,
        documents = documents.len(),
        pages_failed = report.pages_failed,
        "docset installed"
    );

    Ok(FetchSummary {
        name: name.to_string(),
        documents: documents.len(),
        pages_succeeded: report.pages_succeeded,
        pages_failed: report.pages_failed,
        failures: report.failures,
    })
}

/// Keep the first document for each id. Entry points listed twice would
/// otherwise be stored and counted twice.
fn dedup_by_id(documents: Vec<Document>) -> Vec<Document> {
    let mut seen = HashSet::new();
    documents
        .into_iter()
        .filter(|doc| seen.insert(doc.id.clone()))
        .collect()
}

/// Search installed docsets.
///
/// A docset filter naming something that is not installed yields no
/// results rather than an error.
///
/// # Errors
///
/// Returns `CommandError::EmptyQuery` for a blank query, or an error if the
/// installed docsets cannot be listed.
pub fn search(
    config: &Config,
    query: &str,
    options: &SearchOptions,
) -> anyhow::Result<Vec<SearchResult>> {
    if query.trim().is_empty() {
        return Err(CommandError::EmptyQuery.into());
    }

    if let Some(docset) = &options.docset
        && let Err(e) = validate_name(docset)
    {
        warn!(docset, error = %e, "ignoring search in invalid docset");
        return Ok(Vec::new());
    }

    let store = store(config);
    let index_root = config.index_dir();
    let results = SearchAggregator::new(&store, &index_root).search(query, options)?;
    Ok(results)
}

/// Search, then let `explainer` describe the hits.
///
/// The explanation is optional: a missing or failing explainer leaves
/// `explanation` empty and the results intact.
///
/// # Errors
///
/// Same as [`search`].
pub async fn search_explained<E: Explainer>(
    config: &Config,
    query: &str,
    options: &SearchOptions,
    explainer: Option<&E>,
) -> anyhow::Result<ExplainedSearch> {
    let results = search(config, query, options)?;
    let explanation = explain_results(explainer, query, &results).await;
    Ok(ExplainedSearch {
        results,
        explanation,
    })
}

/// Search and write the results to `output` in `format`.
///
/// Missing parent directories are created. A search without results writes
/// nothing.
///
/// # Errors
///
/// Same as [`search`], plus an error if the file cannot be written.
pub fn export(
    config: &Config,
    query: &str,
    options: &SearchOptions,
    format: ExportFormat,
    output: &Path,
) -> anyhow::Result<ExportSummary> {
    let results = search(config, query, options)?;
    if results.is_empty() {
        return Ok(ExportSummary {
            path: None,
            results: 0,
            format,
            bytes: 0,
        });
    }

    let rendered = export_format::render(format, query, options.docset.as_deref(), &results, Utc::now())?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(output, &rendered)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(query, results = results.len(), %format, path = %output.display(), "exported search results");
    Ok(ExportSummary {
        path: Some(output.to_path_buf()),
        results: results.len(),
        format,
        bytes: rendered.len(),
    })
}

/// Search options seeded from the `[search]` config defaults.
#[must_use]
pub fn default_search_options(config: &Config) -> SearchOptions {
    SearchOptions {
        limit: config.search.limit,
        docset: None,
        min_score: config.search.min_score,
    }
}

/// Metadata of every installed docset, alphabetical by name.
///
/// # Errors
///
/// Returns an error if the docsets directory cannot be read.
pub fn list(config: &Config) -> anyhow::Result<Vec<DocsetMetadata>> {
    let store = store(config);
    let mut installed = Vec::new();

    for name in store.list_installed()? {
        match store.read_metadata(&name) {
            Ok(Some(metadata)) => installed.push(metadata),
            Ok(None) => {}
            Err(e) => warn!(docset = %name, error = %e, "skipping unreadable docset"),
        }
    }

    Ok(installed)
}

/// Every docset in the catalog, in catalog order.
#[must_use]
pub fn available(config: &Config) -> Vec<AvailableDocset> {
    let store = store(config);
    config
        .docsets
        .iter()
        .map(|docset| AvailableDocset {
            name: docset.name.clone(),
            description: docset.description.clone(),
            base_url: docset.base_url.clone(),
            installed: store.is_installed(&docset.name),
        })
        .collect()
}

/// Remove an installed docset and its index.
///
/// # Errors
///
/// Returns `CommandError::NotInstalled` if the docset is not installed, or
/// an error if its files cannot be removed.
pub fn remove(config: &Config, name: &str) -> anyhow::Result<()> {
    let store = store(config);
    if validate_name(name).is_err() || !store.is_installed(name) {
        return Err(CommandError::NotInstalled(name.to_string()).into());
    }

    store.invalidate(name)?;
    TextIndex::delete(&config.index_dir(), name)?;
    store.remove(name)?;

    info!(docset = name, "docset removed");
    Ok(())
}

/// Report how old each installed docset is.
///
/// # Errors
///
/// Returns an error if the installed docsets cannot be listed.
pub fn check_updates(config: &Config, now: DateTime<Utc>) -> anyhow::Result<Vec<UpdateStatus>> {
    Ok(list(config)?
        .into_iter()
        .map(|metadata| UpdateStatus {
            age: metadata.age_label(now),
            stale: metadata.is_stale(now),
            last_fetched: metadata.last_fetched,
            name: metadata.name,
        })
        .collect())
}

/// Force re-fetch each named docset.
///
/// Failures are collected per docset; one failing docset does not stop
/// the others.
pub async fn update(config: &Config, names: &[String]) -> Vec<UpdateOutcome> {
    let store = store(config);
    let mut outcomes = Vec::with_capacity(names.len());

    for name in names {
        let result = if store.is_installed(name) {
            fetch(config, name, true).await
        } else {
            Err(CommandError::NotInstalled(name.clone()).into())
        };

        if let Err(e) = &result {
            warn!(docset = %name, error = %e, "update failed");
        }

        outcomes.push(UpdateOutcome {
            name: name.clone(),
            result,
        });
    }

    outcomes
}
