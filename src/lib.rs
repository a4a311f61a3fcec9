//! docu - Offline developer documentation with ranked search.
//!
//! Docsets are crawled from their entry points, normalized into plain-text
//! documents, stored on disk and indexed with one Tantivy index per docset.
//! Searches fan out over every installed index and merge into one ranking.
//!
//! # Modules
//!
//! - [`commands`] - High-level operations (fetch, search, list, remove, update)
//! - [`crawler`] - Parallel page fetching with per-page failure tolerance
//! - [`extract`] - HTML to document extraction driven by CSS selectors
//! - [`docset`] - Docset, document and metadata types
//! - [`search`] - Per-docset text index and federated search
//! - [`storage`] - Storage backend trait and implementations
//! - [`config`] - Configuration loading and the built-in docset catalog
//! - [`explain`] - Optional explanation of search results
//! - [`export`] - Markdown, JSON and text rendering of search results
//! - [`cli`] - Command-line interface definitions

pub mod cli;
pub mod commands;
pub mod config;
pub mod crawler;
pub mod docset;
pub mod explain;
pub mod export;
pub mod extract;
pub mod search;
pub mod storage;

#[cfg(feature = "mcp")]
pub mod mcp;
