//! CLI interface for docu.
//!
//! Provides command-line argument parsing using clap.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::export::{DEFAULT_EXPORT_LIMIT, ExportFormat};

/// Command-line interface for docu.
#[derive(Parser)]
#[command(name = "docu")]
#[command(author, version, about = "Offline developer documentation search", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Download and index a docset.
    Fetch {
        /// Docset name (see `docu available`).
        docset: String,

        /// Re-fetch even if the docset is already installed.
        #[arg(short, long)]
        force: bool,
    },

    /// Search installed docsets.
    Search {
        /// The search query string. Every term must match.
        query: String,

        /// Maximum number of results to return [default: from config, else 10].
        #[arg(short, long)]
        limit: Option<usize>,

        /// Search only this docset.
        #[arg(short, long)]
        docset: Option<String>,

        /// Drop results scoring below this value.
        #[arg(short = 'm', long)]
        min_score: Option<f32>,
    },

    /// Save search results to a file.
    Export {
        /// The search query string.
        query: String,

        /// Output file path.
        #[arg(short, long, default_value = "search-results.md")]
        output: PathBuf,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Markdown)]
        format: ExportFormat,

        /// Export results from this docset only.
        #[arg(short, long)]
        docset: Option<String>,

        /// Maximum number of results.
        #[arg(short, long, default_value_t = DEFAULT_EXPORT_LIMIT)]
        limit: usize,
    },

    /// List installed docsets.
    List,

    /// Show every docset that can be fetched.
    #[command(alias = "browse")]
    Available,

    /// Remove an installed docset and its index.
    Remove {
        /// Docset name.
        docset: String,
    },

    /// Re-fetch installed docsets.
    Update {
        /// Docset to update.
        docset: Option<String>,

        /// Update every installed docset.
        #[arg(short, long, conflicts_with = "docset")]
        all: bool,

        /// Only report which docsets are stale.
        #[arg(long)]
        check: bool,
    },

    /// Start the MCP server for AI editor integration.
    #[cfg(feature = "mcp")]
    Serve,
}
