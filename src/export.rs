//! Rendering search results into shareable files.

use std::fmt::{self, Write};

use chrono::{DateTime, SecondsFormat, Utc};
use clap::ValueEnum;
use serde::Serialize;

use crate::search::SearchResult;

/// Default result cap for exports, higher than interactive search.
pub const DEFAULT_EXPORT_LIMIT: usize = 50;

/// File format of an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// Headed sections with linked URLs and emphasized snippets.
    #[default]
    Markdown,
    /// Pretty-printed JSON with the raw result records.
    Json,
    /// Plain text with emphasis markers removed.
    Txt,
}

impl ExportFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Json => "json",
            Self::Txt => "txt",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize)]
struct JsonExport<'a> {
    query: &'a str,
    timestamp: String,
    total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    docset: Option<&'a str>,
    results: &'a [SearchResult],
}

/// Render `results` for `query` in the given format.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render(
    format: ExportFormat,
    query: &str,
    docset: Option<&str>,
    results: &[SearchResult],
    generated: DateTime<Utc>,
) -> Result<String, serde_json::Error> {
    let timestamp = generated.to_rfc3339_opts(SecondsFormat::Millis, true);
    match format {
        ExportFormat::Json => serde_json::to_string_pretty(&JsonExport {
            query,
            timestamp,
            total: results.len(),
            docset,
            results,
        }),
        ExportFormat::Txt => Ok(render_txt(query, docset, results, &timestamp)),
        ExportFormat::Markdown => Ok(render_markdown(query, docset, results, &timestamp)),
    }
}

fn render_markdown(
    query: &str,
    docset: Option<&str>,
    results: &[SearchResult],
    timestamp: &str,
) -> String {
    let mut out = format!("# Search Results for \"{query}\"\n\n");
    let _ = writeln!(out, "**Generated:** {timestamp}  ");
    let _ = writeln!(out, "**Total Results:** {}  ", results.len());
    if let Some(docset) = docset {
        let _ = writeln!(out, "**Docset:** {docset}  ");
    }
    out.push_str("\n---\n\n");

    for (i, result) in results.iter().enumerate() {
        let _ = write!(
            out,
            "## {}. {}\n\n**URL:** [{url}]({url})  \n**Docset:** {}  \n**Score:** {:.6}  \n\n### Snippet\n\n{}\n\n---\n\n",
            i + 1,
            result.title,
            result.docset,
            result.score,
            result.snippet,
            url = result.url,
        );
    }
    out
}

fn render_txt(query: &str, docset: Option<&str>, results: &[SearchResult], timestamp: &str) -> String {
    let mut out = format!("Search Results for \"{query}\"\n");
    let _ = writeln!(out, "Generated: {timestamp}");
    let _ = writeln!(out, "Total Results: {}", results.len());
    if let Some(docset) = docset {
        let _ = writeln!(out, "Docset: {docset}");
    }
    let _ = write!(out, "\n{}\n\n", "=".repeat(50));

    for (i, result) in results.iter().enumerate() {
        let _ = write!(
            out,
            "{}. {}\nURL: {}\nDocset: {}\nScore: {:.6}\n\n{}\n\n{}\n\n",
            i + 1,
            result.title,
            result.url,
            result.docset,
            result.score,
            result.snippet.replace("**", ""),
            "-".repeat(30),
        );
    }
    out
}
