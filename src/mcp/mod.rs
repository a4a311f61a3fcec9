//! MCP server implementation for docu.
//!
//! Exposes documentation search as MCP tools for AI editors.

use std::borrow::Cow;
use std::fmt::Write;
use std::sync::Arc;

use chrono::Utc;
use rmcp::{
    ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, ErrorCode, ErrorData as McpError, ServerCapabilities, ServerInfo,
    },
    schemars, tool, tool_handler, tool_router,
    transport::stdio,
};
use serde::Deserialize;

use crate::commands::{self, CommandError};
use crate::config::Config;
use crate::docset::DocsetMetadata;
use crate::search::SearchResult;

/// Parameters for `search_docs` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchParams {
    #[schemars(description = "The search query; every term must match")]
    pub query: String,
    #[schemars(description = "Maximum number of results (default: 10)")]
    pub limit: Option<usize>,
    #[schemars(description = "Search only this docset (e.g. 'react')")]
    pub docset: Option<String>,
}

/// MCP server exposing docu tools.
#[derive(Clone)]
pub struct DocuServer {
    config: Arc<Config>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl DocuServer {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Search the installed offline documentation")]
    async fn search_docs(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let mut options = commands::default_search_options(&self.config);
        options.docset = params.docset;
        if let Some(limit) = params.limit {
            options.limit = limit;
        }

        match commands::search(&self.config, &params.query, &options) {
            Ok(results) => Ok(CallToolResult::success(vec![Content::text(
                format_results(&params.query, &results),
            )])),
            Err(e) => {
                let code = if e.downcast_ref::<CommandError>().is_some() {
                    ErrorCode::INVALID_PARAMS
                } else {
                    ErrorCode::INTERNAL_ERROR
                };
                Err(McpError {
                    code,
                    message: Cow::from(format!("Search failed: {e}")),
                    data: None,
                })
            }
        }
    }

    #[tool(description = "List installed docsets and how old they are")]
    async fn list_docsets(&self) -> Result<CallToolResult, McpError> {
        match commands::list(&self.config) {
            Ok(installed) => Ok(CallToolResult::success(vec![Content::text(format_docsets(
                &installed,
            ))])),
            Err(e) => Err(McpError {
                code: ErrorCode::INTERNAL_ERROR,
                message: Cow::from(format!("List failed: {e}")),
                data: None,
            }),
        }
    }
}

fn format_results(query: &str, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return format!("No matches found for '{query}'");
    }

    let mut output = String::new();
    for result in results {
        let _ = write!(
            output,
            "## {}\n**Docset:** {} | **Score:** {:.2}\n**URL:** {}\n{}\n\n",
            result.title, result.docset, result.score, result.url, result.snippet
        );
    }
    let _ = write!(output, "*{} result(s) found*", results.len());
    output
}

fn format_docsets(installed: &[DocsetMetadata]) -> String {
    if installed.is_empty() {
        return "No docsets installed.".to_string();
    }

    let now = Utc::now();
    let mut output = String::new();
    for metadata in installed {
        let _ = writeln!(
            output,
            "- **{}**: {} ({} docs, fetched {})",
            metadata.name,
            metadata.description,
            metadata.total_docs,
            metadata.age_label(now)
        );
    }
    output
}

#[tool_handler]
impl ServerHandler for DocuServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "docu provides offline search over cached developer documentation. \
                Use list_docsets to see what is installed and search_docs to find pages."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Start the MCP server with stdio transport.
///
/// # Errors
///
/// Returns an error if the server fails to start or encounters a fatal error.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let server = DocuServer::new(config);
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}
