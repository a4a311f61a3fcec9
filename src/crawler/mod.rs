//! Fetches a docset's entry points and runs them through the extractor.
//!
//! A failing page never aborts the crawl. Each failure is categorized,
//! logged and counted, and contributes zero documents.

use std::fmt;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::config::CrawlSettings;
use crate::docset::Document;
use crate::extract::ContentExtractor;

/// Coarse category of a page failure, used as a structured log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    /// 4xx response.
    ClientError,
    /// 5xx response.
    ServerError,
    /// Connect, DNS or body read failure.
    Network,
    Unknown,
}

impl FailureKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ClientError => "client_error",
            Self::ServerError => "server_error",
            Self::Network => "network",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while crawling.
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request failed: {0}")]
    Other(String),
}

impl CrawlError {
    fn from_request(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() || e.is_request() || e.is_body() || e.is_decode() {
            Self::Network(e.to_string())
        } else {
            Self::Other(e.to_string())
        }
    }

    /// Failure category for a per-page error.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout => FailureKind::Timeout,
            Self::Status(status) if status.is_client_error() => FailureKind::ClientError,
            Self::Status(status) if status.is_server_error() => FailureKind::ServerError,
            Self::Network(_) => FailureKind::Network,
            Self::Status(_) | Self::Client(_) | Self::Other(_) => FailureKind::Unknown,
        }
    }
}

/// A page that contributed nothing because fetching it failed.
#[derive(Debug, Clone)]
pub struct PageFailure {
    pub url: String,
    pub kind: FailureKind,
    pub message: String,
}

/// Outcome of crawling one docset.
#[derive(Debug, Default)]
pub struct CrawlReport {
    /// Extracted documents, in entry-point order.
    pub documents: Vec<Document>,
    pub pages_succeeded: usize,
    pub pages_failed: usize,
    pub failures: Vec<PageFailure>,
}

impl CrawlReport {
    /// True when no page produced a document.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// HTTP crawler with bounded parallelism.
#[derive(Debug, Clone)]
pub struct Crawler {
    client: reqwest::Client,
    concurrency: usize,
}

impl Crawler {
    /// Build a crawler from the crawl settings.
    ///
    /// # Errors
    ///
    /// Returns `CrawlError::Client` if the HTTP client cannot be built.
    pub fn new(settings: &CrawlSettings) -> Result<Self, CrawlError> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.clone());
        if !settings.proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build().map_err(CrawlError::Client)?;

        Ok(Self {
            client,
            concurrency: settings.concurrency.max(1),
        })
    }

    /// Crawl every entry point. Never fails as a whole; check
    /// [`CrawlReport::is_empty`] for the zero-document case.
    pub async fn crawl(&self, entry_points: &[String], extractor: &ContentExtractor) -> CrawlReport {
        let outcomes: Vec<(&String, Result<Vec<Document>, CrawlError>)> = stream::iter(entry_points)
            .map(|url| async move {
                let outcome = self
                    .fetch_page(url)
                    .await
                    .map(|html| extractor.extract(url, &html));
                (url, outcome)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = CrawlReport::default();
        for (url, outcome) in outcomes {
            match outcome {
                Ok(documents) => {
                    debug!(url = %url, documents = documents.len(), "crawled page");
                    report.pages_succeeded += 1;
                    report.documents.extend(documents);
                }
                Err(e) => {
                    let kind = e.kind();
                    warn!(url = %url, category = %kind, error = %e, "failed to crawl page");
                    report.pages_failed += 1;
                    report.failures.push(PageFailure {
                        url: url.clone(),
                        kind,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            pages_succeeded = report.pages_succeeded,
            pages_failed = report.pages_failed,
            documents = report.documents.len(),
            "crawl finished"
        );
        report
    }

    async fn fetch_page(&self, url: &str) -> Result<String, CrawlError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CrawlError::from_request(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Status(status));
        }

        response.text().await.map_err(|e| CrawlError::from_request(&e))
    }
}
