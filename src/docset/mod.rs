//! Docset and document types shared by the fetch and search pipelines.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Maximum length of a docset name.
const MAX_NAME_LENGTH: usize = 64;

/// Maximum length of the readable part of a document id.
const MAX_SLUG_LENGTH: usize = 64;

/// Number of hex characters of the URL hash appended to a document id.
const ID_HASH_LENGTH: usize = 12;

/// Docsets older than this many whole days are considered stale.
pub const STALE_AFTER_DAYS: i64 = 7;

/// Errors raised when a docset name is not usable as a storage key.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("Docset name cannot be empty")]
    Empty,

    #[error("Docset name too long: {0} chars (max {MAX_NAME_LENGTH})")]
    TooLong(usize),

    #[error("Docset name must start with a letter or number: {0}")]
    BadStart(String),

    #[error(
        "Docset name contains invalid character '{1}': {0} \
        (only letters, numbers, hyphens, and underscores allowed)"
    )]
    InvalidCharacter(String, char),
}

/// Validate a docset name.
///
/// Names double as directory names, so only alphanumerics, hyphens and
/// underscores are accepted.
///
/// # Errors
///
/// Returns a `NameError` describing the first rule the name breaks.
pub fn validate_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }

    if name.len() > MAX_NAME_LENGTH {
        return Err(NameError::TooLong(name.len()));
    }

    if !name.chars().next().is_some_and(char::is_alphanumeric) {
        return Err(NameError::BadStart(name.to_string()));
    }

    if let Some(c) = name
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
    {
        return Err(NameError::InvalidCharacter(name.to_string(), c));
    }

    Ok(())
}

/// CSS selectors driving extraction for one docset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Selectors {
    /// Elements whose text becomes the document headings.
    pub title: String,
    /// The main content region; only the first match is used.
    pub content: String,
    /// Subtrees removed before anything else is read. Empty means none.
    #[serde(default)]
    pub exclude: String,
}

/// Static definition of a fetchable documentation collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocsetConfig {
    pub name: String,
    pub description: String,
    pub base_url: String,
    pub entry_points: Vec<String>,
    pub selectors: Selectors,
}

/// A stable document identifier derived from the page URL.
///
/// The readable slug keeps ids recognisable on disk; the hash suffix keeps
/// them unique after truncation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentId(String);

impl DocumentId {
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let without_scheme = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .unwrap_or(url);

        let slug: String = without_scheme
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        let slug: String = slug.trim_matches('_').chars().take(MAX_SLUG_LENGTH).collect();

        let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
        let hash = &digest[..ID_HASH_LENGTH];

        if slug.is_empty() {
            Self(hash.to_string())
        } else {
            Self(format!("{slug}-{hash}"))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One crawled, normalized page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub title: String,
    pub url: String,
    /// Markdown-ish plain text. Never empty.
    pub content: String,
    /// Heading texts in document order, without duplicates.
    #[serde(default)]
    pub headings: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

/// Record persisted next to a docset's documents once a fetch completes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocsetMetadata {
    pub name: String,
    pub version: String,
    pub description: String,
    pub base_url: String,
    pub last_fetched: DateTime<Utc>,
    pub total_docs: usize,
}

impl DocsetMetadata {
    /// Build the metadata for a fetch that just produced `total_docs` documents.
    #[must_use]
    pub fn for_fetch(config: &DocsetConfig, total_docs: usize, fetched_at: DateTime<Utc>) -> Self {
        Self {
            name: config.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: config.description.clone(),
            base_url: config.base_url.clone(),
            last_fetched: fetched_at,
            total_docs,
        }
    }

    /// Whole days elapsed between the last fetch and `now`.
    #[must_use]
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_fetched).num_days().max(0)
    }

    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.age_days(now) > STALE_AFTER_DAYS
    }

    /// Human-readable age such as "today" or "3 weeks ago".
    #[must_use]
    pub fn age_label(&self, now: DateTime<Utc>) -> String {
        match self.age_days(now) {
            0 => "today".to_string(),
            1 => "1 day ago".to_string(),
            d @ 2..7 => format!("{d} days ago"),
            d @ 7..30 => format!("{} weeks ago", d / 7),
            d => format!("{} months ago", d / 30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn metadata_fetched(days_ago: i64, now: DateTime<Utc>) -> DocsetMetadata {
        DocsetMetadata {
            name: "demo".to_string(),
            version: "0.1.0".to_string(),
            description: "Demo docs".to_string(),
            base_url: "https://example.com".to_string(),
            last_fetched: now - Duration::days(days_ago),
            total_docs: 2,
        }
    }

    mod document_id_tests {
        use super::*;

        #[test]
        fn stable_for_same_url() {
            let a = DocumentId::from_url("https://react.dev/learn");
            let b = DocumentId::from_url("https://react.dev/learn");
            assert_eq!(a, b);
        }

        #[test]
        fn differs_for_different_urls() {
            let a = DocumentId::from_url("https://react.dev/learn");
            let b = DocumentId::from_url("https://react.dev/reference");
            assert_ne!(a, b);
        }

        #[test]
        fn slug_is_filesystem_safe() {
            let id = DocumentId::from_url("https://docs.python.org/3/tutorial/index.html?x=1#top");
            assert!(id.as_str().starts_with("docs_python_org_3_tutorial_index_html_x_1_top-"));
            assert!(
                id.as_str()
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            );
        }

        #[test]
        fn long_urls_are_bounded() {
            let url = format!("https://example.com/{}", "segment/".repeat(50));
            let id = DocumentId::from_url(&url);
            assert!(id.as_str().len() <= MAX_SLUG_LENGTH + 1 + ID_HASH_LENGTH);
        }

        #[test]
        fn truncated_slugs_stay_unique() {
            let prefix = format!("https://example.com/{}", "a".repeat(100));
            let a = DocumentId::from_url(&format!("{prefix}/one"));
            let b = DocumentId::from_url(&format!("{prefix}/two"));
            assert_ne!(a, b);
        }
    }

    mod validate_name_tests {
        use super::*;

        #[test]
        fn accepts_simple_names() {
            for name in ["react", "nodejs", "python-3", "my_docs", "Rust2024"] {
                assert!(validate_name(name).is_ok(), "{name} should be valid");
            }
        }

        #[test]
        fn rejects_empty() {
            assert_eq!(validate_name(""), Err(NameError::Empty));
        }

        #[test]
        fn rejects_path_traversal() {
            assert!(validate_name("../etc").is_err());
            assert!(validate_name("a/b").is_err());
        }

        #[test]
        fn rejects_leading_hyphen() {
            assert!(matches!(validate_name("-x"), Err(NameError::BadStart(_))));
        }

        #[test]
        fn rejects_too_long() {
            let long = "a".repeat(MAX_NAME_LENGTH + 1);
            assert!(matches!(validate_name(&long), Err(NameError::TooLong(_))));
        }
    }

    mod metadata_tests {
        use super::*;

        #[test]
        fn age_labels() {
            let now = Utc::now();
            assert_eq!(metadata_fetched(0, now).age_label(now), "today");
            assert_eq!(metadata_fetched(1, now).age_label(now), "1 day ago");
            assert_eq!(metadata_fetched(4, now).age_label(now), "4 days ago");
            assert_eq!(metadata_fetched(14, now).age_label(now), "2 weeks ago");
            assert_eq!(metadata_fetched(65, now).age_label(now), "2 months ago");
        }

        #[test]
        fn stale_after_a_week() {
            let now = Utc::now();
            assert!(!metadata_fetched(7, now).is_stale(now));
            assert!(metadata_fetched(8, now).is_stale(now));
        }

        #[test]
        fn future_timestamps_count_as_fresh() {
            let now = Utc::now();
            let meta = metadata_fetched(-3, now);
            assert_eq!(meta.age_days(now), 0);
            assert!(!meta.is_stale(now));
        }

        #[test]
        fn serializes_camel_case() {
            let now = Utc::now();
            let json = serde_json::to_string(&metadata_fetched(0, now)).unwrap();
            assert!(json.contains("\"totalDocs\":2"));
            assert!(json.contains("\"lastFetched\""));
            assert!(json.contains("\"baseUrl\""));
        }
    }
}
