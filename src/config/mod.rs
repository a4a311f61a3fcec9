//! Configuration loading for docu.
//!
//! Settings come from three layers, later ones winning: built-in defaults
//! (including the embedded docset catalog), the user's `config.toml`, and the
//! `DOCU_DATA_DIR` environment variable.

use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};
use serde::Deserialize;

use crate::docset::{DocsetConfig, NameError, validate_name};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "DOCU_CONFIG";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "DOCU_DATA_DIR";

const BUILTIN_CATALOG: &str = include_str!("docsets.toml");

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid built-in docset catalog: {0}")]
    Catalog(#[source] toml::de::Error),

    #[error("Invalid docset name '{name}': {source}")]
    InvalidDocset {
        name: String,
        #[source]
        source: NameError,
    },
}

/// Crawl tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlSettings {
    /// Pages fetched in parallel.
    pub concurrency: usize,
    /// Per-request timeout.
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Honor `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY` from the environment.
    pub proxy: bool,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout_secs: 10,
            user_agent: format!(
                "docu/{} (Documentation Scraper)",
                env!("CARGO_PKG_VERSION")
            ),
            proxy: true,
        }
    }
}

/// Defaults applied to searches that do not set their own options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchDefaults {
    pub limit: usize,
    pub min_score: f32,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            limit: crate::search::DEFAULT_SEARCH_LIMIT,
            min_score: 0.0,
        }
    }
}

/// Raw shape of `config.toml`.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    data_dir: Option<String>,
    #[serde(default)]
    crawl: CrawlSettings,
    #[serde(default)]
    search: SearchDefaults,
    #[serde(default)]
    docsets: Vec<DocsetConfig>,
}

#[derive(Debug, Deserialize)]
struct Catalog {
    docsets: Vec<DocsetConfig>,
}

/// Resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of all persisted state.
    pub data_dir: PathBuf,
    pub crawl: CrawlSettings,
    pub search: SearchDefaults,
    /// Known docsets: the built-in catalog merged with user entries.
    pub docsets: Vec<DocsetConfig>,
}

impl Config {
    /// Load config from `$DOCU_CONFIG` or the platform config dir, or use
    /// defaults when no file exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or parsed, or a
    /// docset name is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let file = match Self::config_path() {
            Some(path) if path.exists() => read_config_file(&path)?,
            _ => ConfigFile::default(),
        };

        let data_dir_override = std::env::var_os(DATA_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Self::resolve(file, data_dir_override)
    }

    /// Build a config from `config.toml` contents, ignoring the environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the contents do not parse or a docset name
    /// is invalid.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        Self::resolve(file, None)
    }

    fn resolve(file: ConfigFile, data_dir_override: Option<PathBuf>) -> Result<Self, ConfigError> {
        let data_dir = data_dir_override
            .or_else(|| file.data_dir.as_deref().map(expand_tilde))
            .unwrap_or_else(default_data_dir);

        let mut docsets = builtin_docsets()?;
        for user in file.docsets {
            match docsets.iter_mut().find(|d| d.name == user.name) {
                Some(existing) => *existing = user,
                None => docsets.push(user),
            }
        }

        for docset in &docsets {
            validate_name(&docset.name).map_err(|source| ConfigError::InvalidDocset {
                name: docset.name.clone(),
                source,
            })?;
        }

        let mut crawl = file.crawl;
        crawl.concurrency = crawl.concurrency.max(1);

        Ok(Self {
            data_dir,
            crawl,
            search: file.search,
            docsets,
        })
    }

    /// Replace the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Location of `config.toml`: `$DOCU_CONFIG`, else the platform config dir.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(path));
        }

        ProjectDirs::from("", "", "docu").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Directory holding per-docset metadata and documents.
    #[must_use]
    pub fn docsets_dir(&self) -> PathBuf {
        self.data_dir.join("docsets")
    }

    /// Directory holding one search index per docset.
    #[must_use]
    pub fn index_dir(&self) -> PathBuf {
        self.data_dir.join("index")
    }

    /// Look up a known docset by name.
    #[must_use]
    pub fn docset(&self, name: &str) -> Option<&DocsetConfig> {
        self.docsets.iter().find(|d| d.name == name)
    }

    #[must_use]
    pub fn docset_names(&self) -> Vec<&str> {
        self.docsets.iter().map(|d| d.name.as_str()).collect()
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn builtin_docsets() -> Result<Vec<DocsetConfig>, ConfigError> {
    toml::from_str::<Catalog>(BUILTIN_CATALOG)
        .map(|catalog| catalog.docsets)
        .map_err(ConfigError::Catalog)
}

fn default_data_dir() -> PathBuf {
    BaseDirs::new().map_or_else(
        || PathBuf::from(".docu"),
        |dirs| dirs.home_dir().join(".docu"),
    )
}

/// Expand ~ to the user's home directory.
#[must_use]
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(base_dirs) = BaseDirs::new()
    {
        return base_dirs.home_dir().join(rest);
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_parses() {
        let docsets = builtin_docsets().unwrap();

        assert!(docsets.len() >= 5);
        for docset in &docsets {
            validate_name(&docset.name).unwrap();
            assert!(!docset.entry_points.is_empty(), "{} has no entry points", docset.name);
            assert!(!docset.selectors.content.is_empty());
        }
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();

        assert!(config.data_dir.ends_with(".docu"));
        assert_eq!(config.crawl.concurrency, 4);
        assert_eq!(config.crawl.timeout_secs, 10);
        assert!(config.crawl.user_agent.starts_with("docu/"));
        assert!(config.crawl.proxy);
        assert_eq!(config.search.limit, 10);
        assert!(config.search.min_score.abs() < f32::EPSILON);
        assert!(config.docset("react").is_some());
    }

    #[test]
    fn file_values_override_defaults() {
        let config = Config::from_toml(
            r#"
            data_dir = "/tmp/docu-data"

            [crawl]
            concurrency = 0
            timeout_secs = 3
            proxy = false

            [search]
            limit = 25
            min_score = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/docu-data"));
        assert_eq!(config.crawl.concurrency, 1);
        assert_eq!(config.crawl.timeout_secs, 3);
        assert!(!config.crawl.proxy);
        assert_eq!(config.search.limit, 25);
        assert!((config.search.min_score - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.docsets_dir(), PathBuf::from("/tmp/docu-data/docsets"));
        assert_eq!(config.index_dir(), PathBuf::from("/tmp/docu-data/index"));
    }

    #[test]
    fn user_docsets_override_and_append() {
        let config = Config::from_toml(
            r##"
            [[docsets]]
            name = "react"
            description = "Local mirror"
            base_url = "http://localhost"
            entry_points = ["http://localhost/learn"]
            [docsets.selectors]
            title = "h1"
            content = "main"

            [[docsets]]
            name = "internal-wiki"
            description = "Team wiki"
            base_url = "http://wiki.local"
            entry_points = ["http://wiki.local/start"]
            [docsets.selectors]
            title = "h1"
            content = "#content"
            exclude = "nav"
            "##,
        )
        .unwrap();

        let builtin_count = builtin_docsets().unwrap().len();
        assert_eq!(config.docsets.len(), builtin_count + 1);

        let react = config.docset("react").unwrap();
        assert_eq!(react.description, "Local mirror");
        assert!(react.selectors.exclude.is_empty());

        assert_eq!(config.docset_names().last(), Some(&"internal-wiki"));
    }

    #[test]
    fn invalid_docset_name_is_rejected() {
        let result = Config::from_toml(
            r#"
            [[docsets]]
            name = "../escape"
            description = ""
            base_url = ""
            entry_points = []
            [docsets.selectors]
            title = "h1"
            content = "main"
            "#,
        );

        assert!(matches!(result, Err(ConfigError::InvalidDocset { name, .. }) if name == "../escape"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            Config::from_toml("data_dir = ["),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn with_data_dir_replaces_root() {
        let config = Config::from_toml("").unwrap().with_data_dir("/srv/docu");
        assert_eq!(config.index_dir(), PathBuf::from("/srv/docu/index"));
    }

    #[test]
    fn expand_tilde_leaves_plain_paths() {
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
        assert_eq!(expand_tilde("relative"), PathBuf::from("relative"));
        if let Some(dirs) = BaseDirs::new() {
            assert_eq!(expand_tilde("~/docs"), dirs.home_dir().join("docs"));
        }
    }
}
