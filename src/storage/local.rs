//! Local filesystem storage backend.
//!
//! Layout under the root:
//!
//! ```text
//! <root>/<docset>/metadata.json
//! <root>/<docset>/docs/<id>.json
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::docset::{DocsetMetadata, Document};
use crate::storage::{DocStore, StorageError};

const METADATA_FILE: &str = "metadata.json";
const DOCS_DIR: &str = "docs";
const STAGING_DIR: &str = "docs.staging";

/// Storage backend for local filesystem operations.
#[derive(Debug, Clone)]
pub struct LocalDocStore {
    root: PathBuf,
}

impl LocalDocStore {
    /// Create a new local store rooted at the given path.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn docset_dir(&self, docset: &str) -> PathBuf {
        self.root.join(docset)
    }

    fn metadata_path(&self, docset: &str) -> PathBuf {
        self.docset_dir(docset).join(METADATA_FILE)
    }
}

impl DocStore for LocalDocStore {
    fn list_installed(&self) -> Result<Vec<String>, StorageError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::ReadError(format!("{}: {e}", self.root.display())));
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| self.is_installed(name))
            .collect();

        names.sort();
        Ok(names)
    }

    fn is_installed(&self, docset: &str) -> bool {
        matches!(self.read_metadata(docset), Ok(Some(_)))
    }

    fn read_metadata(&self, docset: &str) -> Result<Option<DocsetMetadata>, StorageError> {
        let path = self.metadata_path(docset);

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::ReadError(format!("{}: {e}", path.display()))),
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| StorageError::ParseError(format!("{}: {e}", path.display())))
    }

    fn write_metadata(&self, metadata: &DocsetMetadata) -> Result<(), StorageError> {
        let dir = self.docset_dir(&metadata.name);
        create_dir(&dir)?;

        let contents = serde_json::to_string_pretty(metadata)
            .map_err(|e| StorageError::SerializeError(e.to_string()))?;

        // Write-then-rename so a reader never sees a half-written record.
        let path = dir.join(METADATA_FILE);
        let tmp = dir.join(format!("{METADATA_FILE}.tmp"));
        fs::write(&tmp, contents)
            .map_err(|e| StorageError::WriteError(format!("{}: {e}", tmp.display())))?;
        fs::rename(&tmp, &path)
            .map_err(|e| StorageError::WriteError(format!("{}: {e}", path.display())))
    }

    fn invalidate(&self, docset: &str) -> Result<(), StorageError> {
        let path = self.metadata_path(docset);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::WriteError(format!("remove {}: {e}", path.display()))),
        }
    }

    fn replace_documents(&self, docset: &str, documents: &[Document]) -> Result<(), StorageError> {
        let dir = self.docset_dir(docset);
        let staging = dir.join(STAGING_DIR);
        let target = dir.join(DOCS_DIR);

        remove_dir(&staging)?;
        create_dir(&staging)?;

        for doc in documents {
            let path = staging.join(format!("{}.json", doc.id));
            let contents = serde_json::to_string_pretty(doc)
                .map_err(|e| StorageError::SerializeError(e.to_string()))?;
            fs::write(&path, contents)
                .map_err(|e| StorageError::WriteError(format!("{}: {e}", path.display())))?;
        }

        remove_dir(&target)?;
        fs::rename(&staging, &target)
            .map_err(|e| StorageError::WriteError(format!("{}: {e}", target.display())))?;

        debug!(docset, count = documents.len(), "stored documents");
        Ok(())
    }

    fn read_documents(&self, docset: &str) -> Result<Vec<Document>, StorageError> {
        let dir = self.docset_dir(docset).join(DOCS_DIR);

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(dir.display().to_string()));
            }
            Err(e) => return Err(StorageError::ReadError(format!("{}: {e}", dir.display()))),
        };

        let mut documents = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| StorageError::ReadError(format!("{}: {e}", dir.display())))?
                .path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }

            let contents = fs::read_to_string(&path)
                .map_err(|e| StorageError::ReadError(format!("{}: {e}", path.display())))?;
            let doc: Document = serde_json::from_str(&contents)
                .map_err(|e| StorageError::ParseError(format!("{}: {e}", path.display())))?;
            documents.push(doc);
        }

        documents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(documents)
    }

    fn remove(&self, docset: &str) -> Result<(), StorageError> {
        remove_dir(&self.docset_dir(docset))
    }
}

fn create_dir(path: &Path) -> Result<(), StorageError> {
    fs::create_dir_all(path)
        .map_err(|e| StorageError::WriteError(format!("create dir {}: {e}", path.display())))
}

fn remove_dir(path: &Path) -> Result<(), StorageError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::WriteError(format!("remove {}: {e}", path.display()))),
    }
}
