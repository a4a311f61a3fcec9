//! Docset storage trait and implementations.
//!
//! A `DocStore` owns the on-disk truth about which docsets are installed:
//! a docset counts as installed only once its metadata record exists, and
//! that record is written last by a fetch.

pub mod local;

use crate::docset::{DocsetMetadata, Document};

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Failed to read: {0}")]
    ReadError(String),

    #[error("Failed to write: {0}")]
    WriteError(String),

    #[error("Failed to parse: {0}")]
    ParseError(String),

    #[error("Failed to serialize: {0}")]
    SerializeError(String),
}

/// Trait for docset storage backends.
pub trait DocStore: Send + Sync {
    /// Names of all installed docsets, sorted alphabetically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the storage root cannot be listed.
    fn list_installed(&self) -> Result<Vec<String>, StorageError>;

    /// Whether the docset has a readable metadata record.
    fn is_installed(&self, docset: &str) -> bool;

    /// Read the metadata record, or `None` if the docset is not installed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record exists but cannot be read or parsed.
    fn read_metadata(&self, docset: &str) -> Result<Option<DocsetMetadata>, StorageError>;

    /// Write the metadata record, marking the docset as installed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be written.
    fn write_metadata(&self, metadata: &DocsetMetadata) -> Result<(), StorageError>;

    /// Drop the metadata record so the docset no longer counts as installed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if an existing record cannot be removed.
    fn invalidate(&self, docset: &str) -> Result<(), StorageError>;

    /// Replace every stored document of the docset with `documents`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any document cannot be written.
    fn replace_documents(&self, docset: &str, documents: &[Document]) -> Result<(), StorageError>;

    /// Read every stored document of the docset, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if a document cannot be read or parsed.
    fn read_documents(&self, docset: &str) -> Result<Vec<Document>, StorageError>;

    /// Remove all stored state of the docset. Missing docsets are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if existing files cannot be removed.
    fn remove(&self, docset: &str) -> Result<(), StorageError>;
}
