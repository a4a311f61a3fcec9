//! Tantivy-backed text index with BM25 ranking, one index per docset.
//!
//! Each docset gets its own index directory. Handles are cheap to open and
//! are meant to live for a single operation: fetch opens one for writing,
//! search opens one per docset and drops it before moving on.

use std::io::ErrorKind;
use std::ops::Range;
use std::path::{Path, PathBuf};

use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::{BooleanQuery, BoostQuery, Occur, Query, TermQuery};
use tantivy::schema::{
    Field, IndexRecordOption, STORED, STRING, Schema, TextFieldIndexing, TextOptions, Value,
};
use tantivy::snippet::SnippetGenerator;
use tantivy::tokenizer::{
    Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, TextAnalyzer, TokenStream,
};
use tantivy::{
    Index, IndexReader, IndexSettings, IndexWriter, ReloadPolicy, TantivyDocument, Term,
};
use tracing::debug;

use crate::docset::Document;
use crate::search::SearchResult;

/// Heap size for the index writer (50MB).
const WRITER_HEAP_SIZE: usize = 50_000_000;

/// Name under which the stemming analyzer is registered.
const TOKENIZER: &str = "docu_en_stem";

/// Maximum snippet length in characters.
const SNIPPET_MAX_CHARS: usize = 160;

const TITLE_BOOST: f32 = 2.0;
const HEADINGS_BOOST: f32 = 1.5;
const CONTENT_BOOST: f32 = 1.0;

/// Errors raised by a docset index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("No index found for docset '{0}'")]
    NotFound(String),

    #[error("Index for docset '{0}' is open read-only")]
    ReadOnly(String),

    #[error("Failed to open index directory {path}: {reason}")]
    Directory { path: PathBuf, reason: String },

    #[error("Index error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Index mode controls whether the handle can write to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    /// Fetch path: a missing index is created.
    ReadWrite,
    /// Query path: a missing index is an `IndexError::NotFound`.
    ReadOnly,
}

/// Schema field handles for the index.
#[derive(Debug, Clone, Copy)]
struct SchemaFields {
    id: Field,
    title: Field,
    url: Field,
    content: Field,
    headings: Field,
    docset: Field,
}

impl SchemaFields {
    fn resolve(schema: &Schema) -> Result<Self, IndexError> {
        Ok(Self {
            id: schema.get_field("id")?,
            title: schema.get_field("title")?,
            url: schema.get_field("url")?,
            content: schema.get_field("content")?,
            headings: schema.get_field("headings")?,
            docset: schema.get_field("docset")?,
        })
    }
}

/// An open handle on one docset's index.
pub struct TextIndex {
    docset: String,
    index: Index,
    fields: SchemaFields,
    mode: IndexMode,
}

impl TextIndex {
    /// Build the index schema.
    ///
    /// Fields:
    /// - `id`: exact-match key used for replace-on-insert, stored
    /// - `title`, `headings`, `content`: stemmed full text, stored
    /// - `url`, `docset`: stored for result display
    fn build_schema() -> Schema {
        let mut builder = Schema::builder();

        let text = TextOptions::default()
            .set_indexing_options(
                TextFieldIndexing::default()
                    .set_tokenizer(TOKENIZER)
                    .set_index_option(IndexRecordOption::WithFreqsAndPositions),
            )
            .set_stored();

        builder.add_text_field("id", STRING | STORED);
        builder.add_text_field("title", text.clone());
        builder.add_text_field("url", STRING | STORED);
        builder.add_text_field("content", text.clone());
        builder.add_text_field("headings", text);
        builder.add_text_field("docset", STRING | STORED);

        builder.build()
    }

    fn register_tokenizer(index: &Index) {
        let analyzer = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(40))
            .filter(LowerCaser)
            .filter(Stemmer::new(Language::English))
            .build();
        index.tokenizers().register(TOKENIZER, analyzer);
    }

    /// Directory holding the index of a docset.
    #[must_use]
    pub fn path_for(index_root: &Path, docset: &str) -> PathBuf {
        index_root.join(docset)
    }

    /// Check whether an index has been created for the docset.
    #[must_use]
    pub fn exists(index_root: &Path, docset: &str) -> bool {
        let path = Self::path_for(index_root, docset);
        path.is_dir()
            && MmapDirectory::open(&path)
                .ok()
                .and_then(|directory| Index::exists(&directory).ok())
                .unwrap_or(false)
    }

    /// Open the index of a docset.
    ///
    /// In `ReadWrite` mode a missing index is created; opening an existing
    /// index again is harmless.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::NotFound` for a missing index in `ReadOnly` mode,
    /// or an error if the index cannot be opened or created.
    pub fn open(index_root: &Path, docset: &str, mode: IndexMode) -> Result<Self, IndexError> {
        let path = Self::path_for(index_root, docset);

        let index = if Self::exists(index_root, docset) {
            Index::open(open_directory(&path)?)?
        } else if mode == IndexMode::ReadWrite {
            std::fs::create_dir_all(&path)?;
            Index::create(
                open_directory(&path)?,
                Self::build_schema(),
                IndexSettings::default(),
            )?
        } else {
            return Err(IndexError::NotFound(docset.to_string()));
        };

        debug!(docset, ?mode, path = %path.display(), "opened index");
        Self::from_index(index, docset, mode)
    }

    /// Create an in-memory index (for tests).
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be resolved.
    pub fn open_in_ram(docset: &str) -> Result<Self, IndexError> {
        let index = Index::create_in_ram(Self::build_schema());
        Self::from_index(index, docset, IndexMode::ReadWrite)
    }

    fn from_index(index: Index, docset: &str, mode: IndexMode) -> Result<Self, IndexError> {
        Self::register_tokenizer(&index);
        let fields = SchemaFields::resolve(&index.schema())?;

        Ok(Self {
            docset: docset.to_string(),
            index,
            fields,
            mode,
        })
    }

    #[must_use]
    pub fn docset(&self) -> &str {
        &self.docset
    }

    /// Insert documents, replacing any entry that has the same id.
    ///
    /// All documents are committed together.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is read-only, another writer holds the
    /// index lock, or the commit fails.
    pub fn bulk_insert(&self, documents: &[Document]) -> Result<usize, IndexError> {
        self.write(documents, false)
    }

    /// Replace the entire index content with `documents` in one commit.
    ///
    /// # Errors
    ///
    /// Same as [`TextIndex::bulk_insert`].
    pub fn rebuild(&self, documents: &[Document]) -> Result<usize, IndexError> {
        self.write(documents, true)
    }

    fn write(&self, documents: &[Document], clear: bool) -> Result<usize, IndexError> {
        if self.mode == IndexMode::ReadOnly {
            return Err(IndexError::ReadOnly(self.docset.clone()));
        }

        // Tantivy's directory lock makes a second concurrent writer fail here.
        let mut writer: IndexWriter = self.index.writer_with_num_threads(1, WRITER_HEAP_SIZE)?;

        if clear {
            writer.delete_all_documents()?;
        }

        for doc in documents {
            writer.delete_term(Term::from_field_text(self.fields.id, &doc.id));
            writer.add_document(self.to_tantivy(doc))?;
        }

        writer.commit()?;
        writer.wait_merging_threads()?;

        debug!(docset = %self.docset, count = documents.len(), clear, "committed documents");
        Ok(documents.len())
    }

    fn to_tantivy(&self, doc: &Document) -> TantivyDocument {
        let mut tantivy_doc = TantivyDocument::new();
        tantivy_doc.add_text(self.fields.id, &doc.id);
        tantivy_doc.add_text(self.fields.title, &doc.title);
        tantivy_doc.add_text(self.fields.url, &doc.url);
        tantivy_doc.add_text(self.fields.content, &doc.content);
        tantivy_doc.add_text(self.fields.headings, doc.headings.join("\n"));
        tantivy_doc.add_text(self.fields.docset, &self.docset);
        tantivy_doc
    }

    /// Number of documents currently committed.
    ///
    /// # Errors
    ///
    /// Returns an error if a reader cannot be created.
    pub fn len(&self) -> Result<u64, IndexError> {
        Ok(self.reader()?.searcher().num_docs())
    }

    /// A fresh reader per call; handles never outlive one operation.
    fn reader(&self) -> Result<IndexReader, IndexError> {
        Ok(self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?)
    }

    /// Whether the index holds no documents.
    ///
    /// # Errors
    ///
    /// Returns an error if a reader cannot be created.
    pub fn is_empty(&self) -> Result<bool, IndexError> {
        Ok(self.len()? == 0)
    }

    /// Run a ranked query.
    ///
    /// Every whitespace-separated term must match (AND) in the title,
    /// headings or content. Results scoring below `min_score` are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    pub fn query(
        &self,
        text: &str,
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>, IndexError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let Some(query) = self.build_query(text)? else {
            return Ok(Vec::new());
        };

        let searcher = self.reader()?.searcher();
        let top_docs = searcher.search(&query, &TopDocs::with_limit(limit))?;

        let mut snippets = SnippetGenerator::create(&searcher, &query, self.fields.content)?;
        snippets.set_max_num_chars(SNIPPET_MAX_CHARS);

        let mut results = Vec::with_capacity(top_docs.len());
        for (raw_score, address) in top_docs {
            let score = normalize_score(raw_score);
            if score < min_score {
                continue;
            }

            let doc: TantivyDocument = searcher.doc(address)?;
            let snippet = snippets.snippet_from_doc(&doc);
            let snippet = if snippet.fragment().trim().is_empty() {
                leading_excerpt(&extract_text(&doc, self.fields.content))
            } else {
                emphasize(snippet.fragment(), snippet.highlighted())
            };

            results.push(SearchResult {
                id: extract_text(&doc, self.fields.id),
                title: extract_text(&doc, self.fields.title),
                url: extract_text(&doc, self.fields.url),
                snippet,
                score,
                docset: extract_text(&doc, self.fields.docset),
            });
        }

        Ok(results)
    }

    /// Build the conjunctive query, or `None` if no term survives analysis.
    ///
    /// Terms go through the field analyzer instead of the query parser, so
    /// characters the parser treats as syntax are plain text here.
    fn build_query(&self, text: &str) -> Result<Option<BooleanQuery>, IndexError> {
        let mut analyzer = self.index.tokenizer_for_field(self.fields.content)?;
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        for word in text.split_whitespace() {
            let lowered = word.to_lowercase();
            let mut stream = analyzer.token_stream(&lowered);
            while stream.advance() {
                clauses.push((Occur::Must, self.match_any_field(&stream.token().text)));
            }
        }

        if clauses.is_empty() {
            Ok(None)
        } else {
            Ok(Some(BooleanQuery::new(clauses)))
        }
    }

    fn match_any_field(&self, token: &str) -> Box<dyn Query> {
        let clauses: Vec<(Occur, Box<dyn Query>)> = [
            (self.fields.title, TITLE_BOOST),
            (self.fields.headings, HEADINGS_BOOST),
            (self.fields.content, CONTENT_BOOST),
        ]
        .into_iter()
        .map(|(field, boost)| {
            let term_query = TermQuery::new(
                Term::from_field_text(field, token),
                IndexRecordOption::WithFreqs,
            );
            let boosted: Box<dyn Query> = Box::new(BoostQuery::new(Box::new(term_query), boost));
            (Occur::Should, boosted)
        })
        .collect();

        Box::new(BooleanQuery::new(clauses))
    }

    /// Release the handle.
    pub fn close(self) {
        debug!(docset = %self.docset, "closed index");
    }

    /// Delete the index of a docset. Missing indexes are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the index directory cannot be removed.
    pub fn delete(index_root: &Path, docset: &str) -> Result<(), IndexError> {
        match std::fs::remove_dir_all(Self::path_for(index_root, docset)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for TextIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextIndex")
            .field("docset", &self.docset)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

fn open_directory(path: &Path) -> Result<MmapDirectory, IndexError> {
    MmapDirectory::open(path).map_err(|e| IndexError::Directory {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Map a raw ranking score onto the non-negative, higher-is-better scale
/// shared by all docsets.
fn normalize_score(raw: f32) -> f32 {
    if raw.is_finite() { raw.max(0.0) } else { 0.0 }
}

/// Wrap highlighted ranges in `**` and collapse whitespace.
fn emphasize(fragment: &str, highlighted: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(fragment.len() + highlighted.len() * 4);
    let mut cursor = 0;

    for range in highlighted {
        if range.start < cursor {
            continue;
        }
        let (Some(before), Some(term)) = (
            fragment.get(cursor..range.start),
            fragment.get(range.clone()),
        ) else {
            continue;
        };

        out.push_str(before);
        let term = term.trim();
        if !term.is_empty() {
            out.push_str("**");
            out.push_str(term);
            out.push_str("**");
        }
        cursor = range.end;
    }

    out.push_str(fragment.get(cursor..).unwrap_or_default());
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn leading_excerpt(content: &str) -> String {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(SNIPPET_MAX_CHARS).collect()
}

fn extract_text(doc: &TantivyDocument, field: Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}
