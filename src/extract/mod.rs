//! HTML to document extraction driven by per-docset CSS selectors.
//!
//! A page is parsed once, excluded subtrees are detached, and the first
//! content region is rendered to markdown-ish text by dispatching on tag
//! names. Pages whose markup defeats the tag heuristics fall back to a
//! sentence sampler over the raw region text.

use std::ops::RangeInclusive;

use chrono::Utc;
use scraper::{ElementRef, Html, Node, Selector};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::docset::{Document, DocumentId, Selectors};

/// Paragraphs shorter than this are treated as boilerplate.
const MIN_PARAGRAPH_CHARS: usize = 20;

/// Code blocks longer than this are dropped rather than fenced.
const MAX_CODE_CHARS: usize = 2_000;

/// Length band for text of unrecognized elements.
const DEFAULT_TEXT_BAND: RangeInclusive<usize> = 40..=1_000;

/// Structured output shorter than this triggers the sentence fallback.
const MIN_CONTENT_CHARS: usize = 30;

/// Length band for sentences kept by the fallback.
const FALLBACK_SENTENCE_BAND: RangeInclusive<usize> = 10..=300;

/// Number of sentences kept by the fallback.
const FALLBACK_SENTENCES: usize = 5;

/// Extensions stripped from the last URL segment when deriving a title.
const PAGE_EXTENSIONS: [&str; 3] = ["html", "htm", "php"];

/// Phrasing elements. A container holding any of these, or bare text, is
/// rendered as one block of text instead of being descended into.
const INLINE_TAGS: [&str; 22] = [
    "a", "abbr", "b", "br", "cite", "code", "em", "i", "img", "kbd", "mark", "q", "s", "samp",
    "small", "span", "strong", "sub", "sup", "time", "u", "var",
];

/// Errors raised while preparing an extractor.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid {kind} selector '{selector}': {reason}")]
    InvalidSelector {
        kind: &'static str,
        selector: String,
        reason: String,
    },
}

/// How a single element is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Heading(usize),
    Paragraph,
    List,
    ListItem,
    Code,
    Quote,
    Container,
    Skip,
    Default,
}

impl Strategy {
    fn for_tag(tag: &str) -> Self {
        match tag {
            "h1" => Self::Heading(1),
            "h2" => Self::Heading(2),
            "h3" => Self::Heading(3),
            "h4" => Self::Heading(4),
            "h5" => Self::Heading(5),
            "h6" => Self::Heading(6),
            "p" => Self::Paragraph,
            "ul" | "ol" => Self::List,
            "li" => Self::ListItem,
            "pre" | "code" => Self::Code,
            "blockquote" => Self::Quote,
            "div" | "section" | "article" | "main" => Self::Container,
            "script" | "style" | "noscript" | "template" => Self::Skip,
            _ => Self::Default,
        }
    }
}

/// Extracts normalized documents from raw HTML using compiled selectors.
#[derive(Debug)]
pub struct ContentExtractor {
    title: Selector,
    content: Selector,
    exclude: Option<Selector>,
}

impl ContentExtractor {
    /// Compile the selectors of a docset.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::InvalidSelector` if any selector does not parse.
    pub fn new(selectors: &Selectors) -> Result<Self, ExtractError> {
        let exclude = if selectors.exclude.trim().is_empty() {
            None
        } else {
            Some(compile("exclude", &selectors.exclude)?)
        };

        Ok(Self {
            title: compile("title", &selectors.title)?,
            content: compile("content", &selectors.content)?,
            exclude,
        })
    }

    /// Extract the documents contained in one page.
    ///
    /// Returns an empty list when no content region matches or the region
    /// renders to nothing.
    #[must_use]
    pub fn extract(&self, url: &str, html: &str) -> Vec<Document> {
        let mut page = Html::parse_document(html);
        self.remove_excluded(&mut page);

        let Some(region) = page.root_element().select(&self.content).next() else {
            debug!(url, "no content region matched");
            return Vec::new();
        };

        let content = render_region(region);
        if content.is_empty() {
            debug!(url, "content region is empty");
            return Vec::new();
        }

        let headings = self.collect_headings(&page);
        let title = headings
            .first()
            .cloned()
            .unwrap_or_else(|| title_from_url(url));

        vec![Document {
            id: DocumentId::from_url(url).to_string(),
            title,
            url: url.to_string(),
            content,
            headings,
            last_updated: Utc::now(),
        }]
    }

    fn remove_excluded(&self, page: &mut Html) {
        let Some(exclude) = &self.exclude else {
            return;
        };

        let ids: Vec<_> = page.root_element().select(exclude).map(|el| el.id()).collect();
        for id in ids {
            if let Some(mut node) = page.tree.get_mut(id) {
                node.detach();
            }
        }
    }

    fn collect_headings(&self, page: &Html) -> Vec<String> {
        let mut headings: Vec<String> = Vec::new();
        for element in page.root_element().select(&self.title) {
            let text = inline_text(element);
            if !text.is_empty() && !headings.contains(&text) {
                headings.push(text);
            }
        }
        headings
    }
}

fn compile(kind: &'static str, selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|e| ExtractError::InvalidSelector {
        kind,
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn render_region(region: ElementRef<'_>) -> String {
    let mut fragments = Vec::new();
    render_children(region, &mut fragments);
    let structured = normalize_whitespace(&fragments.join("\n\n"));

    if char_len(&structured) >= MIN_CONTENT_CHARS {
        return structured;
    }

    let fallback = sentence_fallback(&visible_text(region));
    if fallback.is_empty() {
        structured
    } else {
        debug!(
            structured_chars = char_len(&structured),
            "using sentence fallback"
        );
        fallback
    }
}

fn render_children(element: ElementRef<'_>, out: &mut Vec<String>) {
    for child in element.children().filter_map(ElementRef::wrap) {
        render_element(child, out);
    }
}

fn render_element(element: ElementRef<'_>, out: &mut Vec<String>) {
    match Strategy::for_tag(element.value().name()) {
        Strategy::Heading(level) => {
            let text = inline_text(element);
            if !text.is_empty() {
                out.push(format!("{} {text}", "#".repeat(level)));
            }
        }
        Strategy::Paragraph => {
            let text = inline_text(element);
            if char_len(&text) >= MIN_PARAGRAPH_CHARS {
                out.push(text);
            }
        }
        Strategy::List => {
            let items: Vec<String> = element
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|item| item.value().name() == "li")
                .map(inline_text)
                .filter(|text| !text.is_empty())
                .map(|text| format!("- {text}"))
                .collect();
            if !items.is_empty() {
                out.push(items.join("\n"));
            }
        }
        Strategy::ListItem => {
            let text = inline_text(element);
            if !text.is_empty() {
                out.push(format!("- {text}"));
            }
        }
        Strategy::Code => {
            let code = element.text().collect::<String>();
            let code = code.trim_matches('\n').trim_end();
            let len = char_len(code);
            if len > 0 && len <= MAX_CODE_CHARS {
                out.push(format!("```\n{code}\n```"));
            }
        }
        Strategy::Quote => {
            let text = inline_text(element);
            if !text.is_empty() {
                out.push(format!("> {text}"));
            }
        }
        Strategy::Container => {
            if has_block_layout(element) {
                render_children(element, out);
            } else {
                render_default(element, out);
            }
        }
        Strategy::Skip => {}
        Strategy::Default => render_default(element, out),
    }
}

/// True when a container only holds elements that render as blocks.
fn has_block_layout(element: ElementRef<'_>) -> bool {
    let mut has_elements = false;
    for child in element.children() {
        match child.value() {
            Node::Text(text) if !text.trim().is_empty() => return false,
            Node::Element(el) if INLINE_TAGS.contains(&el.name()) => return false,
            Node::Element(_) => has_elements = true,
            _ => {}
        }
    }
    has_elements
}

fn render_default(element: ElementRef<'_>, out: &mut Vec<String>) {
    let text = inline_text(element);
    if DEFAULT_TEXT_BAND.contains(&char_len(&text)) {
        out.push(text);
    }
}

/// Sample the first plausible sentences of unstructured text.
fn sentence_fallback(text: &str) -> String {
    let collapsed = collapse_whitespace(text);
    collapsed
        .split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|sentence| FALLBACK_SENTENCE_BAND.contains(&char_len(sentence)))
        .take(FALLBACK_SENTENCES)
        .collect::<Vec<_>>()
        .join(" ")
}

fn inline_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&visible_text(element))
}

/// Text of an element, leaving out scripts, styles and templates.
fn visible_text(element: ElementRef<'_>) -> String {
    let mut text = String::new();
    push_visible_text(element, &mut text);
    text
}

fn push_visible_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if Strategy::for_tag(el.name()) == Strategy::Skip => {}
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    push_visible_text(child, out);
                }
            }
            _ => {}
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse whitespace outside fenced code and squeeze blank-line runs.
fn normalize_whitespace(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut in_code = false;
    let mut previous_blank = true;

    for line in text.lines() {
        let fence = line.trim_start().starts_with("```");
        let line = if in_code && !fence {
            line.trim_end().to_string()
        } else {
            collapse_whitespace(line)
        };
        if fence {
            in_code = !in_code;
        }

        if line.is_empty() && !in_code {
            if !previous_blank {
                lines.push(String::new());
            }
            previous_blank = true;
        } else {
            lines.push(line);
            previous_blank = false;
        }
    }

    lines.join("\n").trim().to_string()
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Derive a readable title from the last path segment of a URL.
///
/// `https://example.com/guide/getting-started.html` becomes
/// "Getting Started". Falls back to the host, then to "Untitled".
#[must_use]
pub fn title_from_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return "Untitled".to_string();
    };

    let segment = parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(str::to_string))
        .or_else(|| {
            parsed
                .host_str()
                .and_then(|host| host.split('.').find(|label| *label != "www"))
                .map(str::to_string)
        });

    let Some(segment) = segment else {
        return "Untitled".to_string();
    };

    let stem = match segment.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty() && PAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) =>
        {
            stem
        }
        _ => segment.as_str(),
    };

    let words: Vec<String> = stem
        .split(['-', '_', ' ', '+'])
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect();

    if words.is_empty() {
        "Untitled".to_string()
    } else {
        words.join(" ")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
