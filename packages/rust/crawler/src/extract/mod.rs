//! Content extraction from fetched documents.
//!
//! A response is classified once into [`FetchedBody`] and then dispatched to
//! either the Markdown extractor or the HTML fallback extractor. Both produce
//! the same [`ExtractionRecord`] shape.

mod html;
mod markdown;

use std::collections::BTreeSet;

use tracing::{debug, instrument};

use doccrawl_shared::{
    CodeSample, CrawlConfig, DEFAULT_MIN_PARAGRAPH_CHARS, ExtractionRecord, ExtractionSource,
    Heading, LinkPolicy, has_markdown_suffix, is_markup_shell,
};

use crate::fetch::RawDocument;

/// Title used when a page has none.
const UNTITLED: &str = "Untitled";

/// Language tag for code blocks that declare none.
pub(crate) const UNKNOWN_LANGUAGE: &str = "unknown";

/// Tuning knobs for extraction.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Prose blocks must be longer than this many chars to be kept.
    pub min_paragraph_chars: usize,
    /// Which Markdown cross-references count as links.
    pub link_policy: LinkPolicy,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            min_paragraph_chars: DEFAULT_MIN_PARAGRAPH_CHARS,
            link_policy: LinkPolicy::default(),
        }
    }
}

impl From<&CrawlConfig> for ExtractOptions {
    fn from(config: &CrawlConfig) -> Self {
        Self {
            min_paragraph_chars: config.min_paragraph_chars,
            link_policy: config.link_policy,
        }
    }
}

/// A response body tagged with the extraction path it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchedBody<'a> {
    /// Native Markdown.
    Markdown(&'a str),
    /// HTML that needs a content-area search.
    Html(&'a str),
}

/// Decide which extraction path a document takes.
///
/// An HTML shell always goes to the fallback path, even when a `.md` URL was
/// requested (origins that redirect Markdown requests to an HTML page).
pub fn classify(doc: &RawDocument) -> FetchedBody<'_> {
    let body = doc.body.as_str();
    if is_markup_shell(body) {
        return FetchedBody::Html(body);
    }
    if has_markdown_suffix(&doc.final_url) || has_markdown_suffix(&doc.url) {
        return FetchedBody::Markdown(body);
    }
    match doc.content_type.as_deref() {
        Some(ct) if ct.contains("html") => FetchedBody::Html(body),
        _ => FetchedBody::Markdown(body),
    }
}

/// Fields common to both extraction paths.
#[derive(Debug, Default)]
pub(crate) struct Extracted {
    pub title: Option<String>,
    pub headings: Vec<Heading>,
    pub paragraphs: Vec<String>,
    pub code_samples: Vec<CodeSample>,
    pub links: BTreeSet<String>,
}

/// Produce an [`ExtractionRecord`] from a fetched document.
#[instrument(skip_all, fields(url = %doc.url))]
pub fn extract(doc: &RawDocument, opts: &ExtractOptions) -> ExtractionRecord {
    let (source, extracted) = match classify(doc) {
        FetchedBody::Markdown(body) => (
            ExtractionSource::Markdown,
            markdown::extract(body, &doc.final_url, opts),
        ),
        FetchedBody::Html(body) => (
            ExtractionSource::Html,
            html::extract(body, &doc.final_url, opts),
        ),
    };

    let record = ExtractionRecord {
        url: doc.url.to_string(),
        title: extracted.title.unwrap_or_else(|| UNTITLED.to_string()),
        headings: extracted.headings,
        content: extracted.paragraphs.join("\n\n"),
        code_samples: extracted.code_samples,
        links: extracted.links,
        source,
        fetched_at: doc.fetched_at,
    };

    debug!(
        %source,
        title = %record.title,
        headings = record.headings.len(),
        code_samples = record.code_samples.len(),
        links = record.links.len(),
        content_len = record.content.len(),
        "extracted page"
    );

    record
}
