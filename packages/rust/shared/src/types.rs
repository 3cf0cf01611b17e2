//! Core domain types produced by a crawl run.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ExtractionRecord
// ---------------------------------------------------------------------------

/// A heading below the page title, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    /// Heading level (2–6; level 1 is the page title).
    pub level: u8,
    /// Heading text with markup removed.
    pub text: String,
}

/// A code block and its declared language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSample {
    /// Language tag, or `unknown` when none was declared.
    pub language: String,
    /// Raw code, without fences.
    pub code: String,
}

/// Which extraction path produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionSource {
    /// The body was native Markdown.
    Markdown,
    /// The body was HTML and went through the content-area search.
    Html,
}

impl ExtractionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
        }
    }
}

impl std::fmt::Display for ExtractionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExtractionSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "markdown" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            other => Err(format!("unknown extraction source: {other}")),
        }
    }
}

/// Normalized content extracted from one fetched page.
///
/// Created once per successful fetch and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRecord {
    /// Canonical URL the page was requested from.
    pub url: String,
    /// Page title.
    pub title: String,
    /// Headings below the title, in document order.
    pub headings: Vec<Heading>,
    /// Prose paragraphs joined by blank lines.
    pub content: String,
    /// Code blocks in document order.
    pub code_samples: Vec<CodeSample>,
    /// Outbound links kept by the extractor.
    pub links: BTreeSet<String>,
    /// Extraction path used.
    pub source: ExtractionSource,
    /// When the page was fetched.
    pub fetched_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// CrawlSummary
// ---------------------------------------------------------------------------

/// End-of-run counters for a crawl.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlSummary {
    /// URLs admitted into the visited set.
    pub discovered: usize,
    /// Pages fetched successfully.
    pub fetched: usize,
    /// Records that passed the persistence filter.
    pub accepted: usize,
    /// Records rejected for too little content.
    pub rejected: usize,
    /// Fetch failures as `(url, message)`.
    pub failed: Vec<(String, String)>,
    /// Whether the URL list came from `llms.txt`.
    pub used_fast_path: bool,
    /// Wall-clock time of the run.
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

mod duration_millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}
