//! `llms.txt` manifest parser.
//!
//! The manifest is a Markdown index (<https://llmstxt.org/>):
//! - Line 1: `# Title`
//! - Optional: `> Summary blockquote`
//! - Sections: `## Section Name` followed by link lists
//! - Links: `- [Link Name](url): Optional description`, or bare absolute URLs

use std::collections::HashSet;
use std::sync::LazyLock;

use doccrawl_shared::{
    DocCrawlError, Result, has_markdown_structure, is_markup_shell, normalize_against,
};
use regex::Regex;
use tracing::debug;
use url::Url;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Parsed representation of an `llms.txt` manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// The H1 title, if present.
    pub title: Option<String>,
    /// Canonical page URLs in document order, deduplicated.
    pub urls: Vec<Url>,
}

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

/// Matches `# Title` at the start of a line.
static H1_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#\s+(.+)$").expect("H1 regex"));

/// Matches `[Name](target)` with an optional `"title"`.
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\[[^\]]*\]\(\s*<?([^)\s>]+)>?(?:\s+"[^"]*")?\s*\)"#).expect("link regex")
});

/// Matches bare absolute http(s) URLs.
static BARE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s<>()\[\]"'`]+"#).expect("bare url regex")
});

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Reject bodies that are an HTML shell or carry no Markdown structure.
pub(crate) fn validate_manifest(body: &str) -> Result<()> {
    if body.trim().is_empty() {
        return Err(DocCrawlError::manifest("manifest is empty"));
    }
    if is_markup_shell(body) {
        return Err(DocCrawlError::manifest(
            "manifest looks like an HTML page, not Markdown",
        ));
    }
    if !has_markdown_structure(body) {
        return Err(DocCrawlError::manifest(
            "manifest has no headings or list bullets",
        ));
    }
    Ok(())
}

/// Parse a validated manifest, resolving every reference against `origin`.
pub(crate) fn parse_manifest(content: &str, origin: &Url) -> Manifest {
    let title = content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| H1_RE.captures(line))
        .map(|caps| caps[1].trim().to_string());

    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for target in references(content) {
        match normalize_against(origin, target) {
            Ok(url) => {
                if seen.insert(url.as_str().to_string()) {
                    urls.push(url);
                }
            }
            Err(e) => debug!(target, error = %e, "skipping manifest reference"),
        }
    }

    Manifest { title, urls }
}

/// Every link target and bare URL in `content`, in document order.
fn references(content: &str) -> Vec<&str> {
    let mut found: Vec<(usize, &str)> = Vec::new();
    let mut link_spans = Vec::new();

    for caps in LINK_RE.captures_iter(content) {
        if let (Some(whole), Some(target)) = (caps.get(0), caps.get(1)) {
            link_spans.push(whole.range());
            found.push((whole.start(), target.as_str()));
        }
    }

    for m in BARE_URL_RE.find_iter(content) {
        if link_spans.iter().any(|span| span.contains(&m.start())) {
            continue;
        }
        let url = m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']);
        found.push((m.start(), url));
    }

    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, target)| target).collect()
}
