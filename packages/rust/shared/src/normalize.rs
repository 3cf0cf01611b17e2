//! URL canonicalization used for frontier deduplication.
//!
//! Every URL that enters the crawl goes through [`normalize_url`]. The canonical
//! form never carries a fragment, and always points at a Markdown document:
//! either the path already ends in `.md`, or `/index.html.md` is appended to it.

use url::Url;

use crate::error::{DocCrawlError, Result};

/// Path suffix identifying a Markdown document.
pub const MARKDOWN_SUFFIX: &str = ".md";

/// Suffix appended to paths that do not already point at a Markdown document.
pub const INDEX_SUFFIX: &str = "/index.html.md";

/// Parse and normalize an absolute URL string.
pub fn normalize(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| DocCrawlError::validation(format!("invalid URL '{raw}': {e}")))?;
    normalize_url(url)
}

/// Resolve `href` against `base` and normalize the result.
pub fn normalize_against(base: &Url, href: &str) -> Result<Url> {
    let url = base
        .join(href.trim())
        .map_err(|e| DocCrawlError::validation(format!("cannot resolve '{href}' against {base}: {e}")))?;
    normalize_url(url)
}

/// Canonicalize a parsed URL.
///
/// - the fragment is dropped (content must never follow a `#`)
/// - a path ending in `.md` is kept verbatim
/// - otherwise trailing `/` are trimmed and `/index.html.md` is appended
/// - the query string is left untouched
pub fn normalize_url(mut url: Url) -> Result<Url> {
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(DocCrawlError::validation(format!(
                "unsupported scheme '{other}' in {url}"
            )));
        }
    }
    if url.host_str().is_none() {
        return Err(DocCrawlError::validation(format!("URL has no host: {url}")));
    }

    url.set_fragment(None);

    if !has_markdown_suffix(&url) {
        let path = format!("{}{INDEX_SUFFIX}", url.path().trim_end_matches('/'));
        url.set_path(&path);
    }

    Ok(url)
}

/// Whether the URL path already names a Markdown document.
pub fn has_markdown_suffix(url: &Url) -> bool {
    url.path().ends_with(MARKDOWN_SUFFIX)
}
