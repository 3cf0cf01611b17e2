//! Fallback extraction path for HTML bodies.
//!
//! Finds the page title and main content region through prioritized selector
//! lists, then pulls headings, code blocks and prose from inside that region.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use doccrawl_shared::{CodeSample, Heading};

use super::{ExtractOptions, Extracted, UNKNOWN_LANGUAGE};

/// Title candidates, highest priority first.
const TITLE_SELECTORS: &[&str] = &[
    "main h1",
    "article h1",
    "h1",
    "title",
    r#"meta[property="og:title"]"#,
];

/// Content region candidates, highest priority first; `body` is the last resort.
const CONTENT_SELECTORS: &[&str] = &[r#"[role="main"]"#, "main", "article", "body"];

/// Page chrome whose text is never prose.
const CHROME_TAGS: &[&str] = &[
    "nav", "header", "footer", "aside", "script", "style", "noscript",
];

static HEADING_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2, h3, h4, h5, h6").expect("heading selector"));
static PRE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("pre").expect("pre selector"));
static CODE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("code").expect("code selector"));
static PARAGRAPH_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("paragraph selector"));
static LINK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("link selector"));

pub(crate) fn extract(body: &str, base: &Url, opts: &ExtractOptions) -> Extracted {
    let doc = Html::parse_document(body);

    let mut out = Extracted {
        title: find_title(&doc),
        links: collect_links(&doc, base).into_iter().collect(),
        ..Default::default()
    };

    let Some(region) = find_content_region(&doc) else {
        debug!(%base, "no content region found, producing empty record");
        return out;
    };

    for el in region.select(&HEADING_SEL).filter(|el| !in_chrome(el)) {
        let text = element_text(&el);
        if text.is_empty() {
            continue;
        }
        let level = el.value().name()[1..].parse().unwrap_or(2);
        out.headings.push(Heading { level, text });
    }

    for pre in region.select(&PRE_SEL).filter(|el| !in_chrome(el)) {
        let code = pre.text().collect::<String>();
        let code = code.trim_matches('\n').to_string();
        if code.trim().is_empty() {
            continue;
        }
        out.code_samples.push(CodeSample {
            language: code_language(&pre),
            code,
        });
    }

    for p in region.select(&PARAGRAPH_SEL).filter(|el| !in_chrome(el)) {
        let text = element_text(&p);
        if text.chars().count() > opts.min_paragraph_chars {
            out.paragraphs.push(text);
        }
    }

    out
}

/// First non-empty title among [`TITLE_SELECTORS`].
fn find_title(doc: &Html) -> Option<String> {
    TITLE_SELECTORS.iter().find_map(|sel_str| {
        let sel = Selector::parse(sel_str).ok()?;
        doc.select(&sel).find_map(|el| {
            let text = match el.value().attr("content") {
                Some(content) if el.value().name() == "meta" => content.trim().to_string(),
                _ => element_text(&el),
            };
            (!text.is_empty()).then_some(text)
        })
    })
}

/// First element matching [`CONTENT_SELECTORS`].
fn find_content_region(doc: &Html) -> Option<ElementRef<'_>> {
    CONTENT_SELECTORS.iter().find_map(|sel_str| {
        let sel = Selector::parse(sel_str).ok()?;
        doc.select(&sel).next()
    })
}

/// Whether `el` sits inside navigation or other page chrome.
fn in_chrome(el: &ElementRef) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| CHROME_TAGS.contains(&a.value().name()))
}

/// Language from a `language-*` / `lang-*` class on `<code>` or `<pre>`.
fn code_language(pre: &ElementRef) -> String {
    let code_classes = pre
        .select(&CODE_SEL)
        .next()
        .into_iter()
        .flat_map(|code| code.value().classes());

    code_classes
        .chain(pre.value().classes())
        .find_map(|class| {
            class
                .strip_prefix("language-")
                .or_else(|| class.strip_prefix("lang-"))
        })
        .filter(|lang| !lang.is_empty())
        .map(str::to_lowercase)
        .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string())
}

/// Extract all links from a document, resolved against the base URL.
fn collect_links(doc: &Html, base: &Url) -> Vec<String> {
    let mut links = Vec::new();

    for el in doc.select(&LINK_SEL) {
        if let Some(href) = el.value().attr("href") {
            let href = href.trim();
            if href.is_empty()
                || href.starts_with('#')
                || href.starts_with("javascript:")
                || href.starts_with("mailto:")
            {
                continue;
            }

            if let Ok(mut resolved) = base.join(href) {
                if !matches!(resolved.scheme(), "http" | "https") {
                    continue;
                }
                resolved.set_fragment(None);
                links.push(resolved.to_string());
            }
        }
    }

    links
}

/// Element text with whitespace collapsed.
fn element_text(el: &ElementRef) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}
