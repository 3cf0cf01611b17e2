//! Structured extraction path for native Markdown bodies.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use doccrawl_shared::{CodeSample, Heading, LinkPolicy, has_markdown_suffix};

use super::{ExtractOptions, Extracted, UNKNOWN_LANGUAGE};

/// ATX heading: `## Text`, optional closing hashes.
static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(#{1,6})\s+(.+?)(?:\s+#+)?\s*$").expect("heading regex")
});

/// Opening code fence with optional info string.
static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(`{3,}|~{3,})\s*([^\s`]*)").expect("fence regex")
});

/// Inline link or image: `[text](target "title")`.
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(!?)\[([^\]]*)\]\(\s*<?([^)\s>]+)>?(?:\s+"[^"]*")?\s*\)"#).expect("link regex")
});

/// An open fenced block being collected.
struct Fence {
    marker: char,
    width: usize,
    language: String,
    lines: Vec<String>,
}

impl Fence {
    fn is_closed_by(&self, line: &str) -> bool {
        let t = line.trim();
        t.len() >= self.width && t.chars().all(|c| c == self.marker)
    }

    fn into_sample(self) -> CodeSample {
        CodeSample {
            language: self.language,
            code: self.lines.join("\n"),
        }
    }
}

pub(crate) fn extract(body: &str, base: &Url, opts: &ExtractOptions) -> Extracted {
    let mut out = Extracted::default();
    let mut fence: Option<Fence> = None;
    let mut paragraph: Vec<&str> = Vec::new();

    for line in body.lines() {
        if let Some(open) = fence.as_mut() {
            if open.is_closed_by(line) {
                if let Some(done) = fence.take() {
                    out.code_samples.push(done.into_sample());
                }
            } else {
                open.lines.push(line.to_string());
            }
            continue;
        }

        if let Some(caps) = FENCE_RE.captures(line) {
            flush_paragraph(&mut paragraph, &mut out, opts);
            let marker = &caps[1];
            let language = match &caps[2] {
                "" => UNKNOWN_LANGUAGE.to_string(),
                lang => lang.to_lowercase(),
            };
            fence = Some(Fence {
                marker: marker.chars().next().unwrap_or('`'),
                width: marker.len(),
                language,
                lines: Vec::new(),
            });
            continue;
        }

        collect_links(line, base, opts.link_policy, &mut out);

        if let Some(caps) = HEADING_RE.captures(line) {
            flush_paragraph(&mut paragraph, &mut out, opts);
            let level = caps[1].len() as u8;
            let text = plain_text(&caps[2]);
            if text.is_empty() {
                continue;
            }
            if level == 1 {
                if out.title.is_none() {
                    out.title = Some(text);
                }
            } else {
                out.headings.push(Heading { level, text });
            }
            continue;
        }

        if line.trim().is_empty() {
            flush_paragraph(&mut paragraph, &mut out, opts);
        } else {
            paragraph.push(line.trim());
        }
    }

    flush_paragraph(&mut paragraph, &mut out, opts);
    // An unterminated fence runs to the end of the document.
    if let Some(open) = fence {
        out.code_samples.push(open.into_sample());
    }

    out
}

/// Close the current block; keep it only if it is long enough to be prose.
fn flush_paragraph(lines: &mut Vec<&str>, out: &mut Extracted, opts: &ExtractOptions) {
    if lines.is_empty() {
        return;
    }
    let text = lines.join("\n");
    lines.clear();
    if text.chars().count() > opts.min_paragraph_chars {
        out.paragraphs.push(text);
    }
}

/// Record cross-references on `line` that satisfy the link policy.
fn collect_links(line: &str, base: &Url, policy: LinkPolicy, out: &mut Extracted) {
    for caps in LINK_RE.captures_iter(line) {
        if &caps[1] == "!" {
            continue;
        }
        let target = &caps[3];
        if target.starts_with('#') || target.starts_with("mailto:") {
            continue;
        }
        let Ok(mut resolved) = base.join(target) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        resolved.set_fragment(None);

        let keep = match policy {
            LinkPolicy::MarkdownOnly => has_markdown_suffix(&resolved),
            LinkPolicy::AllSameOrigin => true,
        };
        if keep {
            out.links.insert(resolved.to_string());
        }
    }
}

/// Heading text with inline links and code markers reduced to plain text.
fn plain_text(raw: &str) -> String {
    let text = LINK_RE.replace_all(raw, "$2");
    text.replace('`', "").trim().to_string()
}
