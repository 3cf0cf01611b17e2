//! Cheap body sniffing shared by manifest validation and extraction routing.

/// How many leading characters are inspected for markup-root signatures.
pub const SNIFF_WINDOW: usize = 500;

/// Signatures that mark an HTML document root.
const MARKUP_SIGNATURES: &[&str] = &["<!doctype html", "<html"];

/// Whether the leading portion of `body` looks like an HTML page rather than Markdown.
pub fn is_markup_shell(body: &str) -> bool {
    let head: String = body
        .trim_start()
        .chars()
        .take(SNIFF_WINDOW)
        .collect::<String>()
        .to_ascii_lowercase();
    MARKUP_SIGNATURES.iter().any(|sig| head.contains(sig))
}

/// Whether `body` carries Markdown structure: a heading line or a list bullet.
pub fn has_markdown_structure(body: &str) -> bool {
    body.lines().map(str::trim_start).any(|line| {
        line.starts_with('#') || line.starts_with("- ") || line.starts_with("* ")
    })
}
