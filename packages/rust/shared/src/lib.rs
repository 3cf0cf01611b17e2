//! Shared types, error model, URL normalization, and configuration for doccrawl.
//!
//! This crate is the foundation depended on by all other doccrawl crates.
//! It provides:
//! - [`DocCrawlError`]: the unified error type
//! - Domain types ([`ExtractionRecord`], [`CrawlSummary`])
//! - The URL normalizer ([`normalize`], [`normalize_url`])
//! - Body sniffing ([`is_markup_shell`]) used to route Markdown vs HTML
//! - Configuration ([`AppConfig`], [`CrawlConfig`], config loading)

pub mod config;
pub mod error;
pub mod normalize;
pub mod sniff;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CrawlConfig, CrawlPoliciesConfig, DEFAULT_MIN_CONTENT_CHARS,
    DEFAULT_MIN_PARAGRAPH_CHARS, DefaultsConfig, LinkPolicy, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{DocCrawlError, Result};
pub use normalize::{
    INDEX_SUFFIX, MARKDOWN_SUFFIX, has_markdown_suffix, normalize, normalize_against,
    normalize_url,
};
pub use sniff::{SNIFF_WINDOW, has_markdown_structure, is_markup_shell};
pub use types::{CodeSample, CrawlSummary, ExtractionRecord, ExtractionSource, Heading};
