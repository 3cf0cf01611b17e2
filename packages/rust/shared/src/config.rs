//! Application configuration for doccrawl.
//!
//! User config lives at `~/.doccrawl/doccrawl.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DocCrawlError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "doccrawl.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".doccrawl";

/// Default minimum content length (in chars) for a record to be persisted.
pub const DEFAULT_MIN_CONTENT_CHARS: usize = 50;

/// Default length a Markdown paragraph must exceed to count as prose.
pub const DEFAULT_MIN_PARAGRAPH_CHARS: usize = 20;

// ---------------------------------------------------------------------------
// Config structs (matching doccrawl.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Crawl policies.
    #[serde(default)]
    pub crawl_policies: CrawlPoliciesConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Number of concurrent fetch workers (1 = single-flow).
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Delay in ms each worker sleeps after a fetch (0 disables).
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// Page budget; 0 means unlimited.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Try `llms.txt` before crawling.
    #[serde(default = "default_true")]
    pub fast_path: bool,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Record database path.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            rate_limit_ms: default_rate_limit(),
            max_pages: default_max_pages(),
            fast_path: true,
            timeout_secs: default_timeout(),
            db_path: default_db_path(),
        }
    }
}

fn default_workers() -> u32 {
    4
}
fn default_rate_limit() -> u64 {
    500
}
fn default_max_pages() -> usize {
    500
}
fn default_true() -> bool {
    true
}
fn default_timeout() -> u64 {
    30
}
fn default_db_path() -> String {
    "doccrawl.db".into()
}

/// Which Markdown cross-references the structured extractor keeps as links.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkPolicy {
    /// Keep only targets whose path ends in `.md`.
    #[default]
    MarkdownOnly,
    /// Keep every http(s) target; the harvester still enforces same-origin.
    AllSameOrigin,
}

/// `[crawl_policies]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlPoliciesConfig {
    /// URL path include patterns.
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// URL path exclude patterns.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Link selection on the Markdown extraction path.
    #[serde(default)]
    pub link_policy: LinkPolicy,

    /// Records with less content than this are not persisted.
    #[serde(default = "default_min_content")]
    pub min_content_chars: usize,

    /// Markdown paragraphs must be longer than this to count as prose.
    #[serde(default = "default_min_paragraph")]
    pub min_paragraph_chars: usize,
}

impl Default for CrawlPoliciesConfig {
    fn default() -> Self {
        Self {
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            link_policy: LinkPolicy::default(),
            min_content_chars: default_min_content(),
            min_paragraph_chars: default_min_paragraph(),
        }
    }
}

fn default_min_content() -> usize {
    DEFAULT_MIN_CONTENT_CHARS
}
fn default_min_paragraph() -> usize {
    DEFAULT_MIN_PARAGRAPH_CHARS
}

// ---------------------------------------------------------------------------
// Crawl config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime crawl configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Site origin; also the default seed.
    pub origin: Url,
    /// Explicit seeds. When empty, the origin is the only seed.
    pub start_urls: Vec<Url>,
    /// URL path include patterns.
    pub include_patterns: Vec<String>,
    /// URL path exclude patterns.
    pub exclude_patterns: Vec<String>,
    /// Number of concurrent fetch workers.
    pub workers: usize,
    /// Post-fetch delay in ms per worker.
    pub rate_limit_ms: u64,
    /// Page budget; `None` is unlimited.
    pub max_pages: Option<usize>,
    /// Skip the `llms.txt` fast path.
    pub skip_fast_path: bool,
    /// Link selection on the Markdown extraction path.
    pub link_policy: LinkPolicy,
    /// Persistence filter threshold.
    pub min_content_chars: usize,
    /// Markdown paragraph threshold.
    pub min_paragraph_chars: usize,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl CrawlConfig {
    /// Build a runtime config for `origin` from the app config defaults.
    pub fn from_app(app: &AppConfig, origin: Url) -> Self {
        Self {
            origin,
            start_urls: Vec::new(),
            include_patterns: app.crawl_policies.include_patterns.clone(),
            exclude_patterns: app.crawl_policies.exclude_patterns.clone(),
            workers: app.defaults.workers as usize,
            rate_limit_ms: app.defaults.rate_limit_ms,
            max_pages: match app.defaults.max_pages {
                0 => None,
                n => Some(n),
            },
            skip_fast_path: !app.defaults.fast_path,
            link_policy: app.crawl_policies.link_policy,
            min_content_chars: app.crawl_policies.min_content_chars,
            min_paragraph_chars: app.crawl_policies.min_paragraph_chars,
            timeout_secs: app.defaults.timeout_secs,
        }
    }

    /// Config for `origin` with built-in defaults.
    pub fn new(origin: Url) -> Self {
        Self::from_app(&AppConfig::default(), origin)
    }

    /// Check preconditions. Called before any fetch is issued.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(DocCrawlError::config("workers must be at least 1"));
        }
        if self.max_pages == Some(0) {
            return Err(DocCrawlError::config(
                "max_pages must be a positive integer (omit it for unlimited)",
            ));
        }
        if self.timeout_secs == 0 {
            return Err(DocCrawlError::config("timeout_secs must be at least 1"));
        }
        for url in std::iter::once(&self.origin).chain(&self.start_urls) {
            if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
                return Err(DocCrawlError::config(format!(
                    "crawl URLs must be absolute http(s) URLs, got {url}"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.doccrawl/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DocCrawlError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.doccrawl/doccrawl.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocCrawlError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DocCrawlError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocCrawlError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocCrawlError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocCrawlError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
