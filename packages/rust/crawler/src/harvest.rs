//! Link harvesting: turn a record's links into frontier candidates.

use regex::Regex;
use tracing::trace;
use url::{Origin, Url};

use doccrawl_shared::{CrawlConfig, ExtractionRecord, normalize_url};

/// A path filter from configuration.
///
/// Patterns containing `*` or `?` are globs matched against the whole path;
/// anything else matches as a plain substring of the path.
#[derive(Debug, Clone)]
enum PathPattern {
    Glob(Regex),
    Substring(String),
}

impl PathPattern {
    fn parse(pattern: &str) -> Option<Self> {
        if pattern.contains(['*', '?']) {
            glob_to_regex(pattern).map(Self::Glob)
        } else if pattern.is_empty() {
            None
        } else {
            Some(Self::Substring(pattern.to_string()))
        }
    }

    fn is_match(&self, path: &str) -> bool {
        match self {
            Self::Glob(re) => re.is_match(path),
            Self::Substring(s) => path.contains(s.as_str()),
        }
    }
}

/// Convert a glob-like pattern to an anchored regex.
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let escaped = regex::escape(pattern)
        .replace(r"\*\*", ".*")
        .replace(r"\*", "[^/]*")
        .replace(r"\?", ".");
    Regex::new(&format!("^{escaped}$")).ok()
}

/// Selects which links on a page are worth crawling.
#[derive(Debug, Clone)]
pub struct LinkHarvester {
    origin: Origin,
    include: Vec<PathPattern>,
    exclude: Vec<PathPattern>,
}

impl LinkHarvester {
    /// Build a harvester scoped to the configured origin and path patterns.
    pub fn new(config: &CrawlConfig) -> Self {
        Self {
            origin: config.origin.origin(),
            include: config
                .include_patterns
                .iter()
                .filter_map(|p| PathPattern::parse(p))
                .collect(),
            exclude: config
                .exclude_patterns
                .iter()
                .filter_map(|p| PathPattern::parse(p))
                .collect(),
        }
    }

    /// Whether `url` belongs to the crawl.
    ///
    /// Same scheme/host/port as the origin, not excluded, and (when include
    /// patterns exist) matching at least one of them.
    pub fn in_scope(&self, url: &Url) -> bool {
        if url.origin() != self.origin {
            return false;
        }

        let path = url.path();
        if self.exclude.iter().any(|p| p.is_match(path)) {
            return false;
        }

        self.include.is_empty() || self.include.iter().any(|p| p.is_match(path))
    }

    /// Canonical in-scope URLs linked from `record`, in link order.
    pub fn harvest(&self, record: &ExtractionRecord) -> Vec<Url> {
        record
            .links
            .iter()
            .filter_map(|link| Url::parse(link).ok())
            .filter(|url| {
                let keep = self.in_scope(url);
                if !keep {
                    trace!(%url, "link out of scope");
                }
                keep
            })
            .filter_map(|url| normalize_url(url).ok())
            .collect()
    }
}
