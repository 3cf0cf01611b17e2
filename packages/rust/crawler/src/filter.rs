//! Persistence filter: decides which extraction records are worth keeping.

use doccrawl_shared::{CrawlConfig, DEFAULT_MIN_CONTENT_CHARS, ExtractionRecord};

/// Rejects records whose prose is empty or too short to be useful.
#[derive(Debug, Clone, Copy)]
pub struct PersistenceFilter {
    min_content_chars: usize,
}

impl PersistenceFilter {
    pub fn new(min_content_chars: usize) -> Self {
        Self { min_content_chars }
    }

    pub fn min_content_chars(&self) -> usize {
        self.min_content_chars
    }

    /// Accept iff the content is non-empty and at least the threshold in chars.
    pub fn accept(&self, record: &ExtractionRecord) -> bool {
        let len = record.content.chars().count();
        len > 0 && len >= self.min_content_chars
    }
}

impl Default for PersistenceFilter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CONTENT_CHARS)
    }
}

impl From<&CrawlConfig> for PersistenceFilter {
    fn from(config: &CrawlConfig) -> Self {
        Self::new(config.min_content_chars)
    }
}
