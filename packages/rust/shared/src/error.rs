//! Error types for doccrawl.
//!
//! Library crates use [`DocCrawlError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all doccrawl operations.
#[derive(Debug, thiserror::Error)]
pub enum DocCrawlError {
    /// Configuration loading or validation error. Fatal: raised before any fetch.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level failure (connection refused, timeout, body read).
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    /// The `llms.txt` manifest was reachable but did not look like a Markdown index.
    #[error("malformed manifest: {message}")]
    Manifest { message: String },

    /// Markdown/HTML parsing or content extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad URL, unsupported scheme, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocCrawlError>;

impl DocCrawlError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a manifest error from any displayable message.
    pub fn manifest(msg: impl Into<String>) -> Self {
        Self::Manifest {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is a per-URL fetch failure the crawl skips past.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::HttpStatus { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = DocCrawlError::config("workers must be at least 1");
        assert_eq!(err.to_string(), "config error: workers must be at least 1");

        let err = DocCrawlError::HttpStatus {
            url: "https://ex.com/a".into(),
            status: 404,
        };
        assert_eq!(err.to_string(), "HTTP 404 for https://ex.com/a");
    }

    #[test]
    fn transient_classification() {
        assert!(DocCrawlError::Network("timed out".into()).is_transient());
        assert!(
            DocCrawlError::HttpStatus {
                url: "https://ex.com".into(),
                status: 503
            }
            .is_transient()
        );
        assert!(!DocCrawlError::config("bad").is_transient());
        assert!(!DocCrawlError::manifest("html shell").is_transient());
    }
}
