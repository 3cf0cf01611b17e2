//! HTTP fetching for frontier URLs.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;
use url::Url;

use doccrawl_shared::{DocCrawlError, Result};

/// User-Agent string for crawl requests.
pub const USER_AGENT: &str = concat!("doccrawl/", env!("CARGO_PKG_VERSION"));

/// Maximum redirects followed per request.
const MAX_REDIRECTS: usize = 5;

/// A successfully fetched response body.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// Canonical URL the request was issued for.
    pub url: Url,
    /// URL after redirects; relative links resolve against this.
    pub final_url: Url,
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// Response body decoded as text.
    pub body: String,
    /// When the response finished downloading.
    pub fetched_at: DateTime<Utc>,
}

/// Thin wrapper around a configured `reqwest` client.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Build a fetcher with the crate user agent and the given timeout.
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DocCrawlError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// GET `url`. Transport failures and non-success statuses are errors.
    pub async fn fetch(&self, url: &Url) -> Result<RawDocument> {
        debug!(%url, "fetching page");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| DocCrawlError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DocCrawlError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .text()
            .await
            .map_err(|e| DocCrawlError::Network(format!("{url}: body read failed: {e}")))?;

        Ok(RawDocument {
            url: url.clone(),
            final_url,
            status: status.as_u16(),
            content_type,
            body,
            fetched_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetch_returns_body_and_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/guide.md"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("# Guide\n", "text/markdown; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(5).unwrap();
        let url = Url::parse(&format!("{}/guide.md", server.uri())).unwrap();
        let doc = fetcher.fetch(&url).await.unwrap();

        assert_eq!(doc.status, 200);
        assert_eq!(doc.body, "# Guide\n");
        assert_eq!(doc.final_url, url);
        assert!(doc.content_type.unwrap().starts_with("text/markdown"));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(5).unwrap();
        let url = Url::parse(&format!("{}/down.md", server.uri())).unwrap();
        let err = fetcher.fetch(&url).await.unwrap_err();

        assert!(matches!(err, DocCrawlError::HttpStatus { status: 503, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn timeout_is_a_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(1).unwrap();
        let url = Url::parse(&format!("{}/slow.md", server.uri())).unwrap();
        let err = fetcher.fetch(&url).await.unwrap_err();

        assert!(matches!(err, DocCrawlError::Network(_)));
    }
}
