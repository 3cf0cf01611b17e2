//! `llms.txt` fast-path discovery.
//!
//! Before crawling a site, doccrawl checks whether the origin publishes an
//! `llms.txt` index (per <https://llmstxt.org/>). If it does, its links become
//! the complete URL list for the run and no link harvesting happens.

mod parser;

use std::time::Duration;

use doccrawl_shared::{DocCrawlError, Result};
use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

pub use parser::Manifest;

/// Well-known manifest path beneath the origin.
pub const MANIFEST_PATH: &str = "/llms.txt";

/// Maximum number of redirects to follow when fetching the manifest.
const MAX_REDIRECTS: usize = 3;

/// Default timeout in seconds for fetching the manifest.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Maximum response size we consider valid (10 MB).
const MAX_RESPONSE_SIZE: u64 = 10 * 1024 * 1024;

/// User-Agent string for discovery requests.
const USER_AGENT: &str = concat!("doccrawl/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// DiscoveryResult
// ---------------------------------------------------------------------------

/// Outcome of the manifest discovery process.
#[derive(Debug, Clone)]
pub enum DiscoveryResult {
    /// A usable manifest with at least one URL was found at the origin.
    Found(Manifest),
    /// No usable manifest; caller should fall back to crawling.
    NotFound,
}

// ---------------------------------------------------------------------------
// Discovery options
// ---------------------------------------------------------------------------

/// Configuration for the discovery process.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Timeout for HTTP requests in seconds.
    pub timeout_secs: u64,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// Main entry points
// ---------------------------------------------------------------------------

/// Try the fast path for `origin`.
///
/// Returns the canonical URL list when the origin serves a valid, non-empty
/// `llms.txt`; `None` in every other case.
pub async fn try_fast_path(origin: &Url, opts: &DiscoveryOptions) -> Option<Vec<Url>> {
    match discover(origin, opts).await {
        Ok(DiscoveryResult::Found(manifest)) => Some(manifest.urls),
        Ok(DiscoveryResult::NotFound) => None,
        Err(e) => {
            debug!(error = %e, "fast path unavailable");
            None
        }
    }
}

/// Discover `llms.txt` at the given URL's origin.
///
/// Fetch failures, non-success statuses and malformed bodies all map to
/// [`DiscoveryResult::NotFound`]; only an unusable origin URL or HTTP client
/// setup failure is an error.
#[instrument(skip_all, fields(url = %url))]
pub async fn discover(url: &Url, opts: &DiscoveryOptions) -> Result<DiscoveryResult> {
    let origin = origin_url(url)?;
    let manifest_url = origin
        .join(MANIFEST_PATH)
        .map_err(|e| DocCrawlError::validation(format!("bad manifest URL: {e}")))?;

    info!(%manifest_url, "checking for llms.txt");

    let client = build_client(opts)?;

    let body = match fetch_and_validate(&client, &manifest_url).await {
        Ok(body) => body,
        Err(e) => {
            debug!(error = %e, "llms.txt not found or invalid");
            return Ok(DiscoveryResult::NotFound);
        }
    };

    let manifest = parser::parse_manifest(&body, &origin);
    if manifest.urls.is_empty() {
        debug!("llms.txt has no usable links");
        return Ok(DiscoveryResult::NotFound);
    }

    info!(
        title = manifest.title.as_deref().unwrap_or("<untitled>"),
        urls = manifest.urls.len(),
        "llms.txt discovered and parsed"
    );

    Ok(DiscoveryResult::Found(manifest))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Reduce a URL to its origin root (scheme + host + port, path `/`).
fn origin_url(url: &Url) -> Result<Url> {
    let scheme = url.scheme();
    let host = url
        .host_str()
        .ok_or_else(|| DocCrawlError::validation(format!("URL has no host: {url}")))?;

    let root = match url.port() {
        Some(port) => format!("{scheme}://{host}:{port}/"),
        None => format!("{scheme}://{host}/"),
    };
    Url::parse(&root).map_err(|e| DocCrawlError::validation(format!("{root}: {e}")))
}

/// Build a reqwest client with appropriate settings.
fn build_client(opts: &DiscoveryOptions) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(Duration::from_secs(opts.timeout_secs))
        .build()
        .map_err(|e| DocCrawlError::Network(format!("failed to build HTTP client: {e}")))
}

/// Fetch the manifest and check it is plausibly a Markdown index.
async fn fetch_and_validate(client: &Client, url: &Url) -> Result<String> {
    let response = client
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

    if let Some(len) = response.content_length() {
        if len > MAX_RESPONSE_SIZE {
            return Err(DocCrawlError::manifest(format!(
                "{url}: response too large ({len} bytes, max {MAX_RESPONSE_SIZE})"
            )));
        }
    }

    let body = read_limited(response, url, MAX_RESPONSE_SIZE).await?;

    parser::validate_manifest(&body)?;

    Ok(body)
}

/// Read the body chunk by chunk, giving up once it exceeds `max` bytes.
///
/// `Content-Length` is absent on chunked responses, so the limit is enforced
/// on the bytes actually received.
async fn read_limited(mut response: reqwest::Response, url: &Url, max: u64) -> Result<String> {
    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| DocCrawlError::Network(format!("{url}: failed to read body: {e}")))?
    {
        if (body.len() + chunk.len()) as u64 > max {
            return Err(DocCrawlError::manifest(format!(
                "{url}: response exceeds {max} bytes"
            )));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LLMS_TXT: &str = "# Example Docs

> Example documentation.

## Guides

- [Intro](/guides/intro.md): Start here
- [Config](/guides/config)
";

    #[test]
    fn test_origin_url_simple() {
        let url = Url::parse("https://docs.example.com/foo/bar").unwrap();
        assert_eq!(origin_url(&url).unwrap().as_str(), "https://docs.example.com/");
    }

    #[test]
    fn test_origin_url_with_port() {
        let url = Url::parse("http://localhost:3000/docs").unwrap();
        assert_eq!(origin_url(&url).unwrap().as_str(), "http://localhost:3000/");
    }

    #[tokio::test]
    async fn test_fast_path_with_mock_server() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/llms.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LLMS_TXT))
            .expect(1)
            .mount(&server)
            .await;

        let origin = Url::parse(&format!("{}/docs/", server.uri())).unwrap();
        let urls = try_fast_path(&origin, &DiscoveryOptions::default())
            .await
            .expect("fast path should succeed");

        let base = server.uri();
        assert_eq!(
            urls.iter().map(Url::as_str).collect::<Vec<_>>(),
            vec![
                format!("{base}/guides/intro.md"),
                format!("{base}/guides/config/index.html.md"),
            ]
        );
    }

    #[tokio::test]
    async fn test_discover_returns_title() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/llms.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LLMS_TXT))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        match discover(&url, &DiscoveryOptions::default()).await.unwrap() {
            DiscoveryResult::Found(manifest) => {
                assert_eq!(manifest.title.as_deref(), Some("Example Docs"));
                assert_eq!(manifest.urls.len(), 2);
            }
            DiscoveryResult::NotFound => panic!("expected Found, got NotFound"),
        }
    }

    #[tokio::test]
    async fn test_fast_path_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/llms.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        assert!(try_fast_path(&url, &DiscoveryOptions::default()).await.is_none());
    }

    #[tokio::test]
    async fn test_fast_path_rejects_html_shell() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/llms.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<!doctype html><html><body><h1>Not Found</h1>\n- [x](/x.md)</body></html>",
            ))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        assert!(try_fast_path(&url, &DiscoveryOptions::default()).await.is_none());
    }

    #[tokio::test]
    async fn test_fast_path_without_links_is_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/llms.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("# Empty\n\n- nothing here\n"))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let result = discover(&url, &DiscoveryOptions::default()).await.unwrap();
        assert!(matches!(result, DiscoveryResult::NotFound));
    }

    #[tokio::test]
    async fn test_fast_path_unreachable_host() {
        // Nothing listens on port 9 of the loopback interface.
        let url = Url::parse("http://127.0.0.1:9/").unwrap();
        let opts = DiscoveryOptions { timeout_secs: 2 };
        assert!(try_fast_path(&url, &opts).await.is_none());
    }

    #[tokio::test]
    async fn test_body_limit_applies_to_received_bytes() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/llms.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LLMS_TXT))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/llms.txt", server.uri())).unwrap();
        let client = Client::new();

        let response = client.get(url.as_str()).send().await.unwrap();
        let err = read_limited(response, &url, 16).await.unwrap_err();
        assert!(matches!(err, DocCrawlError::Manifest { .. }));

        let response = client.get(url.as_str()).send().await.unwrap();
        let body = read_limited(response, &url, MAX_RESPONSE_SIZE).await.unwrap();
        assert_eq!(body, LLMS_TXT);
    }
}
