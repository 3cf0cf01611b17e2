//! Crawl engine: drives the frontier through fetch, extract, harvest and filter.
//!
//! A run first tries the `llms.txt` fast path; when that yields URLs the
//! manifest is authoritative and no links are harvested. Otherwise the crawl
//! seeds from the configured start URLs (or the origin) and follows links.
//!
//! With one worker the run is a single flow that owns its [`FrontierState`]
//! outright. With more, N tokio tasks share it through a [`SharedFrontier`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};
use url::Url;

use doccrawl_discovery::{DiscoveryOptions, try_fast_path};
use doccrawl_shared::{CrawlConfig, CrawlSummary, ExtractionRecord, Result};

use crate::extract::{ExtractOptions, extract};
use crate::fetch::Fetcher;
use crate::filter::PersistenceFilter;
use crate::frontier::{FrontierState, SharedFrontier};
use crate::harvest::LinkHarvester;

// ---------------------------------------------------------------------------
// CrawlOutput
// ---------------------------------------------------------------------------

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct CrawlOutput {
    /// End-of-run counts.
    pub summary: CrawlSummary,
    /// Records accepted by the persistence filter, keyed by their `url`.
    pub records: Vec<ExtractionRecord>,
}

// ---------------------------------------------------------------------------
// Per-page processing
// ---------------------------------------------------------------------------

/// Result of processing one frontier URL.
#[derive(Debug)]
enum PageOutcome {
    Accepted {
        record: ExtractionRecord,
        found: Vec<Url>,
    },
    Rejected {
        found: Vec<Url>,
    },
    Failed(String),
}

/// Read-only state every worker needs.
#[derive(Debug)]
struct CrawlContext {
    fetcher: Fetcher,
    extract_opts: ExtractOptions,
    harvester: LinkHarvester,
    filter: PersistenceFilter,
    delay: Duration,
}

impl CrawlContext {
    /// fetch → sleep → extract → harvest → filter.
    async fn process(&self, url: &Url, harvest: bool) -> PageOutcome {
        let fetched = self.fetcher.fetch(url).await;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let doc = match fetched {
            Ok(doc) => doc,
            Err(e) => {
                warn!(%url, error = %e, transient = e.is_transient(), "fetch failed, skipping");
                return PageOutcome::Failed(e.to_string());
            }
        };

        let record = extract(&doc, &self.extract_opts);
        let found = if harvest {
            self.harvester.harvest(&record)
        } else {
            Vec::new()
        };

        if self.filter.accept(&record) {
            PageOutcome::Accepted { record, found }
        } else {
            debug!(
                %url,
                content_chars = record.content.chars().count(),
                min = self.filter.min_content_chars(),
                "record rejected"
            );
            PageOutcome::Rejected { found }
        }
    }
}

/// Tallies for one worker (or the single flow).
#[derive(Debug, Default)]
struct WorkerReport {
    fetched: usize,
    rejected: usize,
    records: Vec<ExtractionRecord>,
    failed: Vec<(String, String)>,
}

impl WorkerReport {
    /// Count an outcome and hand back the URLs it found.
    fn record(&mut self, url: &Url, outcome: PageOutcome) -> Vec<Url> {
        match outcome {
            PageOutcome::Accepted { record, found } => {
                self.fetched += 1;
                self.records.push(record);
                found
            }
            PageOutcome::Rejected { found } => {
                self.fetched += 1;
                self.rejected += 1;
                found
            }
            PageOutcome::Failed(error) => {
                self.failed.push((url.to_string(), error));
                Vec::new()
            }
        }
    }

    fn merge(&mut self, other: WorkerReport) {
        self.fetched += other.fetched;
        self.rejected += other.rejected;
        self.records.extend(other.records);
        self.failed.extend(other.failed);
    }
}

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

/// Documentation crawler for one origin.
pub struct Crawler {
    config: CrawlConfig,
    ctx: Arc<CrawlContext>,
}

impl Crawler {
    /// Validate `config` and build the HTTP client.
    ///
    /// Invalid worker counts or budgets are rejected here, before any request.
    pub fn new(config: CrawlConfig) -> Result<Self> {
        config.validate()?;

        let ctx = CrawlContext {
            fetcher: Fetcher::new(config.timeout_secs)?,
            extract_opts: ExtractOptions::from(&config),
            harvester: LinkHarvester::new(&config),
            filter: PersistenceFilter::from(&config),
            delay: Duration::from_millis(config.rate_limit_ms),
        };

        Ok(Self {
            config,
            ctx: Arc::new(ctx),
        })
    }

    /// Run the crawl to completion.
    ///
    /// Per-URL failures are logged and counted; they never abort the run.
    #[instrument(skip_all, fields(origin = %self.config.origin))]
    pub async fn crawl(&self) -> Result<CrawlOutput> {
        let start_time = Instant::now();

        let (seeds, used_fast_path) = self.initial_seeds().await;
        let mut frontier = FrontierState::new(self.config.max_pages);
        let seeded = seeds
            .into_iter()
            .map(|url| frontier.seed(url))
            .filter(|queued| *queued)
            .count();

        info!(
            seeded,
            used_fast_path,
            workers = self.config.workers,
            rate_limit_ms = self.config.rate_limit_ms,
            max_pages = ?self.config.max_pages,
            "starting crawl"
        );

        // The manifest is authoritative: its pages are not mined for more links.
        let harvest = !used_fast_path;
        let (report, discovered) = if self.config.workers == 1 {
            self.run_single(frontier, harvest).await
        } else {
            self.run_workers(frontier, harvest).await
        };

        let summary = CrawlSummary {
            discovered,
            fetched: report.fetched,
            accepted: report.records.len(),
            rejected: report.rejected,
            failed: report.failed,
            used_fast_path,
            duration: start_time.elapsed(),
        };

        info!(
            discovered = summary.discovered,
            fetched = summary.fetched,
            accepted = summary.accepted,
            rejected = summary.rejected,
            failed = summary.failed.len(),
            duration_ms = summary.duration.as_millis(),
            "crawl completed"
        );

        Ok(CrawlOutput {
            summary,
            records: report.records,
        })
    }

    /// Manifest URLs when the fast path succeeds, else start URLs or the origin.
    async fn initial_seeds(&self) -> (Vec<Url>, bool) {
        if !self.config.skip_fast_path {
            let opts = DiscoveryOptions {
                timeout_secs: self.config.timeout_secs,
            };
            if let Some(urls) = try_fast_path(&self.config.origin, &opts).await {
                return (urls, true);
            }
        }

        let seeds = if self.config.start_urls.is_empty() {
            vec![self.config.origin.clone()]
        } else {
            self.config.start_urls.clone()
        };
        (seeds, false)
    }

    /// One flow of control; the frontier needs no lock.
    async fn run_single(&self, mut frontier: FrontierState, harvest: bool) -> (WorkerReport, usize) {
        let mut report = WorkerReport::default();

        while let Some(url) = frontier.next() {
            let outcome = self.ctx.process(&url, harvest).await;
            for found in report.record(&url, outcome) {
                frontier.seed(found);
            }
            frontier.complete();
        }

        (report, frontier.discovered())
    }

    /// N concurrent workers over a shared frontier.
    async fn run_workers(&self, frontier: FrontierState, harvest: bool) -> (WorkerReport, usize) {
        let frontier = SharedFrontier::new(frontier);

        let handles: Vec<_> = (0..self.config.workers)
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    Arc::clone(&self.ctx),
                    frontier.clone(),
                    harvest,
                ))
            })
            .collect();

        let mut report = WorkerReport::default();
        for handle in handles {
            match handle.await {
                Ok(worker_report) => report.merge(worker_report),
                Err(e) => {
                    warn!(error = %e, "crawl worker aborted");
                    report.failed.push(("worker".into(), e.to_string()));
                }
            }
        }

        (report, frontier.discovered().await)
    }
}

/// acquire → fetch → sleep → record, until the frontier is exhausted.
async fn worker_loop(
    worker: usize,
    ctx: Arc<CrawlContext>,
    frontier: SharedFrontier,
    harvest: bool,
) -> WorkerReport {
    let mut report = WorkerReport::default();

    while let Some(lease) = frontier.acquire().await {
        let url = lease.url().clone();
        let outcome = ctx.process(&url, harvest).await;
        let found = report.record(&url, outcome);
        lease.finish(found).await;
    }

    debug!(worker, fetched = report.fetched, "worker finished");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use doccrawl_shared::{DocCrawlError, ExtractionSource, LinkPolicy};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    const PROSE: &str =
        "This page documents one part of the toolkit in enough detail to be worth keeping.";

    /// A Markdown page with a title, one prose paragraph and links.
    fn md_page(title: &str, links: &[&str]) -> String {
        let mut body = format!("# {title}\n\n{PROSE}\n\n");
        for link in links {
            body.push_str(&format!("- [{link}]({link})\n"));
        }
        body
    }

    async fn mount_md(server: &MockServer, route: &str, body: String, expected: u64) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(expected)
            .mount(server)
            .await;
    }

    fn config(server: &MockServer, workers: usize) -> CrawlConfig {
        let mut config = CrawlConfig::new(Url::parse(&server.uri()).unwrap());
        config.workers = workers;
        config.rate_limit_ms = 0;
        config.skip_fast_path = true;
        config.timeout_secs = 5;
        config
    }

    fn urls(output: &CrawlOutput) -> Vec<String> {
        let mut urls: Vec<String> = output.records.iter().map(|r| r.url.clone()).collect();
        urls.sort();
        urls
    }

    #[tokio::test]
    async fn single_flow_crawls_the_link_graph_once() {
        let server = MockServer::start().await;
        mount_md(&server, "/index.html.md", md_page("Home", &["a.md", "b.md"]), 1).await;
        mount_md(&server, "/a.md", md_page("A", &["b.md", "index.html.md"]), 1).await;
        mount_md(&server, "/b.md", md_page("B", &["a.md#usage"]), 1).await;

        let crawler = Crawler::new(config(&server, 1)).unwrap();
        let output = crawler.crawl().await.unwrap();

        let base = server.uri();
        assert_eq!(
            urls(&output),
            vec![
                format!("{base}/a.md"),
                format!("{base}/b.md"),
                format!("{base}/index.html.md"),
            ]
        );
        assert_eq!(output.summary.discovered, 3);
        assert_eq!(output.summary.fetched, 3);
        assert_eq!(output.summary.accepted, 3);
        assert_eq!(output.summary.rejected, 0);
        assert!(output.summary.failed.is_empty());
        assert!(!output.summary.used_fast_path);
    }

    #[tokio::test]
    async fn single_flow_visits_breadth_first() {
        let server = MockServer::start().await;
        mount_md(&server, "/index.html.md", md_page("Home", &["a.md", "b.md"]), 1).await;
        mount_md(&server, "/a.md", md_page("A", &["deep.md"]), 1).await;
        mount_md(&server, "/b.md", md_page("B", &[]), 1).await;
        mount_md(&server, "/deep.md", md_page("Deep", &[]), 1).await;

        let output = Crawler::new(config(&server, 1)).unwrap().crawl().await.unwrap();

        let titles: Vec<&str> = output.records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Home", "A", "B", "Deep"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn workers_never_fetch_a_page_twice() {
        let server = MockServer::start().await;
        let pages = 12;
        let page_links = |i: usize| -> Vec<String> {
            (1..=3)
                .map(|step| format!("/p{}.md", (i + step) % pages))
                .chain(std::iter::once("/index.html.md".to_string()))
                .collect()
        };

        let root_links: Vec<String> = (0..pages).map(|i| format!("/p{i}.md")).collect();
        let root_refs: Vec<&str> = root_links.iter().map(String::as_str).collect();
        mount_md(&server, "/index.html.md", md_page("Home", &root_refs), 1).await;
        for i in 0..pages {
            let links = page_links(i);
            let refs: Vec<&str> = links.iter().map(String::as_str).collect();
            mount_md(&server, &format!("/p{i}.md"), md_page(&format!("P{i}"), &refs), 1).await;
        }

        let output = Crawler::new(config(&server, 4)).unwrap().crawl().await.unwrap();

        assert_eq!(output.summary.discovered, pages + 1);
        assert_eq!(output.summary.fetched, pages + 1);
        assert_eq!(output.summary.accepted, pages + 1);
        let unique: std::collections::HashSet<String> = urls(&output).into_iter().collect();
        assert_eq!(unique.len(), pages + 1);
        // MockServer verifies every `.expect(1)` on drop.
    }

    #[tokio::test]
    async fn budget_caps_visited_pages() {
        let server = MockServer::start().await;
        mount_md(&server, "/index.html.md", md_page("Home", &["a.md"]), 1).await;
        mount_md(&server, "/a.md", md_page("A", &["b.md"]), 1).await;
        mount_md(&server, "/b.md", md_page("B", &["c.md"]), 0).await;

        let mut config = config(&server, 1);
        config.max_pages = Some(2);
        let output = Crawler::new(config).unwrap().crawl().await.unwrap();

        assert_eq!(output.summary.discovered, 2);
        assert_eq!(output.summary.fetched, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn budget_holds_with_many_workers() {
        let server = MockServer::start().await;
        let links: Vec<String> = (0..20).map(|i| format!("/p{i}.md")).collect();
        let refs: Vec<&str> = links.iter().map(String::as_str).collect();
        mount_md(&server, "/index.html.md", md_page("Home", &refs), 1).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(md_page("Leaf", &[])))
            .mount(&server)
            .await;

        let mut config = config(&server, 4);
        config.max_pages = Some(5);
        let output = Crawler::new(config).unwrap().crawl().await.unwrap();

        assert_eq!(output.summary.discovered, 5);
        assert!(output.summary.fetched <= 5);
    }

    #[tokio::test]
    async fn fast_path_replaces_link_following() {
        let server = MockServer::start().await;
        let manifest = "# Example\n\n- [A](/a.md): first page\n- [B](/b.md): second page\n";
        Mock::given(method("GET"))
            .and(path("/llms.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(manifest))
            .expect(1)
            .mount(&server)
            .await;
        mount_md(&server, "/a.md", md_page("A", &["c.md"]), 1).await;
        mount_md(&server, "/b.md", md_page("B", &[]), 1).await;
        mount_md(&server, "/c.md", md_page("C", &[]), 0).await;
        mount_md(&server, "/index.html.md", md_page("Home", &[]), 0).await;

        let mut config = config(&server, 1);
        config.skip_fast_path = false;
        let output = Crawler::new(config).unwrap().crawl().await.unwrap();

        assert!(output.summary.used_fast_path);
        assert_eq!(output.summary.accepted, 2);
        assert_eq!(output.records[0].title, "A");
        assert_eq!(output.records[1].title, "B");
    }

    #[tokio::test]
    async fn html_shell_manifest_falls_back_to_origin() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/llms.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<!DOCTYPE html><html><body>app</body></html>", "text/html"),
            )
            .mount(&server)
            .await;
        mount_md(&server, "/index.html.md", md_page("Home", &[]), 1).await;

        let mut config = config(&server, 1);
        config.skip_fast_path = false;
        let output = Crawler::new(config).unwrap().crawl().await.unwrap();

        assert!(!output.summary.used_fast_path);
        assert_eq!(output.summary.accepted, 1);
        assert_eq!(output.records[0].title, "Home");
    }

    #[tokio::test]
    async fn short_page_is_fetched_but_not_output() {
        let server = MockServer::start().await;
        let body = format!("# Stub\n\n{}\n", "x".repeat(30));
        mount_md(&server, "/index.html.md", body, 1).await;

        let output = Crawler::new(config(&server, 1)).unwrap().crawl().await.unwrap();

        assert_eq!(output.summary.fetched, 1);
        assert_eq!(output.summary.rejected, 1);
        assert_eq!(output.summary.accepted, 0);
        assert!(output.records.is_empty());
    }

    #[tokio::test]
    async fn rejected_index_pages_still_seed_links() {
        let server = MockServer::start().await;
        mount_md(&server, "/index.html.md", "# Index\n\n[A](a.md)\n".into(), 1).await;
        mount_md(&server, "/a.md", md_page("A", &[]), 1).await;

        let output = Crawler::new(config(&server, 1)).unwrap().crawl().await.unwrap();

        assert_eq!(output.summary.rejected, 1);
        assert_eq!(output.summary.accepted, 1);
        assert_eq!(output.records[0].title, "A");
    }

    #[tokio::test]
    async fn failed_fetches_are_counted_not_fatal() {
        let server = MockServer::start().await;
        mount_md(&server, "/index.html.md", md_page("Home", &["missing.md", "a.md"]), 1).await;
        mount_md(&server, "/a.md", md_page("A", &[]), 1).await;
        Mock::given(method("GET"))
            .and(path("/missing.md"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let output = Crawler::new(config(&server, 1)).unwrap().crawl().await.unwrap();

        assert_eq!(output.summary.accepted, 2);
        assert_eq!(output.summary.failed.len(), 1);
        let (url, error) = &output.summary.failed[0];
        assert!(url.ends_with("/missing.md"));
        assert!(error.contains("404"));
    }

    #[tokio::test]
    async fn html_pages_use_the_fallback_path() {
        let server = MockServer::start().await;
        let html = r#"<!DOCTYPE html><html><head><title>Docs</title></head><body>
            <nav><a href="/guide/">Guide</a></nav>
            <main><h1>Welcome</h1>
            <p>The welcome page introduces the toolkit and links to the guide.</p></main>
            </body></html>"#;
        Mock::given(method("GET"))
            .and(path("/index.html.md"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html"))
            .expect(1)
            .mount(&server)
            .await;
        mount_md(&server, "/guide/index.html.md", md_page("Guide", &[]), 1).await;

        let output = Crawler::new(config(&server, 1)).unwrap().crawl().await.unwrap();

        assert_eq!(output.summary.accepted, 2);
        assert_eq!(output.records[0].source, ExtractionSource::Html);
        assert_eq!(output.records[0].title, "Welcome");
        assert_eq!(output.records[1].source, ExtractionSource::Markdown);
    }

    #[tokio::test]
    async fn exclude_patterns_keep_pages_out() {
        let server = MockServer::start().await;
        mount_md(
            &server,
            "/index.html.md",
            md_page("Home", &["guide.md", "private/notes.md"]),
            1,
        )
        .await;
        mount_md(&server, "/guide.md", md_page("Guide", &[]), 1).await;
        mount_md(&server, "/private/notes.md", md_page("Notes", &[]), 0).await;

        let mut config = config(&server, 1);
        config.exclude_patterns = vec!["/private/**".into()];
        let output = Crawler::new(config).unwrap().crawl().await.unwrap();

        assert_eq!(output.summary.accepted, 2);
    }

    #[tokio::test]
    async fn all_same_origin_policy_follows_extensionless_links() {
        let server = MockServer::start().await;
        let home = format!("# Home\n\n{PROSE} Start with the [guide](/guide).\n");
        mount_md(&server, "/index.html.md", home, 1).await;
        mount_md(&server, "/guide/index.html.md", md_page("Guide", &[]), 1).await;

        let mut config = config(&server, 1);
        config.link_policy = LinkPolicy::AllSameOrigin;
        let output = Crawler::new(config).unwrap().crawl().await.unwrap();

        assert_eq!(output.summary.accepted, 2);
    }

    #[tokio::test]
    async fn rate_limit_delays_after_each_fetch() {
        let server = MockServer::start().await;
        mount_md(&server, "/index.html.md", md_page("Home", &["a.md", "b.md"]), 1).await;
        mount_md(&server, "/a.md", md_page("A", &[]), 1).await;
        mount_md(&server, "/b.md", md_page("B", &[]), 1).await;

        let mut config = config(&server, 1);
        config.rate_limit_ms = 150;
        let output = Crawler::new(config).unwrap().crawl().await.unwrap();

        assert_eq!(output.summary.fetched, 3);
        assert!(output.summary.duration >= Duration::from_millis(450));
    }

    /// Serves a Markdown page and records when each request arrived.
    #[derive(Clone)]
    struct StampedPage {
        body: String,
        stamps: Arc<std::sync::Mutex<Vec<Instant>>>,
    }

    impl Respond for StampedPage {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            self.stamps.lock().unwrap().push(Instant::now());
            ResponseTemplate::new(200).set_body_string(self.body.clone())
        }
    }

    async fn mount_stamped(server: &MockServer, routes: &[&str]) -> Arc<std::sync::Mutex<Vec<Instant>>> {
        let stamps = Arc::new(std::sync::Mutex::new(Vec::new()));
        for route in routes {
            let links: Vec<&str> = if *route == "/index.html.md" {
                routes.iter().skip(1).map(|r| r.trim_start_matches('/')).collect()
            } else {
                Vec::new()
            };
            Mock::given(method("GET"))
                .and(path(*route))
                .respond_with(StampedPage {
                    body: md_page(route, &links),
                    stamps: Arc::clone(&stamps),
                })
                .expect(1)
                .mount(server)
                .await;
        }
        stamps
    }

    #[tokio::test]
    async fn first_fetch_is_not_delayed() {
        let server = MockServer::start().await;
        let stamps = mount_stamped(&server, &["/index.html.md", "/a.md"]).await;

        let mut config = config(&server, 1);
        config.rate_limit_ms = 400;
        let started = Instant::now();
        Crawler::new(config).unwrap().crawl().await.unwrap();

        let stamps = stamps.lock().unwrap().clone();
        assert_eq!(stamps.len(), 2);
        assert!(stamps[0] - started < Duration::from_millis(400));
        assert!(stamps[1] - stamps[0] >= Duration::from_millis(400));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn each_worker_sleeps_on_its_own() {
        let server = MockServer::start().await;
        let routes = [
            "/index.html.md",
            "/p1.md",
            "/p2.md",
            "/p3.md",
            "/p4.md",
            "/p5.md",
            "/p6.md",
            "/p7.md",
            "/p8.md",
        ];
        let stamps = mount_stamped(&server, &routes).await;

        let mut config = config(&server, 4);
        config.rate_limit_ms = 200;
        let output = Crawler::new(config).unwrap().crawl().await.unwrap();

        assert_eq!(output.summary.fetched, 9);
        let mut stamps = stamps.lock().unwrap().clone();
        stamps.sort();
        // The index page gates the rest; after it, four leaves go out together.
        assert!(stamps[4] - stamps[1] < Duration::from_millis(200));
        // A shared delay would serialize nine fetches into at least 1.8s.
        assert!(output.summary.duration < Duration::from_millis(1500));
        assert!(output.summary.duration >= Duration::from_millis(600));
    }

    #[test]
    fn zero_workers_is_a_config_error() {
        let mut config = CrawlConfig::new(Url::parse("https://docs.example.com").unwrap());
        config.workers = 0;
        assert!(matches!(Crawler::new(config), Err(DocCrawlError::Config { .. })));
    }

    #[test]
    fn zero_budget_is_a_config_error() {
        let mut config = CrawlConfig::new(Url::parse("https://docs.example.com").unwrap());
        config.max_pages = Some(0);
        assert!(matches!(Crawler::new(config), Err(DocCrawlError::Config { .. })));
    }
}
