//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use doccrawl_crawler::{CrawlOutput, Crawler};
use doccrawl_shared::{
    AppConfig, CrawlConfig, LinkPolicy, init_config, load_config, load_config_from,
};
use doccrawl_storage::Storage;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// doccrawl: turn documentation sites into structured records.
#[derive(Parser)]
#[command(
    name = "doccrawl",
    version,
    about = "Crawl documentation sites and extract structured, deduplicated content.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.doccrawl/doccrawl.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Link policy as accepted on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum LinkPolicyArg {
    MarkdownOnly,
    AllSameOrigin,
}

impl From<LinkPolicyArg> for LinkPolicy {
    fn from(arg: LinkPolicyArg) -> Self {
        match arg {
            LinkPolicyArg::MarkdownOnly => LinkPolicy::MarkdownOnly,
            LinkPolicyArg::AllSameOrigin => LinkPolicy::AllSameOrigin,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Crawl a documentation origin and store accepted records.
    Crawl(CrawlArgs),

    /// List stored records, or print one as JSON.
    Records {
        /// Record database (defaults to `defaults.db_path`).
        #[arg(long)]
        db: Option<PathBuf>,

        /// Only list records whose URL starts with this prefix.
        #[arg(long)]
        prefix: Option<String>,

        /// Print the full record stored for this URL.
        #[arg(long, conflicts_with = "prefix")]
        url: Option<String>,
    },

    /// List crawl runs, newest first.
    Runs {
        /// Record database (defaults to `defaults.db_path`).
        #[arg(long)]
        db: Option<PathBuf>,

        /// Print the summary stored for this run.
        #[arg(long)]
        id: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `doccrawl crawl`. Each one overrides the config file.
#[derive(Args, Debug)]
pub(crate) struct CrawlArgs {
    /// Documentation origin, e.g. https://docs.example.com
    pub origin: String,

    /// Explicit seed URL (repeatable). Defaults to the origin.
    #[arg(long = "start-url")]
    pub start_urls: Vec<String>,

    /// URL path include pattern (repeatable; glob or substring).
    #[arg(long = "include")]
    pub include: Vec<String>,

    /// URL path exclude pattern (repeatable; glob or substring).
    #[arg(long = "exclude")]
    pub exclude: Vec<String>,

    /// Concurrent fetch workers (1 = single flow).
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Delay each worker sleeps after a fetch, in milliseconds.
    #[arg(long)]
    pub rate_limit_ms: Option<u64>,

    /// Page budget; 0 means unlimited.
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Skip the llms.txt fast path and always crawl.
    #[arg(long)]
    pub no_fast_path: bool,

    /// Which Markdown links to follow.
    #[arg(long)]
    pub link_policy: Option<LinkPolicyArg>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Record database (defaults to `defaults.db_path`).
    #[arg(long)]
    pub db: Option<PathBuf>,
}

impl CrawlArgs {
    /// Merge these flags over the config file values.
    fn to_crawl_config(&self, app: &AppConfig) -> Result<CrawlConfig> {
        let origin = parse_url(&self.origin)?;
        let mut config = CrawlConfig::from_app(app, origin);

        config.start_urls = self
            .start_urls
            .iter()
            .map(|s| parse_url(s))
            .collect::<Result<_>>()?;
        config.include_patterns.extend(self.include.iter().cloned());
        config.exclude_patterns.extend(self.exclude.iter().cloned());

        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(rate_limit_ms) = self.rate_limit_ms {
            config.rate_limit_ms = rate_limit_ms;
        }
        if let Some(max_pages) = self.max_pages {
            config.max_pages = (max_pages > 0).then_some(max_pages);
        }
        if self.no_fast_path {
            config.skip_fast_path = true;
        }
        if let Some(policy) = self.link_policy {
            config.link_policy = policy.into();
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.timeout_secs = timeout_secs;
        }

        Ok(config)
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "doccrawl=info",
        1 => "doccrawl=debug",
        _ => "doccrawl=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Crawl(args) => cmd_crawl(&args, config_path).await,
        Command::Records { db, prefix, url } => {
            let db = resolve_db(db, config_path)?;
            match url {
                Some(url) => cmd_record_show(&db, &url).await,
                None => cmd_records(&db, prefix.as_deref()).await,
            }
        }
        Command::Runs { db, id } => {
            let db = resolve_db(db, config_path)?;
            match id {
                Some(id) => cmd_run_show(&db, &id).await,
                None => cmd_runs(&db).await,
            }
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

fn load_app_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

fn resolve_db(db: Option<PathBuf>, config_path: Option<&Path>) -> Result<PathBuf> {
    match db {
        Some(db) => Ok(db),
        None => Ok(PathBuf::from(load_app_config(config_path)?.defaults.db_path)),
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| eyre!("invalid URL '{raw}': {e}"))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_crawl(args: &CrawlArgs, config_path: Option<&Path>) -> Result<()> {
    let app = load_app_config(config_path)?;
    let config = args.to_crawl_config(&app)?;
    let db_path = args
        .db
        .clone()
        .unwrap_or_else(|| PathBuf::from(&app.defaults.db_path));

    // Invalid settings fail here, before the database or network is touched.
    let crawler = Crawler::new(config.clone())?;

    info!(
        origin = %config.origin,
        workers = config.workers,
        db = %db_path.display(),
        "starting doccrawl"
    );

    let storage = Storage::open(&db_path).await?;
    let run_id = storage.insert_run(config.origin.as_str()).await?;

    let progress = CliProgress::new(format!("Crawling {}", config.origin));
    let output = crawler.crawl().await;
    progress.finish();
    let CrawlOutput { summary, records } = output?;

    for record in &records {
        storage.upsert_record(&run_id, record).await?;
    }
    storage.finish_run(&run_id, &summary).await?;

    println!();
    println!("  Crawl finished!");
    println!("  Run:        {run_id}");
    println!(
        "  Method:     {}",
        if summary.used_fast_path { "llms.txt" } else { "crawl" }
    );
    println!("  Discovered: {}", summary.discovered);
    println!("  Fetched:    {}", summary.fetched);
    println!("  Accepted:   {}", summary.accepted);
    println!("  Rejected:   {}", summary.rejected);
    println!("  Failed:     {}", summary.failed.len());
    println!("  Database:   {}", db_path.display());
    println!("  Time:       {:.1}s", summary.duration.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_records(db: &Path, prefix: Option<&str>) -> Result<()> {
    let storage = Storage::open_readonly(db).await?;
    let records = storage.list_records(prefix).await?;

    if records.is_empty() {
        println!("No records found.");
        return Ok(());
    }

    for record in &records {
        println!(
            "{:<8} {:>7}  {}  {}",
            record.source.as_str(),
            record.content_chars,
            record.url,
            record.title
        );
    }
    let total = storage.count_records().await?;
    println!();
    println!("{} of {total} record(s)", records.len());
    Ok(())
}

async fn cmd_record_show(db: &Path, url: &str) -> Result<()> {
    let storage = Storage::open_readonly(db).await?;
    let record = storage
        .get_record(url)
        .await?
        .ok_or_else(|| eyre!("no record stored for '{url}'"))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn cmd_runs(db: &Path) -> Result<()> {
    let storage = Storage::open_readonly(db).await?;
    let runs = storage.list_runs().await?;

    if runs.is_empty() {
        println!("No crawl runs found.");
        return Ok(());
    }

    for run in runs {
        let status = match run.finished_at {
            Some(finished) => finished.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => "unfinished".to_string(),
        };
        println!("{}  {:<19}  {}", run.id, status, run.origin);
    }
    Ok(())
}

async fn cmd_run_show(db: &Path, id: &str) -> Result<()> {
    let storage = Storage::open_readonly(db).await?;
    let run = storage
        .get_run(id)
        .await?
        .ok_or_else(|| eyre!("no crawl run with id '{id}'"))?;

    println!("Run:      {}", run.id);
    println!("Origin:   {}", run.origin);
    println!("Started:  {}", run.started_at.format("%Y-%m-%d %H:%M:%S"));
    match (run.finished_at, run.stats_json) {
        (Some(finished), Some(stats)) => {
            println!("Finished: {}", finished.format("%Y-%m-%d %H:%M:%S"));
            let stats: serde_json::Value = serde_json::from_str(&stats)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        _ => println!("Finished: unfinished"),
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load_app_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Spinner shown while a crawl runs.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new(message: String) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")
                .expect("static spinner template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.set_message(message);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}
