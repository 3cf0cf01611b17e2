//! libSQL record store (offline mode).
//!
//! The [`Storage`] struct wraps a local libSQL database holding crawl runs and
//! the extraction records accepted by the persistence filter. Records are keyed
//! by canonical URL, so re-crawling an origin replaces earlier versions.
//!
//! **Access rules:**
//! - `doccrawl crawl`: read-write via [`Storage::open`]
//! - `doccrawl records` / `doccrawl runs`: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use doccrawl_shared::{CrawlSummary, DocCrawlError, ExtractionRecord, ExtractionSource, Result};
use libsql::{Connection, Database, params};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DocCrawlError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DocCrawlError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| DocCrawlError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DocCrawlError::Storage(format!(
                "database not found: {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DocCrawlError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| DocCrawlError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        DocCrawlError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(DocCrawlError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Crawl run operations
    // -----------------------------------------------------------------------

    /// Start a crawl run for `origin`. Returns the generated run ID.
    pub async fn insert_run(&self, origin: &str) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO crawl_runs (id, origin, started_at) VALUES (?1, ?2, ?3)",
                params![id.as_str(), origin, now.as_str()],
            )
            .await
            .map_err(|e| DocCrawlError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// Close a crawl run with its end-of-run summary.
    pub async fn finish_run(&self, run_id: &str, summary: &CrawlSummary) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        let stats_json = to_json(summary)?;
        self.conn
            .execute(
                "UPDATE crawl_runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json.as_str(), run_id],
            )
            .await
            .map_err(|e| DocCrawlError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Get a run by ID.
    pub async fn get_run(&self, run_id: &str) -> Result<Option<RunInfo>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, origin, started_at, finished_at, stats_json
                 FROM crawl_runs WHERE id = ?1",
                params![run_id],
            )
            .await
            .map_err(|e| DocCrawlError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_run_info(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DocCrawlError::Storage(e.to_string())),
        }
    }

    /// List runs, newest first.
    pub async fn list_runs(&self) -> Result<Vec<RunInfo>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, origin, started_at, finished_at, stats_json
                 FROM crawl_runs ORDER BY started_at DESC",
                params![],
            )
            .await
            .map_err(|e| DocCrawlError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_run_info(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Record operations
    // -----------------------------------------------------------------------

    /// Upsert a record (insert or replace on conflict by `url`).
    pub async fn upsert_record(&self, run_id: &str, record: &ExtractionRecord) -> Result<()> {
        self.check_writable()?;
        let headings_json = to_json(&record.headings)?;
        let code_samples_json = to_json(&record.code_samples)?;
        let links_json = to_json(&record.links)?;
        let content_hash = compute_hash(&record.content);

        self.conn
            .execute(
                "INSERT INTO records (url, run_id, title, source, headings_json, content,
                                      code_samples_json, links_json, content_hash, fetched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(url) DO UPDATE SET
                   run_id = excluded.run_id,
                   title = excluded.title,
                   source = excluded.source,
                   headings_json = excluded.headings_json,
                   content = excluded.content,
                   code_samples_json = excluded.code_samples_json,
                   links_json = excluded.links_json,
                   content_hash = excluded.content_hash,
                   fetched_at = excluded.fetched_at",
                params![
                    record.url.as_str(),
                    run_id,
                    record.title.as_str(),
                    record.source.as_str(),
                    headings_json.as_str(),
                    record.content.as_str(),
                    code_samples_json.as_str(),
                    links_json.as_str(),
                    content_hash.as_str(),
                    record.fetched_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DocCrawlError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Get the full record stored for `url`.
    pub async fn get_record(&self, url: &str) -> Result<Option<ExtractionRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT url, title, source, headings_json, content, code_samples_json,
                        links_json, fetched_at
                 FROM records WHERE url = ?1",
                params![url],
            )
            .await
            .map_err(|e| DocCrawlError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_record(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DocCrawlError::Storage(e.to_string())),
        }
    }

    /// List stored records, optionally restricted to URLs starting with `prefix`.
    ///
    /// The prefix is compared literally and case-sensitively (no `LIKE` wildcards).
    pub async fn list_records(&self, prefix: Option<&str>) -> Result<Vec<RecordSummary>> {
        let prefix = prefix.unwrap_or("");
        let mut rows = self
            .conn
            .query(
                "SELECT url, run_id, title, source, content_hash, fetched_at, length(content)
                 FROM records WHERE substr(url, 1, length(?1)) = ?1 ORDER BY url",
                params![prefix],
            )
            .await
            .map_err(|e| DocCrawlError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(RecordSummary {
                url: get_string(&row, 0)?,
                run_id: get_string(&row, 1)?,
                title: get_string(&row, 2)?,
                source: parse_source(&get_string(&row, 3)?)?,
                content_hash: get_string(&row, 4)?,
                fetched_at: parse_date(&get_string(&row, 5)?)?,
                content_chars: row.get::<i64>(6).map(|v| v as usize).unwrap_or(0),
            });
        }
        Ok(results)
    }

    /// Number of stored records.
    pub async fn count_records(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM records", params![])
            .await
            .map_err(|e| DocCrawlError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).map(|v| v as usize).unwrap_or(0)),
            Ok(None) => Ok(0),
            Err(e) => Err(DocCrawlError::Storage(e.to_string())),
        }
    }
}

/// A crawl run row.
#[derive(Debug, Clone)]
pub struct RunInfo {
    pub id: String,
    pub origin: String,
    pub started_at: DateTime<Utc>,
    /// `None` while the run is in progress (or was interrupted).
    pub finished_at: Option<DateTime<Utc>>,
    /// Serialized [`CrawlSummary`].
    pub stats_json: Option<String>,
}

/// A stored record without its content and JSON columns.
#[derive(Debug, Clone)]
pub struct RecordSummary {
    pub url: String,
    pub run_id: String,
    pub title: String,
    pub source: ExtractionSource,
    pub content_hash: String,
    pub fetched_at: DateTime<Utc>,
    /// SQLite `length()` of the content, i.e. characters.
    pub content_chars: usize,
}

/// Compute SHA-256 hash of content.
fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| DocCrawlError::Storage(format!("encode: {e}")))
}

fn from_json<T: serde::de::DeserializeOwned>(column: &str, s: &str) -> Result<T> {
    serde_json::from_str(s).map_err(|e| DocCrawlError::parse(format!("{column}: {e}")))
}

fn get_string(row: &libsql::Row, idx: i32) -> Result<String> {
    row.get::<String>(idx)
        .map_err(|e| DocCrawlError::Storage(e.to_string()))
}

fn parse_date(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DocCrawlError::Storage(format!("invalid date: {e}")))
}

fn parse_source(s: &str) -> Result<ExtractionSource> {
    s.parse().map_err(DocCrawlError::Storage)
}

/// Convert a database row to a [`RunInfo`].
fn row_to_run_info(row: &libsql::Row) -> Result<RunInfo> {
    Ok(RunInfo {
        id: get_string(row, 0)?,
        origin: get_string(row, 1)?,
        started_at: parse_date(&get_string(row, 2)?)?,
        finished_at: row
            .get::<String>(3)
            .ok()
            .map(|s| parse_date(&s))
            .transpose()?,
        stats_json: row.get::<String>(4).ok(),
    })
}

/// Convert a database row to an [`ExtractionRecord`].
fn row_to_record(row: &libsql::Row) -> Result<ExtractionRecord> {
    Ok(ExtractionRecord {
        url: get_string(row, 0)?,
        title: get_string(row, 1)?,
        source: parse_source(&get_string(row, 2)?)?,
        headings: from_json("headings_json", &get_string(row, 3)?)?,
        content: get_string(row, 4)?,
        code_samples: from_json("code_samples_json", &get_string(row, 5)?)?,
        links: from_json("links_json", &get_string(row, 6)?)?,
        fetched_at: parse_date(&get_string(row, 7)?)?,
    })
}
