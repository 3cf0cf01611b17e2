//! SQL migration definitions for the doccrawl record store.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: crawl_runs, records",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per crawl invocation
CREATE TABLE IF NOT EXISTS crawl_runs (
    id          TEXT PRIMARY KEY,
    origin      TEXT NOT NULL,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

CREATE INDEX IF NOT EXISTS idx_crawl_runs_origin ON crawl_runs(origin);

-- Accepted extraction records, addressable by canonical URL
CREATE TABLE IF NOT EXISTS records (
    url               TEXT PRIMARY KEY,
    run_id            TEXT NOT NULL REFERENCES crawl_runs(id),
    title             TEXT NOT NULL,
    source            TEXT NOT NULL,
    headings_json     TEXT NOT NULL,
    content           TEXT NOT NULL,
    code_samples_json TEXT NOT NULL,
    links_json        TEXT NOT NULL,
    content_hash      TEXT NOT NULL,
    fetched_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_run_id ON records(run_id);
CREATE INDEX IF NOT EXISTS idx_records_content_hash ON records(content_hash);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
