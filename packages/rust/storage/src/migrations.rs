//! SQL migration definitions for the Autopress database.
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
    vec![
        Migration {
            version: 1,
            description: "Initial schema: articles, run_stats",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Generated articles, one row per draft
CREATE TABLE IF NOT EXISTS articles (
    id           TEXT PRIMARY KEY,
    site_id      TEXT NOT NULL,
    title        TEXT NOT NULL,
    content      TEXT NOT NULL,
    tags_json    TEXT NOT NULL DEFAULT '[]',
    excerpt      TEXT NOT NULL DEFAULT '',
    description  TEXT NOT NULL DEFAULT '',
    status       TEXT NOT NULL CHECK (status IN ('draft', 'published', 'error')),
    created_at   TEXT NOT NULL,
    published_at TEXT,
    post_id      INTEGER,
    post_url     TEXT,
    topic_json   TEXT,
    model        TEXT
);

CREATE INDEX IF NOT EXISTS idx_articles_site ON articles(site_id, created_at);
CREATE INDEX IF NOT EXISTS idx_articles_status ON articles(status);

-- Automation counters (singleton row)
CREATE TABLE IF NOT EXISTS run_stats (
    id              INTEGER PRIMARY KEY CHECK (id = 1),
    total_generated INTEGER NOT NULL DEFAULT 0,
    total_published INTEGER NOT NULL DEFAULT 0,
    errors          INTEGER NOT NULL DEFAULT 0,
    last_run        TEXT
);

INSERT OR IGNORE INTO run_stats (id) VALUES (1);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Stock photo history per site",
            sql: r#"
CREATE TABLE IF NOT EXISTS used_images (
    site_id  TEXT NOT NULL,
    photo_id TEXT NOT NULL,
    used_at  TEXT NOT NULL,
    PRIMARY KEY (site_id, photo_id)
);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
