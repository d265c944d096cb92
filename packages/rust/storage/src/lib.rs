//! libSQL storage layer for Autopress (local file, offline mode).
//!
//! The [`Storage`] struct wraps a libSQL database holding generated articles,
//! the automation counters, and the stock photos each site has used.
//!
//! **Access rules:**
//! - Scheduler / CLI commands that write: read-write via [`Storage::open`]
//! - Reporting commands (`articles`, `stats`): read-only via [`Storage::open_readonly`]
//!
//! Exactly one scheduler process writes a given database. Every write is a
//! single SQL statement.

mod migrations;

use std::collections::HashSet;
use std::path::Path;

use autopress_shared::{
    Article, ArticleId, ArticleStatus, AutopressError, Result, RunStatistics, TopicSuggestion,
};
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database, params};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// Filter for [`Storage::list_articles`]. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub site_id: Option<String>,
    pub status: Option<ArticleStatus>,
    pub limit: Option<u32>,
}

const ARTICLE_COLUMNS: &str = "id, site_id, title, content, tags_json, excerpt, description, \
     status, created_at, published_at, post_id, post_url, topic_json, model";

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AutopressError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(AutopressError::storage)?;

        let conn = db
            .connect()
            .map_err(AutopressError::storage)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(AutopressError::storage)?;

        let conn = db
            .connect()
            .map_err(AutopressError::storage)?;

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
                        AutopressError::Storage(format!(
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
            return Err(AutopressError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Article operations
    // -----------------------------------------------------------------------

    /// Insert a freshly generated article.
    pub async fn insert_article(&self, article: &Article) -> Result<()> {
        self.check_writable()?;
        let tags_json = serde_json::to_string(&article.tags)
            .map_err(AutopressError::storage)?;
        let topic_json = article
            .topic
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(AutopressError::storage)?;

        self.conn
            .execute(
                "INSERT INTO articles (id, site_id, title, content, tags_json, excerpt, description,
                                       status, created_at, published_at, post_id, post_url,
                                       topic_json, model)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    article.id.to_string(),
                    article.site_id.as_str(),
                    article.title.as_str(),
                    article.content.as_str(),
                    tags_json,
                    article.excerpt.as_str(),
                    article.description.as_str(),
                    article.status.as_str(),
                    timestamp(&article.created_at),
                    article.published_at.as_ref().map(timestamp),
                    article.post_id.map(|id| id as i64),
                    article.post_url.clone(),
                    topic_json,
                    article.model.clone()
                ],
            )
            .await
            .map_err(AutopressError::storage)?;
        Ok(())
    }

    /// Persist the mutable publishing fields of an existing article.
    pub async fn update_article(&self, article: &Article) -> Result<()> {
        self.check_writable()?;
        let changed = self
            .conn
            .execute(
                "UPDATE articles
                 SET status = ?1, published_at = ?2, post_id = ?3, post_url = ?4
                 WHERE id = ?5",
                params![
                    article.status.as_str(),
                    article.published_at.as_ref().map(timestamp),
                    article.post_id.map(|id| id as i64),
                    article.post_url.clone(),
                    article.id.to_string()
                ],
            )
            .await
            .map_err(AutopressError::storage)?;

        if changed == 0 {
            return Err(AutopressError::Storage(format!(
                "article {} not found",
                article.id
            )));
        }
        Ok(())
    }

    /// Get an article by ID.
    pub async fn get_article(&self, id: &ArticleId) -> Result<Option<Article>> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?1");
        let mut rows = self
            .conn
            .query(&sql, params![id.to_string()])
            .await
            .map_err(AutopressError::storage)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_article(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(AutopressError::storage(e)),
        }
    }

    /// List articles matching `filter`, newest first.
    pub async fn list_articles(&self, filter: &ArticleFilter) -> Result<Vec<Article>> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles
             WHERE (?1 IS NULL OR site_id = ?1) AND (?2 IS NULL OR status = ?2)
             ORDER BY created_at DESC, id DESC
             LIMIT ?3"
        );
        let limit = filter.limit.map(i64::from).unwrap_or(-1);
        let mut rows = self
            .conn
            .query(
                &sql,
                params![
                    filter.site_id.clone(),
                    filter.status.map(|s| s.as_str()),
                    limit
                ],
            )
            .await
            .map_err(AutopressError::storage)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_article(&row)?);
        }
        Ok(results)
    }

    /// All stored articles of one site, any status, newest first.
    pub async fn site_articles(&self, site_id: &str) -> Result<Vec<Article>> {
        self.list_articles(&ArticleFilter {
            site_id: Some(site_id.to_string()),
            ..ArticleFilter::default()
        })
        .await
    }

    /// Drafts across all sites, oldest first.
    pub async fn pending_drafts(&self) -> Result<Vec<Article>> {
        let mut drafts = self
            .list_articles(&ArticleFilter {
                status: Some(ArticleStatus::Draft),
                ..ArticleFilter::default()
            })
            .await?;
        drafts.reverse();
        Ok(drafts)
    }

    /// Article counts grouped by `(site_id, status)`.
    pub async fn article_counts(&self) -> Result<Vec<(String, ArticleStatus, u64)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT site_id, status, COUNT(*) FROM articles
                 GROUP BY site_id, status ORDER BY site_id, status",
                params![],
            )
            .await
            .map_err(AutopressError::storage)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let status: String = row
                .get(1)
                .map_err(AutopressError::storage)?;
            results.push((
                row.get::<String>(0)
                    .map_err(AutopressError::storage)?,
                status.parse()?,
                row.get::<i64>(2)
                    .map_err(AutopressError::storage)? as u64,
            ));
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Run statistics
    // -----------------------------------------------------------------------

    /// Load the persisted counters (zeros on a fresh database).
    pub async fn load_run_stats(&self) -> Result<RunStatistics> {
        let mut rows = self
            .conn
            .query(
                "SELECT total_generated, total_published, errors, last_run FROM run_stats WHERE id = 1",
                params![],
            )
            .await
            .map_err(AutopressError::storage)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(RunStatistics {
                total_generated: counter(&row, 0)?,
                total_published: counter(&row, 1)?,
                errors: counter(&row, 2)?,
                last_run: row
                    .get::<String>(3)
                    .ok()
                    .map(|s| parse_timestamp(&s))
                    .transpose()?,
            }),
            Ok(None) => Ok(RunStatistics::default()),
            Err(e) => Err(AutopressError::storage(e)),
        }
    }

    /// Overwrite the persisted counters.
    pub async fn save_run_stats(&self, stats: &RunStatistics) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO run_stats (id, total_generated, total_published, errors, last_run)
                 VALUES (1, ?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                     total_generated = excluded.total_generated,
                     total_published = excluded.total_published,
                     errors = excluded.errors,
                     last_run = excluded.last_run",
                params![
                    stats.total_generated as i64,
                    stats.total_published as i64,
                    stats.errors as i64,
                    stats.last_run.as_ref().map(timestamp)
                ],
            )
            .await
            .map_err(AutopressError::storage)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Stock photo history
    // -----------------------------------------------------------------------

    /// Remember that a stock photo became a cover image on `site_id`.
    pub async fn record_used_image(
        &self,
        site_id: &str,
        photo_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO used_images (site_id, photo_id, used_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(site_id, photo_id) DO UPDATE SET used_at = excluded.used_at",
                params![site_id, photo_id, timestamp(&at)],
            )
            .await
            .map_err(AutopressError::storage)?;
        Ok(())
    }

    /// Stock photo ids used on `site_id` at or after `since`.
    pub async fn used_image_ids(
        &self,
        site_id: &str,
        since: DateTime<Utc>,
    ) -> Result<HashSet<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT photo_id FROM used_images WHERE site_id = ?1 AND used_at >= ?2",
                params![site_id, timestamp(&since)],
            )
            .await
            .map_err(AutopressError::storage)?;

        let mut ids = HashSet::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(AutopressError::storage)?
        {
            ids.insert(
                row.get::<String>(0)
                    .map_err(AutopressError::storage)?,
            );
        }
        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AutopressError::Storage(format!("invalid date: {e}")))
}

fn counter(row: &libsql::Row, idx: i32) -> Result<u64> {
    row.get::<i64>(idx)
        .map(|v| v as u64)
        .map_err(|e| AutopressError::Storage(format!("invalid counter in column {idx}: {e}")))
}

fn row_to_article(row: &libsql::Row) -> Result<Article> {
    let text = |idx: i32| -> Result<String> {
        row.get::<String>(idx)
            .map_err(AutopressError::storage)
    };

    let id: ArticleId = text(0)?
        .parse()
        .map_err(|e| AutopressError::Storage(format!("invalid article id: {e}")))?;
    let tags: Vec<String> = serde_json::from_str(&text(4)?)
        .map_err(|e| AutopressError::Storage(format!("invalid tags: {e}")))?;
    let topic: Option<TopicSuggestion> = match row.get::<String>(12).ok() {
        Some(json) => Some(
            serde_json::from_str(&json)
                .map_err(|e| AutopressError::Storage(format!("invalid topic: {e}")))?,
        ),
        None => None,
    };

    Ok(Article {
        id,
        site_id: text(1)?,
        title: text(2)?,
        content: text(3)?,
        tags,
        excerpt: text(5)?,
        description: text(6)?,
        status: text(7)?.parse()?,
        created_at: parse_timestamp(&text(8)?)?,
        published_at: row
            .get::<String>(9)
            .ok()
            .map(|s| parse_timestamp(&s))
            .transpose()?,
        post_id: row.get::<i64>(10).ok().map(|v| v as u64),
        post_url: row.get::<String>(11).ok(),
        topic,
        model: row.get::<String>(13).ok(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use autopress_shared::{GeneratedArticle, PublishedPost};
    use chrono::Duration;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("ap_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn article(site_id: &str, title: &str, created_at: DateTime<Utc>) -> Article {
        Article::draft(
            site_id,
            GeneratedArticle {
                title: title.into(),
                content: format!("## {title}\n\n本文です。"),
                tags: vec!["副業".into(), "ブログ".into()],
                excerpt: "本文です。".into(),
                description: "説明".into(),
                model: None,
            },
            Some(TopicSuggestion {
                title: title.into(),
                keywords: vec!["副業".into()],
                ..TopicSuggestion::default()
            }),
            created_at,
        )
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 2);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("ap_test_{}.db", Uuid::now_v7()));
        let _s1 = Storage::open(&tmp).await.expect("first open");
        drop(_s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn article_insert_and_get() {
        let storage = test_storage().await;
        let original = article("site-a", "在宅ワークの始め方", Utc::now());
        storage.insert_article(&original).await.expect("insert");

        let found = storage
            .get_article(&original.id)
            .await
            .expect("get")
            .expect("article exists");
        assert_eq!(found.title, "在宅ワークの始め方");
        assert_eq!(found.tags, vec!["副業", "ブログ"]);
        assert_eq!(found.status, ArticleStatus::Draft);
        assert_eq!(found.topic.as_ref().map(|t| t.title.as_str()), Some("在宅ワークの始め方"));
        assert!(found.post_id.is_none());
        assert!(found.published_at.is_none());
    }

    #[tokio::test]
    async fn publish_update_persists() {
        let storage = test_storage().await;
        let mut a = article("site-a", "副業の税金", Utc::now());
        storage.insert_article(&a).await.unwrap();

        a.mark_published(
            &PublishedPost {
                id: 99,
                link: "https://example.com/?p=99".into(),
            },
            Utc::now(),
        )
        .unwrap();
        storage.update_article(&a).await.expect("update");

        let found = storage.get_article(&a.id).await.unwrap().unwrap();
        assert_eq!(found.status, ArticleStatus::Published);
        assert_eq!(found.post_id, Some(99));
        assert_eq!(found.post_url.as_deref(), Some("https://example.com/?p=99"));
        assert!(found.published_at.is_some());
    }

    #[tokio::test]
    async fn update_missing_article_fails() {
        let storage = test_storage().await;
        let a = article("site-a", "missing", Utc::now());
        let err = storage.update_article(&a).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn list_filters_and_orders() {
        let storage = test_storage().await;
        let now = Utc::now();
        let old = article("site-a", "old", now - Duration::days(2));
        let mid = article("site-b", "mid", now - Duration::days(1));
        let mut new = article("site-a", "new", now);
        new.mark_error().unwrap();
        for a in [&old, &mid, &new] {
            storage.insert_article(a).await.unwrap();
        }

        let all = storage.list_articles(&ArticleFilter::default()).await.unwrap();
        let titles: Vec<_> = all.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["new", "mid", "old"]);

        let site_a = storage.site_articles("site-a").await.unwrap();
        assert_eq!(site_a.len(), 2);

        let drafts = storage.pending_drafts().await.unwrap();
        let titles: Vec<_> = drafts.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["old", "mid"]);

        let limited = storage
            .list_articles(&ArticleFilter {
                limit: Some(1),
                ..ArticleFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);

        let counts = storage.article_counts().await.unwrap();
        assert!(counts.contains(&("site-a".to_string(), ArticleStatus::Error, 1)));
        assert!(counts.contains(&("site-b".to_string(), ArticleStatus::Draft, 1)));
    }

    #[tokio::test]
    async fn run_stats_roundtrip() {
        let storage = test_storage().await;
        let initial = storage.load_run_stats().await.expect("load");
        assert_eq!(initial, RunStatistics::default());

        let stats = RunStatistics {
            total_generated: 4,
            total_published: 3,
            errors: 1,
            last_run: Some(Utc::now()),
        };
        storage.save_run_stats(&stats).await.expect("save");
        let loaded = storage.load_run_stats().await.unwrap();
        assert_eq!(loaded.total_generated, 4);
        assert_eq!(loaded.total_published, 3);
        assert_eq!(loaded.errors, 1);
        assert!(loaded.last_run.is_some());
    }

    #[tokio::test]
    async fn corrupt_counter_is_an_error() {
        let storage = test_storage().await;
        storage
            .save_run_stats(&RunStatistics {
                total_generated: 9,
                ..RunStatistics::default()
            })
            .await
            .unwrap();
        storage
            .conn
            .execute("UPDATE run_stats SET errors = 'many' WHERE id = 1", params![])
            .await
            .unwrap();

        let err = storage.load_run_stats().await.unwrap_err();
        assert!(err.to_string().contains("invalid counter"));
    }

    #[tokio::test]
    async fn used_images_are_per_site_and_windowed() {
        let storage = test_storage().await;
        let now = Utc::now();
        storage
            .record_used_image("site-a", "old", now - Duration::days(40))
            .await
            .unwrap();
        storage.record_used_image("site-a", "p1", now).await.unwrap();
        storage.record_used_image("site-b", "p2", now).await.unwrap();
        // Re-use refreshes the timestamp instead of duplicating the row.
        storage.record_used_image("site-a", "p1", now).await.unwrap();

        let ids = storage
            .used_image_ids("site-a", now - Duration::days(30))
            .await
            .unwrap();
        assert_eq!(ids, HashSet::from(["p1".to_string()]));
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("ap_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.insert_article(&article("site-a", "first", Utc::now()))
            .await
            .unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert_eq!(ro.site_articles("site-a").await.unwrap().len(), 1);
        let result = ro.insert_article(&article("site-a", "second", Utc::now())).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
        assert!(ro.save_run_stats(&RunStatistics::default()).await.is_err());
    }
}
