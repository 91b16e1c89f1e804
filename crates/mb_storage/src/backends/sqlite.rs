use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use mb_core::{
    Analysis, Article, ArticleKey, ArticleStore, ArticleUpsert, Error, PublishMark, Result, StoreStats,
    INTERESTING_SCORE,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::StorageBackend;

const DEFAULT_DB_PATH: &str = "mediabot.db";

/// SQLite caps bound parameters per statement.
const URL_CHUNK: usize = 500;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        external_id TEXT,
        url TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL DEFAULT '',
        raw_summary TEXT,
        source_name TEXT,
        source_published_at TEXT,
        extracted_text TEXT,
        extracted_at TEXT,
        category TEXT,
        score INTEGER CHECK (score IS NULL OR score BETWEEN 1 AND 10),
        should_publish INTEGER,
        reason TEXT,
        translated_title TEXT,
        translated_body TEXT,
        translation TEXT,
        analyzed_at TEXT,
        published_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        CHECK (
            (analyzed_at IS NULL AND category IS NULL AND score IS NULL AND should_publish IS NULL
                AND reason IS NULL AND translated_title IS NULL AND translated_body IS NULL
                AND translation IS NULL)
            OR
            (analyzed_at IS NOT NULL AND category IS NOT NULL AND score IS NOT NULL
                AND should_publish IS NOT NULL AND reason IS NOT NULL AND translated_title IS NOT NULL
                AND translated_body IS NOT NULL AND translation IS NOT NULL)
        )
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_articles_unanalyzed ON articles(analyzed_at, id)",
    "CREATE INDEX IF NOT EXISTS idx_articles_candidates ON articles(published_at, should_publish, score)",
    // Add future migrations here
];

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
    db_path: PathBuf,
}

#[async_trait]
impl StorageBackend for SqliteStorage {
    fn get_error_message() -> &'static str {
        "SQLite database should be writable at ./mediabot.db"
    }

    async fn new() -> Result<Self> {
        Self::new_with_path(Path::new(DEFAULT_DB_PATH)).await
    }
}

impl SqliteStorage {
    /// Accepts a bare path or a `sqlite:`/`sqlite://` URL.
    pub async fn open(location: &str) -> Result<Self> {
        let path = location
            .strip_prefix("sqlite://")
            .or_else(|| location.strip_prefix("sqlite:"))
            .unwrap_or(location);
        Self::new_with_path(Path::new(path)).await
    }

    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(map_sqlx_error)?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Database(format!("Failed to run migration {}: {}", i, e)))?;
        }
        debug!(path = %db_path.display(), "SQLite store ready");

        Ok(Self {
            pool: Arc::new(pool),
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    async fn resolve_id(&self, key: &ArticleKey) -> Result<Option<i64>> {
        let query = match key {
            ArticleKey::Id(id) => sqlx::query("SELECT id FROM articles WHERE id = ?").bind(*id),
            ArticleKey::Url(url) => sqlx::query("SELECT id FROM articles WHERE url = ?").bind(url.as_str()),
        };
        let row = query.fetch_optional(&*self.pool).await.map_err(map_sqlx_error)?;
        row.map(|r| r.try_get::<i64, _>("id").map_err(map_sqlx_error)).transpose()
    }

    async fn fetch_many(&self, sql: &str, binds: &[i64]) -> Result<Vec<Article>> {
        let mut query = sqlx::query(sql);
        for value in binds {
            query = query.bind(*value);
        }
        let rows = query.fetch_all(&*self.pool).await.map_err(map_sqlx_error)?;
        rows.iter().map(article_from_row).collect()
    }
}

#[async_trait]
impl ArticleStore for SqliteStorage {
    async fn upsert_by_url(&self, article: &ArticleUpsert) -> Result<Article> {
        let now = timestamp(Utc::now());
        let extraction = article.extraction.as_ref();
        let row = sqlx::query(
            r#"
            INSERT INTO articles
            (external_id, url, title, raw_summary, source_name, source_published_at,
             extracted_text, extracted_at, created_at, updated_at)
            VALUES (?1, ?2, COALESCE(?3, ''), ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            ON CONFLICT(url) DO UPDATE SET
                external_id = COALESCE(excluded.external_id, articles.external_id),
                title = COALESCE(?3, articles.title),
                raw_summary = COALESCE(excluded.raw_summary, articles.raw_summary),
                source_name = COALESCE(excluded.source_name, articles.source_name),
                source_published_at = COALESCE(excluded.source_published_at, articles.source_published_at),
                extracted_text = COALESCE(excluded.extracted_text, articles.extracted_text),
                extracted_at = COALESCE(excluded.extracted_at, articles.extracted_at),
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(article.external_id.as_deref())
        .bind(&article.url)
        .bind(article.title.as_deref())
        .bind(article.raw_summary.as_deref())
        .bind(article.source_name.as_deref())
        .bind(article.source_published_at.map(timestamp))
        .bind(extraction.map(|e| e.text.as_str()))
        .bind(extraction.map(|e| timestamp(e.extracted_at)))
        .bind(&now)
        .fetch_one(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        article_from_row(&row)
    }

    async fn insert(&self, article: &ArticleUpsert) -> Result<Article> {
        let now = timestamp(Utc::now());
        let extraction = article.extraction.as_ref();
        let row = sqlx::query(
            r#"
            INSERT INTO articles
            (external_id, url, title, raw_summary, source_name, source_published_at,
             extracted_text, extracted_at, created_at, updated_at)
            VALUES (?1, ?2, COALESCE(?3, ''), ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            RETURNING *
            "#,
        )
        .bind(article.external_id.as_deref())
        .bind(&article.url)
        .bind(article.title.as_deref())
        .bind(article.raw_summary.as_deref())
        .bind(article.source_name.as_deref())
        .bind(article.source_published_at.map(timestamp))
        .bind(extraction.map(|e| e.text.as_str()))
        .bind(extraction.map(|e| timestamp(e.extracted_at)))
        .bind(&now)
        .fetch_one(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        article_from_row(&row)
    }

    async fn get(&self, key: &ArticleKey) -> Result<Option<Article>> {
        let query = match key {
            ArticleKey::Id(id) => sqlx::query("SELECT * FROM articles WHERE id = ?").bind(*id),
            ArticleKey::Url(url) => sqlx::query("SELECT * FROM articles WHERE url = ?").bind(url.as_str()),
        };
        let row = query.fetch_optional(&*self.pool).await.map_err(map_sqlx_error)?;
        row.as_ref().map(article_from_row).transpose()
    }

    async fn filter_existing_urls(&self, urls: &HashSet<String>) -> Result<HashSet<String>> {
        let urls: Vec<&String> = urls.iter().collect();
        let mut existing = HashSet::new();
        for chunk in urls.chunks(URL_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!("SELECT url FROM articles WHERE url IN ({})", placeholders);
            let mut query = sqlx::query(&sql);
            for url in chunk {
                query = query.bind(url.as_str());
            }
            let rows = query.fetch_all(&*self.pool).await.map_err(map_sqlx_error)?;
            for row in rows {
                existing.insert(row.try_get::<String, _>("url").map_err(map_sqlx_error)?);
            }
        }
        Ok(existing)
    }

    async fn query_unextracted(&self, limit: usize) -> Result<Vec<Article>> {
        self.fetch_many(
            "SELECT * FROM articles WHERE extracted_text IS NULL AND analyzed_at IS NULL ORDER BY id LIMIT ?",
            &[limit as i64],
        )
        .await
    }

    async fn query_unanalyzed(&self, limit: usize, min_text_chars: usize) -> Result<Vec<Article>> {
        self.fetch_many(
            r#"
            SELECT * FROM articles
            WHERE analyzed_at IS NULL
              AND length(trim(
                    COALESCE(NULLIF(trim(extracted_text, char(32, 9, 10, 13)), ''), raw_summary, ''),
                    char(32, 9, 10, 13)
                  )) >= ?
            ORDER BY id LIMIT ?
            "#,
            &[min_text_chars as i64, limit as i64],
        )
        .await
    }

    async fn record_analysis(&self, id: i64, analysis: &Analysis) -> Result<Article> {
        let row = sqlx::query(
            r#"
            UPDATE articles SET
                category = ?, score = ?, should_publish = ?, reason = ?,
                translated_title = ?, translated_body = ?, translation = ?,
                analyzed_at = ?, updated_at = ?
            WHERE id = ? AND analyzed_at IS NULL
            RETURNING *
            "#,
        )
        .bind(&analysis.category)
        .bind(analysis.score as i64)
        .bind(analysis.should_publish)
        .bind(&analysis.reason)
        .bind(&analysis.translated_title)
        .bind(&analysis.translated_body)
        .bind(&analysis.translation)
        .bind(timestamp(analysis.analyzed_at))
        .bind(timestamp(Utc::now()))
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => article_from_row(&row),
            None => match self.resolve_id(&ArticleKey::Id(id)).await? {
                Some(_) => Err(Error::ConstraintViolation(format!("article #{} is already analyzed", id))),
                None => Err(Error::NotFound(format!("article #{}", id))),
            },
        }
    }

    async fn clear_analysis(&self, key: &ArticleKey) -> Result<bool> {
        let article = self
            .get(key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("article {}", key)))?;
        if article.is_published() {
            return Err(Error::ConstraintViolation(format!("article {} is already published", key)));
        }

        let result = sqlx::query(
            r#"
            UPDATE articles SET
                category = NULL, score = NULL, should_publish = NULL, reason = NULL,
                translated_title = NULL, translated_body = NULL, translation = NULL,
                analyzed_at = NULL, updated_at = ?
            WHERE id = ? AND published_at IS NULL AND analyzed_at IS NOT NULL
            "#,
        )
        .bind(timestamp(Utc::now()))
        .bind(article.id)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn query_publish_candidates(&self, score_threshold: u8, limit: usize) -> Result<Vec<Article>> {
        self.fetch_many(
            r#"
            SELECT * FROM articles
            WHERE should_publish = 1 AND score >= ? AND published_at IS NULL
            ORDER BY score DESC, analyzed_at ASC, id ASC
            LIMIT ?
            "#,
            &[score_threshold as i64, limit as i64],
        )
        .await
    }

    async fn mark_published(&self, key: &ArticleKey, at: DateTime<Utc>) -> Result<PublishMark> {
        let Some(id) = self.resolve_id(key).await? else {
            return Ok(PublishMark::NotFound);
        };

        let result = sqlx::query(
            "UPDATE articles SET published_at = ?, updated_at = ? WHERE id = ? AND published_at IS NULL",
        )
        .bind(timestamp(at))
        .bind(timestamp(Utc::now()))
        .bind(id)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 1 {
            Ok(PublishMark::Marked)
        } else {
            Ok(PublishMark::AlreadyPublished)
        }
    }

    async fn stats(&self, since: Option<DateTime<Utc>>) -> Result<StoreStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(extracted_text IS NOT NULL), 0) AS extracted,
                COALESCE(SUM(analyzed_at IS NOT NULL), 0) AS analyzed,
                COALESCE(SUM(score >= ?1), 0) AS interesting,
                COALESCE(SUM(published_at IS NOT NULL), 0) AS published
            FROM articles
            WHERE ?2 IS NULL OR created_at >= ?2
            "#,
        )
        .bind(INTERESTING_SCORE as i64)
        .bind(since.map(timestamp))
        .fetch_one(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let count = |name: &str| -> Result<u64> {
            let value: i64 = row.try_get(name).map_err(map_sqlx_error)?;
            Ok(value.max(0) as u64)
        };

        Ok(StoreStats {
            total: count("total")?,
            extracted: count("extracted")?,
            analyzed: count("analyzed")?,
            interesting: count("interesting")?,
            published: count("published")?,
        })
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Article>> {
        self.fetch_many("SELECT * FROM articles ORDER BY id DESC LIMIT ?", &[limit as i64])
            .await
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|value| {
        DateTime::parse_from_rfc3339(&value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Error::Database(format!("Failed to parse date '{}': {}", value, e)))
    })
    .transpose()
}

fn required_timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    parse_timestamp(Some(row.try_get(column).map_err(map_sqlx_error)?))?
        .ok_or_else(|| Error::Database(format!("missing {}", column)))
}

fn article_from_row(row: &SqliteRow) -> Result<Article> {
    let get_text = |column: &str| -> Result<Option<String>> { row.try_get(column).map_err(map_sqlx_error) };

    let analyzed_at = parse_timestamp(get_text("analyzed_at")?)?;
    let analysis = match analyzed_at {
        Some(analyzed_at) => {
            let score: i64 = row.try_get("score").map_err(map_sqlx_error)?;
            Some(Analysis {
                category: get_text("category")?.unwrap_or_default(),
                score: u8::try_from(score)
                    .map_err(|_| Error::Database(format!("score {} out of range", score)))?,
                should_publish: row.try_get("should_publish").map_err(map_sqlx_error)?,
                reason: get_text("reason")?.unwrap_or_default(),
                translated_title: get_text("translated_title")?.unwrap_or_default(),
                translated_body: get_text("translated_body")?.unwrap_or_default(),
                translation: get_text("translation")?.unwrap_or_default(),
                analyzed_at,
            })
        }
        None => None,
    };

    Ok(Article {
        id: row.try_get("id").map_err(map_sqlx_error)?,
        external_id: get_text("external_id")?,
        url: row.try_get("url").map_err(map_sqlx_error)?,
        title: row.try_get("title").map_err(map_sqlx_error)?,
        raw_summary: get_text("raw_summary")?,
        source_name: get_text("source_name")?,
        source_published_at: parse_timestamp(get_text("source_published_at")?)?,
        extracted_text: get_text("extracted_text")?,
        extracted_at: parse_timestamp(get_text("extracted_at")?)?,
        analysis,
        published_at: parse_timestamp(get_text("published_at")?)?,
        created_at: required_timestamp(row, "created_at")?,
        updated_at: required_timestamp(row, "updated_at")?,
    })
}

/// Busy and locked databases, pool exhaustion and I/O are worth another try.
fn map_sqlx_error(err: sqlx::Error) -> Error {
    match &err {
        sqlx::Error::RowNotFound => Error::NotFound(err.to_string()),
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => Error::TransientIo(err.to_string()),
        sqlx::Error::Database(db) => {
            if db.is_unique_violation() || db.is_check_violation() {
                return Error::ConstraintViolation(db.message().to_string());
            }
            let primary_code = db
                .code()
                .and_then(|code| code.parse::<i64>().ok())
                .map(|code| code & 0xff);
            match primary_code {
                // SQLITE_BUSY, SQLITE_LOCKED
                Some(5) | Some(6) => Error::TransientIo(db.message().to_string()),
                _ => Error::Database(db.message().to_string()),
            }
        }
        _ => Error::Database(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use mb_core::{Extraction, Verdict};
    use tempfile::tempdir;

    async fn open_store(dir: &tempfile::TempDir) -> SqliteStorage {
        SqliteStorage::new_with_path(&dir.path().join("nested").join("test.db"))
            .await
            .unwrap()
    }

    fn payload(url: &str) -> ArticleUpsert {
        ArticleUpsert {
            url: url.to_string(),
            external_id: Some("nd-1".to_string()),
            title: Some("Inflación de septiembre".to_string()),
            raw_summary: Some("El INDEC publicó el dato".to_string()),
            source_name: Some("Clarín".to_string()),
            source_published_at: Some(Utc::now() - ChronoDuration::hours(2)),
            extraction: None,
        }
    }

    fn analysis(score: u8, should_publish: bool, analyzed_at: DateTime<Utc>) -> Analysis {
        Analysis::from_verdict(
            Verdict {
                category: "economy".to_string(),
                score,
                should_publish,
                post_title: "Инфляция в сентябре".to_string(),
                post_body: "INDEC опубликовал данные".to_string(),
                translation: "полный перевод".to_string(),
                reason: "important".to_string(),
            },
            analyzed_at,
        )
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_row_per_url() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;

        let first = store.upsert_by_url(&payload("https://clarin.com/a")).await.unwrap();
        let extraction = Extraction { text: "Texto completo".to_string(), extracted_at: Utc::now() };
        let second = store
            .upsert_by_url(&payload("https://clarin.com/a").with_extraction(extraction))
            .await
            .unwrap();
        let sparse = ArticleUpsert { url: "https://clarin.com/a".to_string(), ..Default::default() };
        let third = store.upsert_by_url(&sparse).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.id, third.id);
        assert_eq!(third.title, "Inflación de septiembre");
        assert_eq!(third.source_name.as_deref(), Some("Clarín"));
        assert_eq!(third.extracted_text.as_deref(), Some("Texto completo"));
        assert!(third.extracted_at.is_some());
        assert_eq!(store.stats(None).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_constraint_violation() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;
        store.insert(&payload("https://clarin.com/a")).await.unwrap();

        let err = store.insert(&payload("https://clarin.com/a")).await.unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_filter_existing_urls() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;
        store.upsert_by_url(&payload("https://clarin.com/a")).await.unwrap();
        store.upsert_by_url(&payload("https://clarin.com/b")).await.unwrap();

        let wanted: HashSet<String> = ["https://clarin.com/b", "https://clarin.com/c"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let existing = store.filter_existing_urls(&wanted).await.unwrap();
        assert_eq!(existing, HashSet::from(["https://clarin.com/b".to_string()]));
        assert!(store.filter_existing_urls(&HashSet::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unanalyzed_requires_enough_text() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;
        let short = store
            .upsert_by_url(&ArticleUpsert {
                raw_summary: Some(" corto\n".to_string()),
                ..payload("https://clarin.com/a")
            })
            .await
            .unwrap();
        store.upsert_by_url(&payload("https://clarin.com/b")).await.unwrap();
        store
            .upsert_by_url(&ArticleUpsert {
                raw_summary: None,
                ..payload("https://clarin.com/c")
            })
            .await
            .unwrap();

        let rows = store.query_unanalyzed(1, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].url, "https://clarin.com/b");
        assert_eq!(store.query_unanalyzed(10, 5).await.unwrap().len(), 2);
        assert_eq!(store.query_unanalyzed(10, 0).await.unwrap().len(), 3);

        // Extracted text takes over from the short summary.
        store
            .upsert_by_url(&payload("https://clarin.com/a").with_extraction(Extraction {
                text: "Texto completo de la nota".to_string(),
                extracted_at: Utc::now(),
            }))
            .await
            .unwrap();
        let ids: Vec<i64> = store.query_unanalyzed(10, 10).await.unwrap().iter().map(|a| a.id).collect();
        assert_eq!(ids[0], short.id);
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn test_analysis_round_trip_and_single_write() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;
        let row = store.upsert_by_url(&payload("https://clarin.com/a")).await.unwrap();
        assert_eq!(store.query_unanalyzed(10, 0).await.unwrap().len(), 1);

        let written = store.record_analysis(row.id, &analysis(8, true, Utc::now())).await.unwrap();
        let stored = written.analysis.unwrap();
        assert_eq!(stored.score, 8);
        assert!(stored.should_publish);
        assert_eq!(stored.translated_title, "Инфляция в сентябре");
        assert!(store.query_unanalyzed(10, 0).await.unwrap().is_empty());

        let again = store.record_analysis(row.id, &analysis(2, false, Utc::now())).await;
        assert!(matches!(again, Err(Error::ConstraintViolation(_))));
        let missing = store.record_analysis(404, &analysis(2, false, Utc::now())).await;
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_partial_analysis_is_rejected_by_schema() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;
        let row = store.upsert_by_url(&payload("https://clarin.com/a")).await.unwrap();

        let err = sqlx::query("UPDATE articles SET score = 7 WHERE id = ?")
            .bind(row.id)
            .execute(&*store.pool)
            .await
            .map_err(map_sqlx_error)
            .unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_publish_candidates_order_and_monotonic_mark() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;
        let t0 = Utc::now();

        let six = store.upsert_by_url(&payload("https://clarin.com/six")).await.unwrap();
        let nine = store.upsert_by_url(&payload("https://clarin.com/nine")).await.unwrap();
        let four = store.upsert_by_url(&payload("https://clarin.com/four")).await.unwrap();
        store.record_analysis(six.id, &analysis(6, true, t0)).await.unwrap();
        store.record_analysis(nine.id, &analysis(9, true, t0 + ChronoDuration::seconds(1))).await.unwrap();
        store.record_analysis(four.id, &analysis(4, false, t0)).await.unwrap();

        let scores: Vec<u8> = store
            .query_publish_candidates(6, 10)
            .await
            .unwrap()
            .iter()
            .filter_map(Article::score)
            .collect();
        assert_eq!(scores, vec![9, 6]);

        let at = Utc::now();
        assert_eq!(store.mark_published(&nine.key(), at).await.unwrap(), PublishMark::Marked);
        assert_eq!(
            store
                .mark_published(&ArticleKey::Url(nine.url.clone()), at + ChronoDuration::minutes(5))
                .await
                .unwrap(),
            PublishMark::AlreadyPublished
        );
        assert_eq!(
            store.mark_published(&ArticleKey::Url("https://nowhere".to_string()), at).await.unwrap(),
            PublishMark::NotFound
        );

        let published = store.get(&nine.key()).await.unwrap().unwrap();
        assert_eq!(published.published_at.map(timestamp), Some(timestamp(at)));
        assert_eq!(store.query_publish_candidates(6, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_analysis_and_unextracted() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;
        let row = store.upsert_by_url(&payload("https://clarin.com/a")).await.unwrap();
        assert_eq!(store.query_unextracted(10).await.unwrap().len(), 1);

        store.record_analysis(row.id, &analysis(7, true, Utc::now())).await.unwrap();
        assert!(store.query_unextracted(10).await.unwrap().is_empty());

        assert!(store.clear_analysis(&ArticleKey::Url(row.url.clone())).await.unwrap());
        let cleared = store.get(&row.key()).await.unwrap().unwrap();
        assert!(cleared.analysis.is_none());

        store.record_analysis(row.id, &analysis(7, true, Utc::now())).await.unwrap();
        store.mark_published(&row.key(), Utc::now()).await.unwrap();
        assert!(matches!(
            store.clear_analysis(&row.key()).await,
            Err(Error::ConstraintViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_stats_and_recent() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir).await;
        let a = store.upsert_by_url(&payload("https://clarin.com/a")).await.unwrap();
        let b = store.upsert_by_url(&payload("https://clarin.com/b")).await.unwrap();
        store.record_analysis(a.id, &analysis(9, true, Utc::now())).await.unwrap();
        store.record_analysis(b.id, &analysis(3, false, Utc::now())).await.unwrap();
        store.mark_published(&a.key(), Utc::now()).await.unwrap();

        let stats = store.stats(None).await.unwrap();
        assert_eq!(stats, StoreStats { total: 2, extracted: 0, analyzed: 2, interesting: 1, published: 1 });
        let later = store.stats(Some(Utc::now() + ChronoDuration::hours(1))).await.unwrap();
        assert_eq!(later.total, 0);

        let recent = store.recent(1).await.unwrap();
        assert_eq!(recent[0].url, "https://clarin.com/b");
    }

    #[tokio::test]
    async fn test_open_accepts_sqlite_prefix() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefixed.db");
        let store = SqliteStorage::open(&format!("sqlite:{}", path.display())).await.unwrap();
        assert_eq!(store.get_db_path(), path.as_path());
    }
}
