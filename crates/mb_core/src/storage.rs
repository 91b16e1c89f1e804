use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::types::{Analysis, Article, ArticleKey, ArticleUpsert, PublishMark, StoreStats};
use crate::Result;

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert the row if `url` is absent, otherwise update only the fields
    /// present in the payload.
    async fn upsert_by_url(&self, article: &ArticleUpsert) -> Result<Article>;

    /// Forced insert; a duplicate `url` is a `ConstraintViolation`.
    async fn insert(&self, article: &ArticleUpsert) -> Result<Article>;

    async fn get(&self, key: &ArticleKey) -> Result<Option<Article>>;

    /// Bulk membership check: which of `urls` are already stored.
    async fn filter_existing_urls(&self, urls: &HashSet<String>) -> Result<HashSet<String>>;

    /// Stored, unanalyzed articles without extracted text, in id order.
    async fn query_unextracted(&self, limit: usize) -> Result<Vec<Article>>;

    /// Articles with no analysis yet whose analysis text (extracted text,
    /// else the feed summary) is at least `min_text_chars` characters once
    /// trimmed, in id order. Rows too short to analyze never take a slot.
    async fn query_unanalyzed(&self, limit: usize, min_text_chars: usize) -> Result<Vec<Article>>;

    /// Write every analysis field in one step. Fails with
    /// `ConstraintViolation` if the article already carries an analysis.
    async fn record_analysis(&self, id: i64, analysis: &Analysis) -> Result<Article>;

    /// Drop the analysis of an unpublished article so it is analyzed again.
    /// Returns `false` when there was nothing to clear.
    async fn clear_analysis(&self, key: &ArticleKey) -> Result<bool>;

    /// `should_publish AND score >= threshold AND published_at IS NULL`,
    /// best score first, then earliest analysis, then id.
    async fn query_publish_candidates(&self, score_threshold: u8, limit: usize) -> Result<Vec<Article>>;

    /// Set `published_at` once; later calls report `AlreadyPublished`.
    async fn mark_published(&self, key: &ArticleKey, at: DateTime<Utc>) -> Result<PublishMark>;

    /// Counters over articles created at or after `since` (all rows if `None`).
    async fn stats(&self, since: Option<DateTime<Utc>>) -> Result<StoreStats>;

    /// Most recently created articles first.
    async fn recent(&self, limit: usize) -> Result<Vec<Article>>;
}
