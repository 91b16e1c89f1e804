use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use chrono::{DateTime, Utc};
use mb_core::{Analysis, Article, ArticleKey, ArticleStore, ArticleUpsert, PublishMark, Result, StoreStats};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_interval: Duration::from_millis(100),
            multiplier: 2.0,
            max_interval: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self { max_retries: 0, ..Self::default() }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            current_interval: self.initial_interval,
            multiplier: self.multiplier,
            max_interval: self.max_interval,
            randomization_factor: 0.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Store decorator that retries transient I/O failures with exponential
/// backoff. Every other error is returned on the first attempt.
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: ArticleStore> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn run<T, F, Fut>(&self, operation: &'static str, mut attempt_once: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let max_retries = self.policy.max_retries;
        let mut attempt = 0u32;
        retry(self.policy.backoff(), || {
            attempt += 1;
            let current = attempt;
            let fut = attempt_once();
            async move {
                fut.await.map_err(|e| {
                    if !e.is_transient() {
                        return backoff::Error::permanent(e);
                    }
                    if current > max_retries {
                        error!(operation, attempts = current, error = %e, "Store operation failed after retries");
                        return backoff::Error::permanent(e);
                    }
                    warn!(operation, attempt = current, error = %e, "Transient store error, retrying");
                    backoff::Error::transient(e)
                })
            }
        })
        .await
    }
}

#[async_trait]
impl<S: ArticleStore> ArticleStore for RetryingStore<S> {
    async fn upsert_by_url(&self, article: &ArticleUpsert) -> Result<Article> {
        self.run("upsert_by_url", || self.inner.upsert_by_url(article)).await
    }

    async fn insert(&self, article: &ArticleUpsert) -> Result<Article> {
        self.run("insert", || self.inner.insert(article)).await
    }

    async fn get(&self, key: &ArticleKey) -> Result<Option<Article>> {
        self.run("get", || self.inner.get(key)).await
    }

    async fn filter_existing_urls(&self, urls: &HashSet<String>) -> Result<HashSet<String>> {
        self.run("filter_existing_urls", || self.inner.filter_existing_urls(urls)).await
    }

    async fn query_unextracted(&self, limit: usize) -> Result<Vec<Article>> {
        self.run("query_unextracted", || self.inner.query_unextracted(limit)).await
    }

    async fn query_unanalyzed(&self, limit: usize, min_text_chars: usize) -> Result<Vec<Article>> {
        self.run("query_unanalyzed", || self.inner.query_unanalyzed(limit, min_text_chars))
            .await
    }

    async fn record_analysis(&self, id: i64, analysis: &Analysis) -> Result<Article> {
        self.run("record_analysis", || self.inner.record_analysis(id, analysis)).await
    }

    async fn clear_analysis(&self, key: &ArticleKey) -> Result<bool> {
        self.run("clear_analysis", || self.inner.clear_analysis(key)).await
    }

    async fn query_publish_candidates(&self, score_threshold: u8, limit: usize) -> Result<Vec<Article>> {
        self.run("query_publish_candidates", || {
            self.inner.query_publish_candidates(score_threshold, limit)
        })
        .await
    }

    async fn mark_published(&self, key: &ArticleKey, at: DateTime<Utc>) -> Result<PublishMark> {
        self.run("mark_published", || self.inner.mark_published(key, at)).await
    }

    async fn stats(&self, since: Option<DateTime<Utc>>) -> Result<StoreStats> {
        self.run("stats", || self.inner.stats(since)).await
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Article>> {
        self.run("recent", || self.inner.recent(limit)).await
    }
}
