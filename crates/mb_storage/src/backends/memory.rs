use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mb_core::{
    Analysis, Article, ArticleKey, ArticleStore, ArticleUpsert, Error, PublishMark, Result, StoreStats,
    INTERESTING_SCORE,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::StorageBackend;

#[derive(Default)]
pub struct MemoryStore {
    rows: BTreeMap<i64, Article>,
    by_url: HashMap<String, i64>,
    next_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve(&self, key: &ArticleKey) -> Option<i64> {
        match key {
            ArticleKey::Id(id) => self.rows.contains_key(id).then_some(*id),
            ArticleKey::Url(url) => self.by_url.get(url).copied(),
        }
    }

    fn row_mut(&mut self, key: &ArticleKey) -> Result<&mut Article> {
        let id = self.resolve(key);
        id.and_then(|id| self.rows.get_mut(&id))
            .ok_or_else(|| Error::NotFound(format!("article {}", key)))
    }

    fn insert_new(&mut self, payload: &ArticleUpsert, now: DateTime<Utc>) -> Article {
        self.next_id += 1;
        let extraction = payload.extraction.as_ref();
        let article = Article {
            id: self.next_id,
            external_id: payload.external_id.clone(),
            url: payload.url.clone(),
            title: payload.title.clone().unwrap_or_default(),
            raw_summary: payload.raw_summary.clone(),
            source_name: payload.source_name.clone(),
            source_published_at: payload.source_published_at,
            extracted_text: extraction.map(|e| e.text.clone()),
            extracted_at: extraction.map(|e| e.extracted_at),
            analysis: None,
            published_at: None,
            created_at: now,
            updated_at: now,
        };
        self.by_url.insert(article.url.clone(), article.id);
        self.rows.insert(article.id, article.clone());
        article
    }

    pub fn upsert(&mut self, payload: &ArticleUpsert) -> Result<Article> {
        let now = Utc::now();
        if !self.by_url.contains_key(&payload.url) {
            return Ok(self.insert_new(payload, now));
        }
        let row = self.row_mut(&ArticleKey::Url(payload.url.clone()))?;
        if let Some(external_id) = &payload.external_id {
            row.external_id = Some(external_id.clone());
        }
        if let Some(title) = &payload.title {
            row.title = title.clone();
        }
        if let Some(summary) = &payload.raw_summary {
            row.raw_summary = Some(summary.clone());
        }
        if let Some(source) = &payload.source_name {
            row.source_name = Some(source.clone());
        }
        if let Some(published) = payload.source_published_at {
            row.source_published_at = Some(published);
        }
        if let Some(extraction) = &payload.extraction {
            row.extracted_text = Some(extraction.text.clone());
            row.extracted_at = Some(extraction.extracted_at);
        }
        row.updated_at = now;
        Ok(row.clone())
    }

    pub fn insert(&mut self, payload: &ArticleUpsert) -> Result<Article> {
        if self.by_url.contains_key(&payload.url) {
            return Err(Error::ConstraintViolation(format!("duplicate url {}", payload.url)));
        }
        Ok(self.insert_new(payload, Utc::now()))
    }

    pub fn get(&self, key: &ArticleKey) -> Option<Article> {
        self.resolve(key).and_then(|id| self.rows.get(&id).cloned())
    }

    pub fn filter_existing(&self, urls: &HashSet<String>) -> HashSet<String> {
        urls.iter().filter(|url| self.by_url.contains_key(*url)).cloned().collect()
    }

    fn select<F>(&self, limit: usize, predicate: F) -> Vec<Article>
    where
        F: Fn(&Article) -> bool,
    {
        self.rows.values().filter(|a| predicate(a)).take(limit).cloned().collect()
    }

    pub fn record_analysis(&mut self, id: i64, analysis: &Analysis) -> Result<Article> {
        let row = self.row_mut(&ArticleKey::Id(id))?;
        if row.analysis.is_some() {
            return Err(Error::ConstraintViolation(format!("article #{} is already analyzed", id)));
        }
        row.analysis = Some(analysis.clone());
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    pub fn clear_analysis(&mut self, key: &ArticleKey) -> Result<bool> {
        let row = self.row_mut(key)?;
        if row.published_at.is_some() {
            return Err(Error::ConstraintViolation(format!("article {} is already published", key)));
        }
        let cleared = row.analysis.take().is_some();
        if cleared {
            row.updated_at = Utc::now();
        }
        Ok(cleared)
    }

    pub fn publish_candidates(&self, score_threshold: u8, limit: usize) -> Vec<Article> {
        let mut candidates: Vec<&Article> = self
            .rows
            .values()
            .filter(|a| a.published_at.is_none())
            .filter(|a| {
                a.analysis
                    .as_ref()
                    .map(|an| an.should_publish && an.score >= score_threshold)
                    .unwrap_or(false)
            })
            .collect();
        candidates.sort_by(|a, b| {
            let (aa, ba) = (a.analysis.as_ref(), b.analysis.as_ref());
            ba.map(|x| x.score)
                .cmp(&aa.map(|x| x.score))
                .then_with(|| aa.map(|x| x.analyzed_at).cmp(&ba.map(|x| x.analyzed_at)))
                .then_with(|| a.id.cmp(&b.id))
        });
        candidates.into_iter().take(limit).cloned().collect()
    }

    pub fn mark_published(&mut self, key: &ArticleKey, at: DateTime<Utc>) -> PublishMark {
        let Ok(row) = self.row_mut(key) else {
            return PublishMark::NotFound;
        };
        if row.published_at.is_some() {
            return PublishMark::AlreadyPublished;
        }
        row.published_at = Some(at);
        row.updated_at = Utc::now();
        PublishMark::Marked
    }

    pub fn stats(&self, since: Option<DateTime<Utc>>) -> StoreStats {
        let mut stats = StoreStats::default();
        for article in self.rows.values() {
            if since.map(|s| article.created_at < s).unwrap_or(false) {
                continue;
            }
            stats.total += 1;
            if article.extracted_text.is_some() {
                stats.extracted += 1;
            }
            if let Some(analysis) = &article.analysis {
                stats.analyzed += 1;
                if analysis.score >= INTERESTING_SCORE {
                    stats.interesting += 1;
                }
            }
            if article.published_at.is_some() {
                stats.published += 1;
            }
        }
        stats
    }

    pub fn recent(&self, limit: usize) -> Vec<Article> {
        self.rows.values().rev().take(limit).cloned().collect()
    }
}

/// [`ArticleStore`] kept entirely in process memory.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn get_error_message() -> &'static str {
        "Memory storage should be available"
    }

    async fn new() -> Result<Self> {
        Ok(Self::default())
    }
}

#[async_trait]
impl ArticleStore for MemoryStorage {
    async fn upsert_by_url(&self, article: &ArticleUpsert) -> Result<Article> {
        self.store.write().await.upsert(article)
    }

    async fn insert(&self, article: &ArticleUpsert) -> Result<Article> {
        self.store.write().await.insert(article)
    }

    async fn get(&self, key: &ArticleKey) -> Result<Option<Article>> {
        Ok(self.store.read().await.get(key))
    }

    async fn filter_existing_urls(&self, urls: &HashSet<String>) -> Result<HashSet<String>> {
        Ok(self.store.read().await.filter_existing(urls))
    }

    async fn query_unextracted(&self, limit: usize) -> Result<Vec<Article>> {
        let store = self.store.read().await;
        Ok(store.select(limit, |a| a.extracted_text.is_none() && a.analysis.is_none()))
    }

    async fn query_unanalyzed(&self, limit: usize, min_text_chars: usize) -> Result<Vec<Article>> {
        let store = self.store.read().await;
        Ok(store.select(limit, |a| {
            a.analysis.is_none() && a.analysis_text().map_or(0, |t| t.trim().chars().count()) >= min_text_chars
        }))
    }

    async fn record_analysis(&self, id: i64, analysis: &Analysis) -> Result<Article> {
        self.store.write().await.record_analysis(id, analysis)
    }

    async fn clear_analysis(&self, key: &ArticleKey) -> Result<bool> {
        self.store.write().await.clear_analysis(key)
    }

    async fn query_publish_candidates(&self, score_threshold: u8, limit: usize) -> Result<Vec<Article>> {
        Ok(self.store.read().await.publish_candidates(score_threshold, limit))
    }

    async fn mark_published(&self, key: &ArticleKey, at: DateTime<Utc>) -> Result<PublishMark> {
        Ok(self.store.write().await.mark_published(key, at))
    }

    async fn stats(&self, since: Option<DateTime<Utc>>) -> Result<StoreStats> {
        Ok(self.store.read().await.stats(since))
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Article>> {
        Ok(self.store.read().await.recent(limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mb_core::{Extraction, Verdict};

    fn payload(url: &str) -> ArticleUpsert {
        ArticleUpsert {
            url: url.to_string(),
            external_id: Some(format!("ext-{}", url.len())),
            title: Some("Milei anuncia superávit".to_string()),
            raw_summary: Some("Resumen del feed".to_string()),
            source_name: Some("La Nación".to_string()),
            source_published_at: None,
            extraction: None,
        }
    }

    fn analysis(score: u8, should_publish: bool, analyzed_at: DateTime<Utc>) -> Analysis {
        Analysis::from_verdict(
            Verdict {
                category: "economy".to_string(),
                score,
                should_publish,
                post_title: "Título".to_string(),
                post_body: "Cuerpo".to_string(),
                translation: String::new(),
                reason: "relevant".to_string(),
            },
            analyzed_at,
        )
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let storage = MemoryStorage::new();
        let first = storage.upsert_by_url(&payload("https://a.com/1")).await.unwrap();
        let second = storage.upsert_by_url(&payload("https://a.com/1")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(storage.recent(10).await.unwrap().len(), 1);
        assert_eq!(second.title, "Milei anuncia superávit");
        assert_eq!(second.raw_summary.as_deref(), Some("Resumen del feed"));
    }

    #[tokio::test]
    async fn test_upsert_never_nulls_missing_fields() {
        let storage = MemoryStorage::new();
        let extraction = Extraction { text: "Full text".to_string(), extracted_at: Utc::now() };
        storage
            .upsert_by_url(&payload("https://a.com/1").with_extraction(extraction))
            .await
            .unwrap();

        let sparse = ArticleUpsert { url: "https://a.com/1".to_string(), ..Default::default() };
        let row = storage.upsert_by_url(&sparse).await.unwrap();
        assert_eq!(row.title, "Milei anuncia superávit");
        assert_eq!(row.extracted_text.as_deref(), Some("Full text"));
        assert!(row.extracted_at.is_some());
    }

    #[tokio::test]
    async fn test_forced_insert_rejects_duplicates() {
        let storage = MemoryStorage::new();
        storage.insert(&payload("https://a.com/1")).await.unwrap();
        let err = storage.insert(&payload("https://a.com/1")).await.unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_filter_existing_urls() {
        let storage = MemoryStorage::new();
        storage.upsert_by_url(&payload("https://a.com/1")).await.unwrap();
        storage.upsert_by_url(&payload("https://a.com/2")).await.unwrap();

        let wanted: HashSet<String> = ["https://a.com/2", "https://a.com/3"].iter().map(|s| s.to_string()).collect();
        let existing = storage.filter_existing_urls(&wanted).await.unwrap();
        assert_eq!(existing, HashSet::from(["https://a.com/2".to_string()]));
    }

    #[tokio::test]
    async fn test_mark_published_is_monotonic() {
        let storage = MemoryStorage::new();
        let row = storage.upsert_by_url(&payload("https://a.com/1")).await.unwrap();
        let first_at = Utc::now();

        assert_eq!(storage.mark_published(&row.key(), first_at).await.unwrap(), PublishMark::Marked);
        assert_eq!(
            storage
                .mark_published(&ArticleKey::Url(row.url.clone()), first_at + Duration::hours(1))
                .await
                .unwrap(),
            PublishMark::AlreadyPublished
        );
        assert_eq!(
            storage.mark_published(&ArticleKey::Id(999), first_at).await.unwrap(),
            PublishMark::NotFound
        );

        let stored = storage.get(&row.key()).await.unwrap().unwrap();
        assert_eq!(stored.published_at, Some(first_at));
    }

    #[tokio::test]
    async fn test_publish_candidates_order() {
        let storage = MemoryStorage::new();
        let t0 = Utc::now();
        let low = storage.upsert_by_url(&payload("https://a.com/low")).await.unwrap();
        let high = storage.upsert_by_url(&payload("https://a.com/high")).await.unwrap();
        let early_nine = storage.upsert_by_url(&payload("https://a.com/nine-early")).await.unwrap();
        let rejected = storage.upsert_by_url(&payload("https://a.com/rejected")).await.unwrap();

        storage.record_analysis(low.id, &analysis(6, true, t0)).await.unwrap();
        storage.record_analysis(high.id, &analysis(9, true, t0 + Duration::seconds(5))).await.unwrap();
        storage.record_analysis(early_nine.id, &analysis(9, true, t0)).await.unwrap();
        storage.record_analysis(rejected.id, &analysis(10, false, t0)).await.unwrap();

        let candidates = storage.query_publish_candidates(6, 10).await.unwrap();
        let urls: Vec<&str> = candidates.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.com/nine-early", "https://a.com/high", "https://a.com/low"]);

        let limited = storage.query_publish_candidates(7, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].url, "https://a.com/nine-early");
    }

    #[tokio::test]
    async fn test_unanalyzed_skips_rows_without_enough_text() {
        let storage = MemoryStorage::new();
        for url in ["https://a.com/1", "https://a.com/2"] {
            storage
                .upsert_by_url(&ArticleUpsert {
                    raw_summary: Some("  corto  ".to_string()),
                    ..payload(url)
                })
                .await
                .unwrap();
        }
        storage.upsert_by_url(&payload("https://a.com/3")).await.unwrap();
        let extracted = storage
            .upsert_by_url(&payload("https://a.com/1").with_extraction(Extraction {
                text: "Texto completo de la nota".to_string(),
                extracted_at: Utc::now(),
            }))
            .await
            .unwrap();

        let rows = storage.query_unanalyzed(1, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, extracted.id);

        let urls: Vec<String> = storage.query_unanalyzed(10, 10).await.unwrap().into_iter().map(|a| a.url).collect();
        assert_eq!(urls, vec!["https://a.com/1", "https://a.com/3"]);
        assert_eq!(storage.query_unanalyzed(10, 5).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_analysis_is_written_once_and_can_be_cleared() {
        let storage = MemoryStorage::new();
        let row = storage.upsert_by_url(&payload("https://a.com/1")).await.unwrap();
        storage.record_analysis(row.id, &analysis(7, true, Utc::now())).await.unwrap();

        let again = storage.record_analysis(row.id, &analysis(3, false, Utc::now())).await;
        assert!(matches!(again, Err(Error::ConstraintViolation(_))));
        assert!(storage.query_unanalyzed(10, 0).await.unwrap().is_empty());

        assert!(storage.clear_analysis(&row.key()).await.unwrap());
        assert!(!storage.clear_analysis(&row.key()).await.unwrap());
        assert_eq!(storage.query_unanalyzed(10, 0).await.unwrap().len(), 1);

        storage.record_analysis(row.id, &analysis(7, true, Utc::now())).await.unwrap();
        storage.mark_published(&row.key(), Utc::now()).await.unwrap();
        let published = storage.clear_analysis(&row.key()).await;
        assert!(matches!(published, Err(Error::ConstraintViolation(_))));
    }

    #[tokio::test]
    async fn test_stats() {
        let storage = MemoryStorage::new();
        let a = storage.upsert_by_url(&payload("https://a.com/1")).await.unwrap();
        let b = storage.upsert_by_url(&payload("https://a.com/2")).await.unwrap();
        storage.upsert_by_url(&payload("https://a.com/3")).await.unwrap();
        storage.record_analysis(a.id, &analysis(8, true, Utc::now())).await.unwrap();
        storage.record_analysis(b.id, &analysis(2, false, Utc::now())).await.unwrap();
        storage.mark_published(&a.key(), Utc::now()).await.unwrap();

        let stats = storage.stats(None).await.unwrap();
        assert_eq!(stats, StoreStats { total: 3, extracted: 0, analyzed: 2, interesting: 1, published: 1 });

        let future = storage.stats(Some(Utc::now() + Duration::days(1))).await.unwrap();
        assert_eq!(future.total, 0);
    }
}
