// Scripted collaborators shared by the pipeline integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mb_core::{
    Analysis, AnalysisRequest, Analyzer, Article, ArticleDescriptor, ArticleKey, ArticleStore, ArticleUpsert,
    ContentExtractor, Error, ExtractedContent, FeedPage, FeedQuery, PostMessage, PublishMark, PublishReceipt,
    Publisher, Result, SourceFeed, StoreStats, Verdict,
};
use mb_pipeline::PipelineConfig;
use mb_storage::MemoryStorage;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub fn url(i: usize) -> String {
    format!("https://news.example.com/nota-{}", i)
}

pub fn descriptor(i: usize) -> ArticleDescriptor {
    ArticleDescriptor {
        external_id: Some(format!("nd-{}", i)),
        title: format!("Nota {}", i),
        url: url(i),
        summary: Some(format!("Resumen suficientemente largo de la nota {}", i)),
        published_at: None,
        source_name: Some("Diario".to_string()),
    }
}

pub fn query(name: &str) -> FeedQuery {
    FeedQuery {
        name: name.to_string(),
        country: Some("ar".to_string()),
        languages: vec!["es".to_string()],
        categories: Vec::new(),
        query: None,
        domains: Vec::new(),
        size: 10,
        page: None,
    }
}

pub fn config(queries: &[&str]) -> PipelineConfig {
    PipelineConfig {
        feed_queries: queries.iter().map(|name| query(name)).collect(),
        channel: "@argentina_test".to_string(),
        min_text_chars: 10,
        ..PipelineConfig::default()
    }
}

pub fn verdict(score: u8, should_publish: bool) -> Verdict {
    Verdict {
        category: "politics".to_string(),
        score,
        should_publish,
        post_title: format!("Заголовок {}", score),
        post_body: "Текст поста".to_string(),
        translation: String::new(),
        reason: "relevant".to_string(),
    }
}

/// Stores article `i` with an analysis already written.
pub async fn seed_analyzed(store: &dyn ArticleStore, i: usize, score: u8, should_publish: bool) -> Article {
    let article = store
        .upsert_by_url(&ArticleUpsert::from_descriptor(&descriptor(i)))
        .await
        .unwrap();
    store
        .record_analysis(article.id, &Analysis::from_verdict(verdict(score, should_publish), Utc::now()))
        .await
        .unwrap()
}

pub async fn article(store: &dyn ArticleStore, i: usize) -> Article {
    store.get(&ArticleKey::Url(url(i))).await.unwrap().unwrap()
}

#[derive(Default)]
pub struct ScriptedFeed {
    pub articles: HashMap<String, Vec<ArticleDescriptor>>,
    pub failing: HashSet<String>,
    pub calls: AtomicUsize,
}

impl ScriptedFeed {
    pub fn returning(query: &str, articles: Vec<ArticleDescriptor>) -> Self {
        let mut feed = Self::default();
        feed.articles.insert(query.to_string(), articles);
        feed
    }

    pub fn failing(mut self, query: &str) -> Self {
        self.failing.insert(query.to_string());
        self
    }
}

#[async_trait]
impl SourceFeed for ScriptedFeed {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self, query: &FeedQuery) -> Result<FeedPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&query.name) {
            return Err(Error::FetchFailed(format!("{} unavailable", query.name)));
        }
        Ok(FeedPage {
            articles: self.articles.get(&query.name).cloned().unwrap_or_default(),
            next_page: None,
        })
    }
}

#[derive(Default)]
pub struct ScriptedExtractor {
    pub failing: HashSet<String>,
    pub calls: AtomicUsize,
}

impl ScriptedExtractor {
    pub fn failing_on(urls: impl IntoIterator<Item = String>) -> Self {
        Self {
            failing: urls.into_iter().collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ContentExtractor for ScriptedExtractor {
    async fn extract(&self, url: &str) -> Result<ExtractedContent> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(url) {
            return Err(Error::ExtractFailed(format!("{} answered 403", url)));
        }
        Ok(ExtractedContent {
            title: None,
            text: format!("Texto completo extraído de {}", url),
            excerpt: None,
            lead_image_url: None,
        })
    }
}

/// Answers per URL; a missing entry is treated as malformed model output.
#[derive(Default)]
pub struct ScriptedAnalyzer {
    pub verdicts: HashMap<String, Verdict>,
    pub calls: AtomicUsize,
}

impl ScriptedAnalyzer {
    pub fn with(mut self, i: usize, verdict: Verdict) -> Self {
        self.verdicts.insert(url(i), verdict);
        self
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<Verdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.verdicts
            .get(&request.url)
            .cloned()
            .ok_or_else(|| Error::AnalysisFailed("model returned malformed JSON".to_string()))
    }
}

/// Parks inside `analyze` until released, so a cycle can be held open.
#[derive(Default)]
pub struct BlockingAnalyzer {
    pub started: Notify,
    pub release: Notify,
}

#[async_trait]
impl Analyzer for BlockingAnalyzer {
    fn name(&self) -> &str {
        "blocking"
    }

    async fn analyze(&self, _request: &AnalysisRequest) -> Result<Verdict> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(verdict(7, true))
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub sent: Mutex<Vec<PostMessage>>,
    pub failing: HashSet<String>,
}

impl RecordingPublisher {
    pub fn links(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|m| m.link.clone()).collect()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    fn name(&self) -> &str {
        "recording"
    }

    async fn publish(&self, message: &PostMessage, _channel: &str) -> Result<PublishReceipt> {
        if self.failing.contains(&message.link) {
            return Err(Error::PublishFailed("Too Many Requests: retry after 30".to_string()));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(message.clone());
        Ok(PublishReceipt {
            message_id: sent.len().to_string(),
        })
    }
}

/// Memory store whose `mark_published` always fails.
pub struct UnmarkableStore(pub MemoryStorage);

#[async_trait]
impl ArticleStore for UnmarkableStore {
    async fn upsert_by_url(&self, article: &ArticleUpsert) -> Result<Article> {
        self.0.upsert_by_url(article).await
    }

    async fn insert(&self, article: &ArticleUpsert) -> Result<Article> {
        self.0.insert(article).await
    }

    async fn get(&self, key: &ArticleKey) -> Result<Option<Article>> {
        self.0.get(key).await
    }

    async fn filter_existing_urls(&self, urls: &HashSet<String>) -> Result<HashSet<String>> {
        self.0.filter_existing_urls(urls).await
    }

    async fn query_unextracted(&self, limit: usize) -> Result<Vec<Article>> {
        self.0.query_unextracted(limit).await
    }

    async fn query_unanalyzed(&self, limit: usize, min_text_chars: usize) -> Result<Vec<Article>> {
        self.0.query_unanalyzed(limit, min_text_chars).await
    }

    async fn record_analysis(&self, id: i64, analysis: &Analysis) -> Result<Article> {
        self.0.record_analysis(id, analysis).await
    }

    async fn clear_analysis(&self, key: &ArticleKey) -> Result<bool> {
        self.0.clear_analysis(key).await
    }

    async fn query_publish_candidates(&self, score_threshold: u8, limit: usize) -> Result<Vec<Article>> {
        self.0.query_publish_candidates(score_threshold, limit).await
    }

    async fn mark_published(&self, _key: &ArticleKey, _at: DateTime<Utc>) -> Result<PublishMark> {
        Err(Error::Database("disk I/O error".to_string()))
    }

    async fn stats(&self, since: Option<DateTime<Utc>>) -> Result<StoreStats> {
        self.0.stats(since).await
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Article>> {
        self.0.recent(limit).await
    }
}

pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}
