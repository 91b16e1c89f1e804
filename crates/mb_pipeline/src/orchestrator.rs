use chrono::Utc;
use futures::stream::{self, StreamExt};
use mb_core::{
    canonical_url, Analysis, AnalysisRequest, Analyzer, ArticleDescriptor, ArticleStore, ArticleUpsert,
    ContentExtractor, Error, Extraction, PostMessage, PublishMark, Publisher, Result, SourceFeed,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::guard::{CycleGuard, CyclePermit};
use crate::plan::{CyclePlan, Stage};
use crate::run::{CycleSummary, RunHistory, RunRecord, RunStatus, RunTrigger, StageError};
use crate::timeout::with_timeout;

/// Runs fetch → extract → analyze → publish cycles against one store.
///
/// Collaborators are optional so a process can run the stages it has
/// credentials for; a plan that needs a missing one is a configuration error.
pub struct Orchestrator {
    store: Arc<dyn ArticleStore>,
    feed: Option<Arc<dyn SourceFeed>>,
    extractor: Option<Arc<dyn ContentExtractor>>,
    analyzer: Option<Arc<dyn Analyzer>>,
    publisher: Option<Arc<dyn Publisher>>,
    config: PipelineConfig,
    guard: CycleGuard,
    history: Arc<RwLock<RunHistory>>,
}

pub struct OrchestratorBuilder {
    store: Arc<dyn ArticleStore>,
    feed: Option<Arc<dyn SourceFeed>>,
    extractor: Option<Arc<dyn ContentExtractor>>,
    analyzer: Option<Arc<dyn Analyzer>>,
    publisher: Option<Arc<dyn Publisher>>,
    config: PipelineConfig,
}

impl OrchestratorBuilder {
    pub fn feed(mut self, feed: Arc<dyn SourceFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn ContentExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Orchestrator {
        let history = RunHistory::new(self.config.history_size);
        Orchestrator {
            store: self.store,
            feed: self.feed,
            extractor: self.extractor,
            analyzer: self.analyzer,
            publisher: self.publisher,
            config: self.config,
            guard: CycleGuard::new(),
            history: Arc::new(RwLock::new(history)),
        }
    }
}

fn require<'a, T: ?Sized>(collaborator: &'a Option<Arc<T>>, stage: Stage) -> Result<&'a Arc<T>> {
    collaborator
        .as_ref()
        .ok_or_else(|| Error::Config(format!("the {} stage has no collaborator configured", stage)))
}

impl Orchestrator {
    pub fn builder(store: Arc<dyn ArticleStore>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            store,
            feed: None,
            extractor: None,
            analyzer: None,
            publisher: None,
            config: PipelineConfig::default(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ArticleStore> {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_held()
    }

    pub async fn history(&self) -> Vec<RunRecord> {
        self.history.read().await.records()
    }

    pub async fn last_run(&self) -> Option<RunRecord> {
        self.history.read().await.latest().cloned()
    }

    /// Reserves the guard without running anything yet.
    pub fn try_start(&self) -> Result<CyclePermit> {
        self.guard.try_acquire()
    }

    /// Checks that every stage in `plan` can run with this configuration.
    pub fn validate(&self, plan: &CyclePlan) -> Result<()> {
        if plan.is_empty() {
            return Err(Error::Config("cycle plan selects no stage".to_string()));
        }
        if plan.fetch {
            require(&self.feed, Stage::Fetch)?;
            if self.config.feed_queries.is_empty() {
                return Err(Error::Config("no feed queries configured".to_string()));
            }
        }
        if plan.extract {
            require(&self.extractor, Stage::Extract)?;
        }
        if plan.analyze {
            require(&self.analyzer, Stage::Analyze)?;
        }
        if plan.publish {
            require(&self.publisher, Stage::Publish)?;
            if self.config.channel.trim().is_empty() {
                return Err(Error::Config("publish channel is not configured".to_string()));
            }
        }
        Ok(())
    }

    /// Runs one cycle, failing fast with `AlreadyRunning` if another is active.
    pub async fn run(&self, plan: CyclePlan, trigger: RunTrigger) -> Result<RunRecord> {
        self.validate(&plan)?;
        let permit = self.try_start()?;
        self.run_with_permit(permit, plan, trigger).await
    }

    /// Runs one cycle under an already acquired permit. The permit is
    /// released when the cycle ends.
    pub async fn run_with_permit(
        &self,
        permit: CyclePermit,
        plan: CyclePlan,
        trigger: RunTrigger,
    ) -> Result<RunRecord> {
        self.validate(&plan)?;

        let started_at = Utc::now();
        let stages = plan.stages();
        info!(run_id = %permit.run_id(), ?trigger, ?stages, "🚀 Starting cycle");

        let mut summary = CycleSummary::default();
        let outcome = self.execute(&plan, &mut summary).await;

        let (status, fatal_error) = match &outcome {
            Err(e) => (RunStatus::Failed, Some(e.to_string())),
            Ok(()) if summary.has_errors() => (RunStatus::Partial, None),
            Ok(()) => (RunStatus::Success, None),
        };
        let record = RunRecord {
            id: permit.run_id(),
            trigger,
            stages,
            started_at,
            finished_at: Utc::now(),
            status,
            summary,
            fatal_error,
        };
        self.history.write().await.push(record.clone());
        drop(permit);

        match outcome {
            Ok(()) => {
                let s = &record.summary;
                info!(
                    run_id = %record.id,
                    ?status,
                    fetched = s.fetched,
                    new = s.new,
                    extracted = s.extracted,
                    extract_failed = s.extract_failed,
                    analyzed = s.analyzed,
                    analysis_failed = s.analysis_failed,
                    skipped = s.skipped,
                    published = s.published,
                    publish_failed = s.publish_failed,
                    errors = s.errors.len(),
                    duration_ms = record.duration_ms(),
                    "✅ Cycle finished"
                );
                Ok(record)
            }
            Err(e) => {
                error!(run_id = %record.id, error = %e, "❌ Cycle aborted");
                Err(e)
            }
        }
    }

    async fn execute(&self, plan: &CyclePlan, summary: &mut CycleSummary) -> Result<()> {
        if plan.fetch {
            let batch = self.fetch_stage(plan, summary).await?;
            let fresh = self.dedup_against_store(batch).await?;
            summary.new = fresh.len();
            let payloads: Vec<ArticleUpsert> = fresh.iter().map(ArticleUpsert::from_descriptor).collect();
            if plan.extract {
                self.extract_stage(payloads, true, summary).await;
            } else {
                self.store_stage(payloads, summary).await;
            }
        } else if plan.extract {
            let limit = plan.extract_limit.unwrap_or(self.config.extract_limit);
            match self.store.query_unextracted(limit).await {
                Ok(rows) => {
                    let payloads = rows
                        .into_iter()
                        .map(|article| ArticleUpsert {
                            url: article.url,
                            ..ArticleUpsert::default()
                        })
                        .collect();
                    self.extract_stage(payloads, false, summary).await;
                }
                Err(e) => {
                    warn!(error = %e, "Could not load articles to re-extract");
                    summary.record(StageError::new(Stage::Extract, None, &e));
                }
            }
        }

        if plan.analyze {
            self.analyze_stage(plan, summary).await?;
        }
        if plan.publish {
            self.publish_stage(plan, summary).await?;
        }
        Ok(())
    }

    async fn fetch_stage(&self, plan: &CyclePlan, summary: &mut CycleSummary) -> Result<Vec<ArticleDescriptor>> {
        let feed = require(&self.feed, Stage::Fetch)?;
        let mut batch = Vec::new();
        let mut seen = HashSet::new();
        let mut failed = 0;

        for query in &self.config.feed_queries {
            let mut query = query.clone();
            if let Some(size) = plan.fetch_size {
                query.size = size;
            }
            let operation = format!("fetch {}", query.name);
            match with_timeout(operation, self.config.timeouts.feed, feed.fetch(&query)).await {
                Ok(page) => {
                    info!(query = %query.name, count = page.articles.len(), "📰 Feed query answered");
                    for mut descriptor in page.articles {
                        match canonical_url(&descriptor.url) {
                            Ok(url) => descriptor.url = url,
                            Err(e) => {
                                debug!(url = %descriptor.url, error = %e, "Skipping unusable link");
                                continue;
                            }
                        }
                        if seen.insert(descriptor.url.clone()) {
                            batch.push(descriptor);
                        }
                    }
                }
                Err(e) => {
                    warn!(query = %query.name, error = %e, "Feed query failed");
                    summary.record(StageError::new(Stage::Fetch, None, &e));
                    failed += 1;
                }
            }
        }

        if failed == self.config.feed_queries.len() {
            return Err(Error::FetchFailed(format!("all {} feed queries failed", failed)));
        }
        summary.fetched = batch.len();
        Ok(batch)
    }

    /// One bulk membership query for the whole batch.
    async fn dedup_against_store(&self, batch: Vec<ArticleDescriptor>) -> Result<Vec<ArticleDescriptor>> {
        if batch.is_empty() {
            return Ok(batch);
        }
        let urls: HashSet<String> = batch.iter().map(|d| d.url.clone()).collect();
        let existing = self.store.filter_existing_urls(&urls).await?;
        let fresh: Vec<ArticleDescriptor> = batch.into_iter().filter(|d| !existing.contains(&d.url)).collect();
        info!(known = existing.len(), new = fresh.len(), "Deduplicated batch against store");
        Ok(fresh)
    }

    async fn store_stage(&self, payloads: Vec<ArticleUpsert>, summary: &mut CycleSummary) {
        for payload in payloads {
            if let Err(e) = self.store.upsert_by_url(&payload).await {
                warn!(url = %payload.url, error = %e, "Failed to store article");
                summary.record(StageError::new(Stage::Fetch, Some(payload.url.as_str()), &e));
            }
        }
    }

    /// Extracts with bounded fan-out and writes each result through in batch
    /// order. With `store_failures`, articles whose extraction failed are
    /// still stored without text.
    async fn extract_stage(&self, payloads: Vec<ArticleUpsert>, store_failures: bool, summary: &mut CycleSummary) {
        let Some(extractor) = self.extractor.as_ref() else {
            return;
        };
        let timeout = self.config.timeouts.extract;

        let mut results = stream::iter(payloads.into_iter().map(|payload| {
            let extractor = Arc::clone(extractor);
            async move {
                let operation = format!("extract {}", payload.url);
                let outcome = with_timeout(operation, timeout, extractor.extract(&payload.url)).await;
                (payload, outcome)
            }
        }))
        .buffered(self.config.effective_concurrency());

        while let Some((payload, outcome)) = results.next().await {
            let payload = match outcome {
                Ok(content) if !content.text.trim().is_empty() => {
                    summary.extracted += 1;
                    let mut payload = payload.with_extraction(Extraction {
                        text: content.text,
                        extracted_at: Utc::now(),
                    });
                    if payload.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
                        payload.title = content.title.or(payload.title);
                    }
                    payload
                }
                other => {
                    let e = match other {
                        Err(e) => e,
                        Ok(_) => Error::ExtractFailed("extractor returned empty text".to_string()),
                    };
                    summary.extract_failed += 1;
                    warn!(url = %payload.url, error = %e, "Extraction failed");
                    summary.record(StageError::new(Stage::Extract, Some(payload.url.as_str()), &e));
                    if !store_failures {
                        continue;
                    }
                    payload
                }
            };

            if let Err(e) = self.store.upsert_by_url(&payload).await {
                warn!(url = %payload.url, error = %e, "Failed to store article");
                summary.record(StageError::new(Stage::Extract, Some(payload.url.as_str()), &e));
            }
        }
    }

    async fn analyze_stage(&self, plan: &CyclePlan, summary: &mut CycleSummary) -> Result<()> {
        let analyzer = require(&self.analyzer, Stage::Analyze)?;
        let limit = plan.analyze_limit.unwrap_or(self.config.analyze_limit);

        let candidates = match self.store.query_unanalyzed(limit, self.config.min_text_chars).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "Could not load articles to analyze");
                summary.record(StageError::new(Stage::Analyze, None, &e));
                return Ok(());
            }
        };

        let mut first_call = true;
        for article in candidates {
            let Some(text) = article
                .analysis_text()
                .filter(|t| t.trim().chars().count() >= self.config.min_text_chars)
            else {
                debug!(url = %article.url, "Not enough text to analyze, skipping");
                summary.skipped += 1;
                continue;
            };

            if !first_call {
                tokio::time::sleep(self.config.analysis_delay).await;
            }
            first_call = false;

            let request = AnalysisRequest {
                title: article.title.clone(),
                body: text.to_string(),
                url: article.url.clone(),
            };
            let operation = format!("analyze {}", article.url);
            let outcome = with_timeout(operation, self.config.timeouts.analyze, analyzer.analyze(&request))
                .await
                .and_then(|verdict| verdict.validate());

            let (analysis, succeeded) = match outcome {
                Ok(verdict) => (Analysis::from_verdict(verdict, Utc::now()), true),
                Err(e) => {
                    warn!(url = %article.url, error = %e, "Analysis failed, storing sentinel");
                    summary.analysis_failed += 1;
                    summary.record(StageError::new(Stage::Analyze, Some(article.url.as_str()), &e));
                    (Analysis::unanalyzable(&article.title, &e.to_string(), Utc::now()), false)
                }
            };

            match self.store.record_analysis(article.id, &analysis).await {
                Ok(_) if succeeded => {
                    info!(url = %article.url, score = analysis.score, category = %analysis.category, "🤖 Analyzed");
                    summary.analyzed += 1;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(url = %article.url, error = %e, "Failed to store analysis");
                    summary.record(StageError::new(Stage::Analyze, Some(article.url.as_str()), &e));
                }
            }
        }
        Ok(())
    }

    async fn publish_stage(&self, plan: &CyclePlan, summary: &mut CycleSummary) -> Result<()> {
        let publisher = require(&self.publisher, Stage::Publish)?;
        let limit = plan.publish_limit.unwrap_or(self.config.publish_limit);

        let candidates = match self
            .store
            .query_publish_candidates(self.config.score_threshold, limit)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "Could not load publish candidates");
                summary.record(StageError::new(Stage::Publish, None, &e));
                return Ok(());
            }
        };

        let mut first_send = true;
        for candidate in candidates {
            // Re-read right before sending; another process may have posted it.
            let current = match self.store.get(&candidate.key()).await {
                Ok(Some(current)) => current,
                Ok(None) => {
                    let e = Error::NotFound(format!("article {}", candidate.key()));
                    summary.record(StageError::new(Stage::Publish, Some(candidate.url.as_str()), &e));
                    continue;
                }
                Err(e) => {
                    warn!(url = %candidate.url, error = %e, "Could not re-check article");
                    summary.record(StageError::new(Stage::Publish, Some(candidate.url.as_str()), &e));
                    continue;
                }
            };
            if current.is_published() {
                debug!(url = %current.url, "Already published, skipping");
                continue;
            }
            let Some(message) = PostMessage::for_article(&current) else {
                continue;
            };

            if !first_send {
                tokio::time::sleep(self.config.publish_delay).await;
            }
            first_send = false;

            let operation = format!("publish {}", current.url);
            let receipt = match with_timeout(
                operation,
                self.config.timeouts.publish,
                publisher.publish(&message, &self.config.channel),
            )
            .await
            {
                Ok(receipt) => receipt,
                Err(e) => {
                    warn!(url = %current.url, error = %e, "Publish failed, article stays eligible");
                    summary.publish_failed += 1;
                    summary.record(StageError::new(Stage::Publish, Some(current.url.as_str()), &e));
                    continue;
                }
            };

            match self.store.mark_published(&current.key(), Utc::now()).await {
                Ok(PublishMark::Marked) => {
                    info!(url = %current.url, message_id = %receipt.message_id, score = ?current.score(), "📤 Published");
                    summary.published += 1;
                }
                Ok(PublishMark::AlreadyPublished) => {
                    warn!(url = %current.url, message_id = %receipt.message_id, "Article was marked published by someone else");
                    summary.published += 1;
                }
                Ok(PublishMark::NotFound) => {
                    error!(url = %current.url, message_id = %receipt.message_id, "Message sent but article vanished from the store");
                    summary.record(StageError::inconsistency(
                        &current.url,
                        format!("message {} sent but article is no longer stored", receipt.message_id),
                    ));
                }
                Err(e) => {
                    error!(url = %current.url, message_id = %receipt.message_id, error = %e, "Message sent but not marked published");
                    summary.record(StageError::inconsistency(
                        &current.url,
                        format!("message {} sent but not marked published: {}", receipt.message_id, e),
                    ));
                }
            }
        }
        Ok(())
    }
}
