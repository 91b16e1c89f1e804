use mb_core::{ArticleStore, Result};
use mb_pipeline::{CyclePlan, Orchestrator, PipelineConfig};
use mb_publish::TelegramPublisher;
use mb_sources::{default_queries, HtmlExtractor, NewsDataFeed};
use mb_storage::{create_storage, RetryPolicy};
use mb_web::Credentials;
use std::sync::Arc;
use tracing::{info, warn};

use crate::Settings;

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl Settings {
    pub fn channel(&self) -> Option<String> {
        self.channel
            .clone()
            .filter(|c| !c.trim().is_empty())
            .or_else(|| std::env::var("TELEGRAM_CHAT_ID").ok().filter(|c| !c.trim().is_empty()))
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            newsdata: present(&self.newsdata_key),
            openai: present(&self.openai_key),
            telegram: present(&self.telegram_token),
            channel: self.channel().is_some(),
        }
    }

    pub fn pipeline_config(&self, fetch_size: usize) -> PipelineConfig {
        PipelineConfig {
            feed_queries: default_queries(fetch_size),
            channel: self.channel().unwrap_or_default(),
            extract_concurrency: self.extract_concurrency,
            min_text_chars: self.min_text_chars,
            analysis_delay: self.analysis_delay,
            publish_delay: self.publish_delay,
            score_threshold: self.score_threshold,
            ..PipelineConfig::default()
        }
    }

    pub fn publisher(&self) -> Result<TelegramPublisher> {
        TelegramPublisher::new(self.telegram_token.clone().unwrap_or_default())
    }
}

pub async fn open_store(settings: &Settings) -> Result<Arc<dyn ArticleStore>> {
    let store = create_storage(&settings.storage, settings.database_url.as_deref(), RetryPolicy::default()).await?;
    info!(backend = %settings.storage, "💾 Storage ready");
    Ok(store)
}

/// In strict mode a collaborator that cannot be built is an error; otherwise
/// it is left out and plans needing it are rejected at run time.
fn collaborator<T>(built: Result<T>, strict: bool, what: &str) -> Result<Option<T>> {
    match built {
        Ok(value) => Ok(Some(value)),
        Err(e) if strict => Err(e),
        Err(e) => {
            warn!(error = %e, "{} unavailable", what);
            Ok(None)
        }
    }
}

/// Builds the collaborators `plan` needs and wires them to `store`.
pub fn build_orchestrator(
    settings: &Settings,
    store: Arc<dyn ArticleStore>,
    plan: &CyclePlan,
    fetch_size: usize,
    strict: bool,
) -> Result<Orchestrator> {
    let config = settings.pipeline_config(fetch_size);
    let mut builder = Orchestrator::builder(store);

    if plan.fetch {
        let feed = NewsDataFeed::new(settings.newsdata_key.clone().unwrap_or_default());
        if let Some(feed) = collaborator(feed, strict, "Feed")? {
            builder = builder.feed(Arc::new(feed));
        }
    }
    if plan.extract {
        let extractor = HtmlExtractor::new().map(|e| e.with_min_text_chars(config.min_text_chars));
        if let Some(extractor) = collaborator(extractor, strict, "Extractor")? {
            builder = builder.extractor(Arc::new(extractor));
        }
    }
    if plan.analyze {
        let analyzer = mb_inference::create_analyzer(
            &settings.analyzer,
            mb_inference::Config {
                api_key: settings.openai_key.clone(),
                model_name: settings.model.clone(),
                base_url: settings.openai_base_url.clone(),
                ..mb_inference::Config::default()
            },
        );
        if let Some(analyzer) = collaborator(analyzer, strict, "Analyzer")? {
            info!(analyzer = %analyzer.name(), "🧠 Analyzer ready");
            builder = builder.analyzer(analyzer);
        }
    }
    if plan.publish {
        if let Some(publisher) = collaborator(settings.publisher(), strict, "Publisher")? {
            builder = builder.publisher(Arc::new(publisher));
        }
    }

    let orchestrator = builder.config(config).build();
    if strict {
        orchestrator.validate(plan)?;
    }
    Ok(orchestrator)
}
