use chrono::Utc;
use mb_core::{canonical_url, Article, ArticleKey, Error, Result};
use mb_pipeline::{CyclePlan, RunRecord, RunTrigger, Scheduler};
use mb_publish::format::stats_html;
use mb_web::AppState;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::setup::{build_orchestrator, open_store};
use crate::Settings;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

fn print_record(record: &RunRecord) {
    let s = &record.summary;
    println!("Run {} ({:?}, {} ms)", record.id, record.status, record.duration_ms());
    println!(
        "  fetched {} | new {} | extracted {} ({} failed) | analyzed {} ({} failed, {} skipped) | published {} ({} failed)",
        s.fetched,
        s.new,
        s.extracted,
        s.extract_failed,
        s.analyzed,
        s.analysis_failed,
        s.skipped,
        s.published,
        s.publish_failed
    );
    for error in &s.errors {
        println!(
            "  ⚠️  {} [{:?}] {}{}",
            error.stage,
            error.kind,
            error.url.as_deref().map(|u| format!("{} ", u)).unwrap_or_default(),
            error.message
        );
    }
}

async fn run_once(settings: &Settings, plan: CyclePlan, fetch_size: usize) -> Result<()> {
    let store = open_store(settings).await?;
    let orchestrator = build_orchestrator(settings, store, &plan, fetch_size, true)?;
    let record = orchestrator.run(plan, RunTrigger::Manual).await?;
    print_record(&record);
    Ok(())
}

pub async fn fetch(settings: &Settings, size: usize, extract: bool) -> Result<()> {
    run_once(settings, CyclePlan::fetch_only(extract).with_fetch_size(size), size).await
}

pub async fn extract(settings: &Settings, limit: Option<usize>) -> Result<()> {
    run_once(settings, CyclePlan::extract_only(limit), 10).await
}

pub async fn analyze(settings: &Settings, limit: Option<usize>) -> Result<()> {
    run_once(settings, CyclePlan::analyze_only(limit), 10).await
}

pub async fn publish(settings: &Settings, limit: Option<usize>) -> Result<()> {
    run_once(settings, CyclePlan::publish_only(limit), 10).await
}

pub async fn full_cycle(settings: &Settings, size: usize) -> Result<()> {
    run_once(settings, CyclePlan::full().with_fetch_size(size), size).await
}

pub async fn schedule(settings: &Settings, every: Duration, size: usize, listen: Option<String>) -> Result<()> {
    let store = open_store(settings).await?;
    let plan = CyclePlan::full().with_fetch_size(size);
    let orchestrator = Arc::new(build_orchestrator(settings, store, &plan, size, true)?);

    if let Some(addr) = listen {
        let state = AppState {
            orchestrator: orchestrator.clone(),
            credentials: settings.credentials(),
            run_plan: plan.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = mb_web::serve(state, &addr, shutdown_signal()).await {
                warn!(error = %e, "Status API stopped");
            }
        });
    }

    Scheduler::new(orchestrator)
        .every(every)
        .plan(plan)
        .run(shutdown_signal())
        .await
}

pub async fn serve(settings: &Settings, listen: &str) -> Result<()> {
    let store = open_store(settings).await?;
    let plan = CyclePlan::full();
    let orchestrator = build_orchestrator(settings, store, &plan, 10, false)?;
    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        credentials: settings.credentials(),
        run_plan: plan,
    };
    mb_web::serve(state, listen, shutdown_signal()).await
}

pub async fn stats(settings: &Settings, all: bool, send: bool) -> Result<()> {
    let store = open_store(settings).await?;
    let now = Utc::now();
    let since = if all {
        None
    } else {
        now.date_naive().and_hms_opt(0, 0, 0).map(|midnight| midnight.and_utc())
    };
    let stats = store.stats(since).await?;

    println!("📊 Articles {}", if all { "(all time)" } else { "(today, UTC)" });
    println!("  total:       {}", stats.total);
    println!("  extracted:   {}", stats.extracted);
    println!("  analyzed:    {}", stats.analyzed);
    println!("  interesting: {}", stats.interesting);
    println!("  published:   {}", stats.published);

    if send {
        let channel = settings
            .channel()
            .ok_or_else(|| Error::Config("TELEGRAM_CHANNEL_ID is required to send stats".to_string()))?;
        let receipt = settings.publisher()?.send_text(&stats_html(&stats, now), &channel).await?;
        info!(message_id = %receipt.message_id, "📤 Stats sent");
    }
    Ok(())
}

fn describe(article: &Article) -> String {
    let state = match (&article.analysis, article.published_at) {
        (_, Some(_)) => "published".to_string(),
        (Some(analysis), None) => format!("{} {}/10", analysis.category, analysis.score),
        (None, None) if article.extracted_text.is_some() => "extracted".to_string(),
        (None, None) => "new".to_string(),
    };
    format!(
        "#{:<5} {} [{}] {}\n       {}",
        article.id,
        article.created_at.format("%Y-%m-%d %H:%M"),
        state,
        article.title,
        article.url
    )
}

pub async fn recent(settings: &Settings, limit: usize) -> Result<()> {
    let store = open_store(settings).await?;
    let articles = store.recent(limit).await?;
    if articles.is_empty() {
        println!("No articles stored yet");
    }
    for article in &articles {
        println!("{}", describe(article));
    }
    Ok(())
}

pub async fn reanalyze(settings: &Settings, url: &str) -> Result<()> {
    let store = open_store(settings).await?;
    let key = ArticleKey::Url(canonical_url(url)?);
    if store.clear_analysis(&key).await? {
        println!("🔄 Analysis cleared, {} will be analyzed on the next run", key);
    } else {
        println!("{} has no analysis to clear", key);
    }
    Ok(())
}

pub fn check_env(settings: &Settings) -> Result<()> {
    let mark = |ok: bool| if ok { "✅" } else { "❌" };
    let credentials = settings.credentials();
    println!("{} NEWSDATA_API_KEY", mark(credentials.newsdata));
    println!("{} OPENAI_API_KEY (analyzer: {})", mark(credentials.openai), settings.analyzer);
    println!("{} TELEGRAM_BOT_TOKEN", mark(credentials.telegram));
    println!("{} TELEGRAM_CHANNEL_ID", mark(credentials.channel));
    println!(
        "   storage: {} ({})",
        settings.storage,
        settings.database_url.as_deref().unwrap_or("default location")
    );
    Ok(())
}

pub async fn check_publisher(settings: &Settings) -> Result<()> {
    let bot = settings.publisher()?.check().await?;
    println!(
        "✅ Bot @{} ({}) is reachable",
        bot.username.as_deref().unwrap_or("unknown"),
        bot.first_name
    );
    match settings.channel() {
        Some(channel) => println!("   posting to {}", channel),
        None => println!("❌ TELEGRAM_CHANNEL_ID is not set"),
    }
    Ok(())
}
