use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use mb_core::{canonical_url, ArticleDescriptor, Error, FeedPage, FeedQuery, Result, SourceFeed};
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub const DEFAULT_BASE_URL: &str = "https://newsdata.io/api/1";

/// Provider cap on results per request for the free tier.
pub const MAX_PAGE_SIZE: usize = 10;

#[derive(Debug, Deserialize)]
struct NewsDataResponse {
    status: String,
    #[serde(default)]
    results: Option<serde_json::Value>,
    #[serde(rename = "nextPage", default)]
    next_page: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct NewsDataArticle {
    article_id: Option<String>,
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    source_id: Option<String>,
    source_name: Option<String>,
}

impl NewsDataArticle {
    fn into_descriptor(self) -> Option<ArticleDescriptor> {
        let link = self.link.filter(|l| !l.trim().is_empty())?;
        let url = match canonical_url(&link) {
            Ok(url) => url,
            Err(e) => {
                debug!(link = %link, error = %e, "Dropping result with unusable link");
                return None;
            }
        };
        Some(ArticleDescriptor {
            external_id: self.article_id,
            title: self.title.map(|t| t.trim().to_string()).unwrap_or_default(),
            url,
            summary: self.description.filter(|d| !d.trim().is_empty()),
            published_at: self.pub_date.as_deref().and_then(parse_pub_date),
            source_name: self.source_name.or(self.source_id),
        })
    }
}

/// `pubDate` comes as `2024-05-02 14:03:11` in UTC.
fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw.trim()).ok().map(|dt| dt.with_timezone(&Utc)))
}

/// newsdata.io `/news` endpoint.
pub struct NewsDataFeed {
    client: Arc<Client>,
    api_key: String,
    base_url: String,
}

impl NewsDataFeed {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::Config("NEWSDATA_API_KEY is required".to_string()));
        }
        Ok(Self {
            client: Arc::new(Client::new()),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn params(&self, query: &FeedQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![("apikey", self.api_key.clone())];
        if let Some(country) = &query.country {
            params.push(("country", country.clone()));
        }
        if !query.languages.is_empty() {
            params.push(("language", query.languages.join(",")));
        }
        if !query.categories.is_empty() {
            params.push(("category", query.categories.join(",")));
        }
        if let Some(q) = &query.query {
            params.push(("q", q.clone()));
        }
        if !query.domains.is_empty() {
            params.push(("domainurl", query.domains.join(",")));
        }
        params.push(("size", query.size.clamp(1, MAX_PAGE_SIZE).to_string()));
        if let Some(page) = &query.page {
            params.push(("page", page.clone()));
        }
        params
    }
}

impl fmt::Debug for NewsDataFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewsDataFeed")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl SourceFeed for NewsDataFeed {
    fn name(&self) -> &str {
        "newsdata"
    }

    #[instrument(skip(self, query), fields(query = %query.name))]
    async fn fetch(&self, query: &FeedQuery) -> Result<FeedPage> {
        let response = self
            .client
            .get(format!("{}/news", self.base_url))
            .query(&self.params(query))
            .send()
            .await
            .map_err(|e| Error::FetchFailed(format!("newsdata request failed: {}", e.without_url())))?;

        let status = response.status();
        let body: NewsDataResponse = response
            .json()
            .await
            .map_err(|e| Error::FetchFailed(format!("newsdata returned {} with unreadable body: {}", status, e.without_url())))?;

        if !status.is_success() || body.status != "success" {
            let message = body
                .results
                .as_ref()
                .and_then(|r| r.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("no message");
            return Err(Error::FetchFailed(format!(
                "newsdata status {} ({}): {}",
                body.status, status, message
            )));
        }

        let raw: Vec<NewsDataArticle> = match body.results {
            Some(results) => serde_json::from_value(results)?,
            None => Vec::new(),
        };
        let total = raw.len();
        let articles: Vec<ArticleDescriptor> = raw.into_iter().filter_map(NewsDataArticle::into_descriptor).collect();
        if articles.len() < total {
            warn!(dropped = total - articles.len(), "Dropped results without a usable link");
        }

        let next_page = body.next_page.and_then(|page| match page {
            serde_json::Value::String(s) if !s.is_empty() => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

        debug!(count = articles.len(), next_page = ?next_page, "Fetched feed page");
        Ok(FeedPage { articles, next_page })
    }
}
