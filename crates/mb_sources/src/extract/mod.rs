use async_trait::async_trait;
use mb_core::{ContentExtractor, Error, ExtractedContent, Result};
use reqwest::Client;
use scraper::Html;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::utils;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) mediabot/0.1";

/// Fetches an article page and pulls the body text out of its markup.
///
/// Body text comes from `<article>` paragraphs, then JSON-LD `articleBody`,
/// then every `<p>` on the page, whichever first reaches `min_text_chars`.
#[derive(Debug, Clone)]
pub struct HtmlExtractor {
    client: Arc<Client>,
    min_text_chars: usize,
}

impl HtmlExtractor {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client: Arc::new(client),
            min_text_chars: 200,
        })
    }

    pub fn with_min_text_chars(mut self, min_text_chars: usize) -> Self {
        self.min_text_chars = min_text_chars;
        self
    }

    /// Pure part of extraction, split out so it can run on stored HTML.
    pub fn extract_from_html(&self, html: &str) -> Result<ExtractedContent> {
        let document = Html::parse_document(html);

        let title = match utils::meta_content(&document, "meta[property='og:title']")? {
            Some(title) => Some(title),
            None => match utils::first_text(&document, "h1")? {
                Some(title) => Some(title),
                None => utils::first_text(&document, "title")?,
            },
        };

        let text = self
            .body_text(&document)?
            .ok_or_else(|| Error::ExtractFailed(format!("no text of at least {} chars", self.min_text_chars)))?;

        let excerpt = match utils::meta_content(&document, "meta[name='description']")? {
            Some(excerpt) => Some(excerpt),
            None => utils::meta_content(&document, "meta[property='og:description']")?,
        };

        Ok(ExtractedContent {
            title,
            text,
            excerpt,
            lead_image_url: utils::meta_content(&document, "meta[property='og:image']")?,
        })
    }

    fn body_text(&self, document: &Html) -> Result<Option<String>> {
        let long_enough = |text: &String| text.chars().count() >= self.min_text_chars;

        let article = utils::texts(document, "article p")?.join("\n\n");
        if long_enough(&article) {
            return Ok(Some(article));
        }
        if let Some(body) = json_ld_body(document)?.filter(long_enough) {
            return Ok(Some(body));
        }
        let paragraphs = utils::texts(document, "p")?.join("\n\n");
        Ok(Some(paragraphs).filter(long_enough))
    }
}

fn json_ld_body(document: &Html) -> Result<Option<String>> {
    let selector = utils::selector("script[type='application/ld+json']")?;
    for script in document.select(&selector) {
        let raw = script.text().collect::<String>();
        let Ok(json) = serde_json::from_str::<serde_json::Value>(raw.trim()) else {
            continue;
        };
        let candidates = match &json {
            serde_json::Value::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        };
        for item in candidates {
            if let Some(body) = item.get("articleBody").and_then(|b| b.as_str()) {
                let body = body.trim();
                if !body.is_empty() {
                    return Ok(Some(body.to_string()));
                }
            }
        }
    }
    Ok(None)
}

#[async_trait]
impl ContentExtractor for HtmlExtractor {
    #[instrument(skip(self))]
    async fn extract(&self, url: &str) -> Result<ExtractedContent> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::ExtractFailed(format!("download failed: {}", e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::ExtractFailed(format!("{} answered {}", url, status)));
        }
        let html = response
            .text()
            .await
            .map_err(|e| Error::ExtractFailed(format!("unreadable body: {}", e)))?;

        let content = self.extract_from_html(&html)?;
        debug!(chars = content.text.chars().count(), "Extracted article text");
        Ok(content)
    }
}
