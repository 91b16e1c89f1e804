use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::{Error, Result};

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 10;

/// Category written when the analyzer could not produce a usable verdict.
pub const UNANALYZABLE_CATEGORY: &str = "unanalyzable";

/// A stored article row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub external_id: Option<String>,
    pub url: String,
    pub title: String,
    pub raw_summary: Option<String>,
    pub source_name: Option<String>,
    pub source_published_at: Option<DateTime<Utc>>,
    pub extracted_text: Option<String>,
    pub extracted_at: Option<DateTime<Utc>>,
    pub analysis: Option<Analysis>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    pub fn key(&self) -> ArticleKey {
        ArticleKey::Id(self.id)
    }

    pub fn is_analyzed(&self) -> bool {
        self.analysis.is_some()
    }

    pub fn is_published(&self) -> bool {
        self.published_at.is_some()
    }

    /// Text handed to the analyzer: the extracted body, else the feed summary.
    pub fn analysis_text(&self) -> Option<&str> {
        self.extracted_text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.raw_summary.as_deref().filter(|t| !t.trim().is_empty()))
    }

    pub fn score(&self) -> Option<u8> {
        self.analysis.as_ref().map(|a| a.score)
    }
}

/// Upsert payload. `None` fields are left untouched on an existing row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleUpsert {
    pub url: String,
    pub external_id: Option<String>,
    pub title: Option<String>,
    pub raw_summary: Option<String>,
    pub source_name: Option<String>,
    pub source_published_at: Option<DateTime<Utc>>,
    pub extraction: Option<Extraction>,
}

impl ArticleUpsert {
    pub fn from_descriptor(descriptor: &ArticleDescriptor) -> Self {
        Self {
            url: descriptor.url.clone(),
            external_id: descriptor.external_id.clone(),
            title: Some(descriptor.title.clone()),
            raw_summary: descriptor.summary.clone(),
            source_name: descriptor.source_name.clone(),
            source_published_at: descriptor.published_at,
            extraction: None,
        }
    }

    pub fn with_extraction(mut self, extraction: Extraction) -> Self {
        self.extraction = Some(extraction);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub text: String,
    pub extracted_at: DateTime<Utc>,
}

/// Every analysis column, written and cleared as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub category: String,
    pub score: u8,
    pub should_publish: bool,
    pub reason: String,
    pub translated_title: String,
    pub translated_body: String,
    pub translation: String,
    pub analyzed_at: DateTime<Utc>,
}

impl Analysis {
    pub fn from_verdict(verdict: Verdict, analyzed_at: DateTime<Utc>) -> Self {
        Self {
            category: verdict.category,
            score: verdict.score,
            should_publish: verdict.should_publish,
            reason: verdict.reason,
            translated_title: verdict.post_title,
            translated_body: verdict.post_body,
            translation: verdict.translation,
            analyzed_at,
        }
    }

    /// Terminal outcome for an article the analyzer failed on, so it is not
    /// picked up again by the next cycle.
    pub fn unanalyzable(title: &str, failure: &str, analyzed_at: DateTime<Utc>) -> Self {
        Self {
            category: UNANALYZABLE_CATEGORY.to_string(),
            score: MIN_SCORE,
            should_publish: false,
            reason: format!("analysis failed: {}", failure),
            translated_title: title.to_string(),
            translated_body: String::new(),
            translation: String::new(),
            analyzed_at,
        }
    }

    pub fn is_unanalyzable(&self) -> bool {
        self.category == UNANALYZABLE_CATEGORY
    }
}

/// Structured judgement returned by an [`crate::Analyzer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub category: String,
    pub score: u8,
    pub should_publish: bool,
    pub post_title: String,
    pub post_body: String,
    pub translation: String,
    pub reason: String,
}

impl Verdict {
    pub fn validate(self) -> Result<Self> {
        if !(MIN_SCORE..=MAX_SCORE).contains(&self.score) {
            return Err(Error::AnalysisFailed(format!(
                "score {} outside {}..={}",
                self.score, MIN_SCORE, MAX_SCORE
            )));
        }
        if self.category.trim().is_empty() {
            return Err(Error::AnalysisFailed("empty category".to_string()));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleKey {
    Id(i64),
    Url(String),
}

impl fmt::Display for ArticleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArticleKey::Id(id) => write!(f, "#{}", id),
            ArticleKey::Url(url) => f.write_str(url),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishMark {
    Marked,
    AlreadyPublished,
    NotFound,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total: u64,
    pub extracted: u64,
    pub analyzed: u64,
    pub interesting: u64,
    pub published: u64,
}

/// Score at or above which an article counts as interesting in statistics.
pub const INTERESTING_SCORE: u8 = 6;

/// One candidate article as returned by a [`crate::SourceFeed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleDescriptor {
    pub external_id: Option<String>,
    pub title: String,
    pub url: String,
    pub summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub source_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedQuery {
    /// Label used in logs and run records, e.g. "priority" or "general".
    pub name: String,
    pub country: Option<String>,
    pub languages: Vec<String>,
    pub categories: Vec<String>,
    pub query: Option<String>,
    pub domains: Vec<String>,
    pub size: usize,
    pub page: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedPage {
    pub articles: Vec<ArticleDescriptor>,
    pub next_page: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedContent {
    pub title: Option<String>,
    pub text: String,
    pub excerpt: Option<String>,
    pub lead_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub title: String,
    pub body: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostMessage {
    pub title: String,
    pub body: String,
    pub link: String,
    pub source: Option<String>,
}

impl PostMessage {
    pub fn for_article(article: &Article) -> Option<Self> {
        let analysis = article.analysis.as_ref()?;
        let body = if analysis.translated_body.trim().is_empty() {
            article.raw_summary.clone().unwrap_or_default()
        } else {
            analysis.translated_body.clone()
        };
        let title = if analysis.translated_title.trim().is_empty() {
            article.title.clone()
        } else {
            analysis.translated_title.clone()
        };
        Some(Self {
            title,
            body,
            link: article.url.clone(),
            source: article.source_name.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub message_id: String,
}

/// Normalizes a link into the form used as the dedup key.
pub fn canonical_url(raw: &str) -> Result<String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| Error::InvalidUrl(format!("{}: {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidUrl(format!("unsupported scheme in {}", raw)));
    }
    url.set_fragment(None);
    Ok(url.to_string())
}
