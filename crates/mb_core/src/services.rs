use async_trait::async_trait;

use crate::types::{AnalysisRequest, ExtractedContent, FeedPage, FeedQuery, PostMessage, PublishReceipt, Verdict};
use crate::Result;

/// News API returning candidate articles for a query.
#[async_trait]
pub trait SourceFeed: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, query: &FeedQuery) -> Result<FeedPage>;
}

/// Best-effort full-text extraction for an article URL.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<ExtractedContent>;
}

/// Language model judging an article.
#[async_trait]
pub trait Analyzer: Send + Sync {
    fn name(&self) -> &str;

    /// Malformed model output must surface as an error, same as a transport failure.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Verdict>;
}

/// Messaging channel the selected articles are posted to.
#[async_trait]
pub trait Publisher: Send + Sync {
    fn name(&self) -> &str;

    async fn publish(&self, message: &PostMessage, channel: &str) -> Result<PublishReceipt>;
}
