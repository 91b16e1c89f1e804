use mb_core::{FeedQuery, INTERESTING_SCORE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard ceiling on concurrent extractor calls.
pub const MAX_EXTRACT_CONCURRENCY: usize = 4;

/// Per-collaborator call timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timeouts {
    pub feed: Duration,
    pub extract: Duration,
    pub analyze: Duration,
    pub publish: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            feed: Duration::from_secs(30),
            extract: Duration::from_secs(30),
            analyze: Duration::from_secs(60),
            publish: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Query variants sent to the feed on every fetch, in priority order.
    pub feed_queries: Vec<FeedQuery>,
    /// Target channel for the publisher.
    pub channel: String,
    pub extract_concurrency: usize,
    /// Shortest text worth sending to the analyzer, in chars.
    pub min_text_chars: usize,
    pub analysis_delay: Duration,
    pub publish_delay: Duration,
    pub score_threshold: u8,
    /// Stored rows re-extracted by an extract-only run.
    pub extract_limit: usize,
    pub analyze_limit: usize,
    pub publish_limit: usize,
    pub timeouts: Timeouts,
    pub history_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            feed_queries: Vec::new(),
            channel: String::new(),
            extract_concurrency: 2,
            min_text_chars: 80,
            analysis_delay: Duration::from_secs(1),
            publish_delay: Duration::from_secs(2),
            score_threshold: INTERESTING_SCORE,
            extract_limit: 10,
            analyze_limit: 10,
            publish_limit: 5,
            timeouts: Timeouts::default(),
            history_size: 10,
        }
    }
}

impl PipelineConfig {
    pub fn effective_concurrency(&self) -> usize {
        self.extract_concurrency.clamp(1, MAX_EXTRACT_CONCURRENCY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concurrency_is_bounded() {
        let mut config = PipelineConfig::default();
        assert_eq!(config.effective_concurrency(), 2);
        config.extract_concurrency = 16;
        assert_eq!(config.effective_concurrency(), MAX_EXTRACT_CONCURRENCY);
        config.extract_concurrency = 0;
        assert_eq!(config.effective_concurrency(), 1);
    }
}
